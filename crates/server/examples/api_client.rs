//! Examples for using the SAGAR Server API
//!
//! Start the server first (`cargo run -p sagar-server`), then run
//! `cargo run -p sagar-server --example api_client`.

use reqwest::Client;
use serde_json::json;

const SERVER_URL: &str = "http://localhost:8000";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let client = Client::new();

    // Example 1: Root status
    println!("1. Root:");
    let resp = client.get(format!("{SERVER_URL}/")).send().await?;
    println!("Status: {}", resp.status());
    println!("Body: {}", resp.text().await?);
    println!();

    // Example 2: Readiness
    println!("2. Readiness:");
    let resp = client.get(format!("{SERVER_URL}/ready")).send().await?;
    println!("Status: {}", resp.status());
    println!("Body: {}", resp.text().await?);
    println!();

    // Example 3: All tabular files
    println!("3. Search tabular files:");
    let resp = client
        .get(format!("{SERVER_URL}/search"))
        .query(&[("file_type", "tabular")])
        .send()
        .await?;
    println!("Status: {}", resp.status());
    println!("Body: {}", resp.text().await?);
    println!();

    // Example 4: Correlate two files with default coordinate columns
    println!("4. Discover and correlate:");
    let resp = client
        .post(format!("{SERVER_URL}/discover-and-correlate"))
        .json(&json!({
            "file1_id": 18,
            "file2_id": 15,
            "column1": "individualCount",
            "column2": "TO3"
        }))
        .send()
        .await?;
    println!("Status: {}", resp.status());
    println!("Body: {}", resp.text().await?);
    println!();

    // Example 5: Explicit coordinate columns for the second file
    println!("5. Discover and correlate (custom coordinates):");
    let resp = client
        .post(format!("{SERVER_URL}/discover-and-correlate"))
        .json(&json!({
            "file1_id": 18,
            "file2_id": 15,
            "column1": "individualCount",
            "column2": "TO3",
            "file2_lat_col": "Latitude",
            "file2_lon_col": "Longitude"
        }))
        .send()
        .await?;
    println!("Status: {}", resp.status());
    println!("Body: {}", resp.text().await?);

    Ok(())
}
