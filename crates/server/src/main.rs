//! SAGAR Server binary
//!
//! Loads `.env`, reads configuration and serves the HTTP API until
//! SIGTERM or Ctrl+C.

use server::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; real deployments set the environment.
    let _ = dotenvy::dotenv();

    let config = ServerConfig::load()?;

    server::start_server(config).await?;

    Ok(())
}
