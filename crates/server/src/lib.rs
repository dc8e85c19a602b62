//! SAGAR Server - HTTP API for the SAGAR backend
//!
//! Exposes marine file metadata search and geospatial correlation dispatch
//! over HTTP. Request handling lives in the `sagar` crate; this crate adds
//! routing, configuration, error mapping and middleware.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use server::ServerConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::load()?;
//!     server::start_server(config).await?;
//!     Ok(())
//! }
//! ```
//!
//! # API Endpoints
//!
//! - `GET /` - Service status message
//! - `GET /health` - Liveness probe
//! - `GET /ready` - Readiness probe (checks the metadata store)
//! - `GET /search?file_type=...` - List file metadata records
//! - `POST /discover-and-correlate` - Resolve two files and dispatch a
//!   geospatial correlation job to the analysis service
//!
//! # Configuration
//!
//! Read from an optional `server.{toml,yaml,json}` file, then `SAGAR__*`
//! environment variables (`SAGAR__SUPABASE_URL`, `SAGAR__SUPABASE_KEY`,
//! `SAGAR__ML_SERVICE_URL`, `SAGAR__PORT`, ...). The binary also loads a
//! `.env` file first.

pub mod config;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use server::{build_router, start_server};
pub use state::ServerState;
