//! SAT Server
//!
//! Local persistence server for one SAT tool: serves the tool's static
//! assets and its data directory, and accepts indicator records and board
//! trees over a small JSON API.
//!
//! # Architecture
//!
//! ```text
//! ServerConfig (TOML + CLI overrides)
//!        │
//!        ▼
//!    AppState ── JsonlLog / WithFallback<JsonlLog, ExportDir>
//!        │
//!        ▼
//!   routes() ── warp filters ── sat-store
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod cli;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod static_files;
pub mod telemetry;

pub use config::{ConfigError, ConfigOverrides, IndicatorsFormat, ServerConfig};
pub use error::{ApiError, ApiResult};
pub use routes::routes;
pub use state::AppState;
pub use telemetry::{init_tracing, LogFormat};

use std::future::Future;
use std::net::SocketAddr;
use warp::Filter;

/// Run the server until `shutdown` resolves
///
/// # Errors
/// The listen address cannot be bound.
pub async fn serve<F>(config: ServerConfig, shutdown: F) -> Result<(), warp::Error>
where
    F: Future<Output = ()> + Send + 'static,
{
    let bind = config.bind;
    tracing::info!(
        tool = %config.tool,
        %bind,
        static_root = %config.static_root.display(),
        data_dir = %config.data_dir.display(),
        format = ?config.indicators.format,
        "starting server"
    );

    let state = AppState::new(config);
    let filter = routes(state).with(warp::trace::request());
    let (addr, server): (SocketAddr, _) =
        warp::serve(filter).try_bind_with_graceful_shutdown(bind, shutdown)?;

    tracing::info!(%addr, "listening");
    server.await;
    tracing::info!("server stopped");
    Ok(())
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
