//! HTTP transport for the life organizer.
//!
//! # Responsibility
//! - Expose the core services as a JSON API under `/api/...`.
//! - Own process wiring: configuration, database handle, CORS and
//!   graceful shutdown.
//!
//! # Invariants
//! - Business rules live in `lifeorg_core`; this crate only decodes,
//!   authenticates and encodes.

use std::io;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::Method;
use axum::Router;
use lifeorg_core::DbError;
use log::info;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};

pub mod config;
pub mod error;
pub mod extract;
pub mod routes;
pub mod state;

pub use config::Config;
pub use state::AppState;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("database unavailable: {0}")]
    Db(#[from] DbError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Builds the full application router over `state`.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);

    routes::api_routes().layer(cors).with_state(state)
}

/// Opens the database, binds `config.bind` and serves until a shutdown
/// signal arrives.
pub async fn serve(config: Config) -> Result<(), ServerError> {
    let conn = lifeorg_core::open_db(&config.db_path)?;
    let state = AppState::new(conn, config.token_ttl_days);
    let app = build_router(state);

    let listener = TcpListener::bind(config.bind).await?;
    info!(
        "event=server_start module=http status=ok bind={} db_path={}",
        config.bind,
        config.db_path.display()
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("event=server_stop module=http status=ok");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("event=shutdown module=http status=ok signal=ctrl_c"),
            Err(err) => {
                log::warn!("event=shutdown module=http status=error error={err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("event=shutdown module=http status=ok signal=terminate");
            }
            Err(err) => {
                log::warn!("event=shutdown module=http status=error error={err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
