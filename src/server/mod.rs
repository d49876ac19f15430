//! JSON API served by `skillshare ui`.
//!
//! Every route lives under `/api`. Handlers are thin: they decode the
//! request, run the matching engine call through [`AppState`] and encode the
//! result. Errors become `{"error": ...}` with a status from
//! [`error::status_for`].

pub mod error;
mod install;
mod maintenance;
mod settings;
mod skills;
mod state;
mod sync;
mod targets;

use std::net::SocketAddr;

use axum::Router;
use axum::routing::{delete, get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::Result;

pub use error::{ApiError, ApiResult};
pub use state::AppState;

/// Every `/api` route.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(settings::health))
        .route("/overview", get(settings::overview))
        .route("/skills", get(skills::list))
        .route("/skills/{name}", get(skills::detail).delete(skills::delete))
        .route("/skills/{name}/files/{*filepath}", get(skills::file))
        .route("/targets", get(targets::list).post(targets::add))
        .route("/targets/{name}", axum::routing::patch(targets::update).delete(targets::remove))
        .route("/sync", post(sync::sync))
        .route("/diff", get(sync::diff))
        .route("/collect/scan", get(sync::scan))
        .route("/collect", post(sync::collect))
        .route("/backups", get(maintenance::backups))
        .route("/backup", post(maintenance::backup))
        .route("/backup/cleanup", post(maintenance::cleanup))
        .route("/restore", post(maintenance::restore))
        .route("/trash", get(maintenance::trash))
        .route("/trash/empty", post(maintenance::trash_empty))
        .route("/trash/{name}/restore", post(maintenance::trash_restore))
        .route("/trash/{name}", delete(maintenance::trash_delete))
        .route("/discover", post(install::discover))
        .route("/install", post(install::install))
        .route("/install/batch", post(install::install_batch))
        .route("/update", post(install::update))
        .route("/repos/{name}", delete(install::delete_repo_handler))
        .route("/audit", get(install::audit_all))
        .route(
            "/audit/rules",
            get(install::rules_get).put(install::rules_put).post(install::rules_init),
        )
        .route("/audit/{name}", get(install::audit_one))
        .route("/git/status", get(settings::git_status))
        .route("/push", post(settings::push))
        .route("/pull", post(settings::pull))
        .route("/config", get(settings::config_get).put(settings::config_put))
        .route("/config/available-targets", get(targets::available))
        .route("/log", get(settings::log_get).delete(settings::log_clear))
}

/// The full application: `/api` plus tracing and CORS layers.
pub fn app(state: AppState) -> Router {
    Router::new()
        .nest("/api", api_router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind `addr` and serve until ctrl-c.
pub async fn serve(state: AppState, addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let local = listener.local_addr()?;
    info!(%local, "skillshare API listening");
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

#[must_use]
pub fn bind_addr(host: &str, port: u16) -> SocketAddr {
    format!("{host}:{port}")
        .parse()
        .unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], port)))
}
