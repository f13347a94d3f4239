//! HTTP adapter for the token lifecycle.
//!
//! - `/`                — index page with flash messages
//! - `/status`          — health check
//! - `/{provider}/...`  — login, force, authorized, refresh, reuse, forget

pub mod flash;
pub mod routes;
pub mod session;

use crate::SharedState;
use axum::Router;
use tower_http::trace::TraceLayer;

pub fn router(state: SharedState) -> Router {
    routes::app_router(state).layer(TraceLayer::new_for_http())
}
