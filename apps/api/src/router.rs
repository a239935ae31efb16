use std::sync::Arc;

use axum::{routing::get, Router};

use appointment_cell::router::appointment_routes;
use audit_cell::router::audit_routes;
use notification_cell::router::notification_routes;
use shared_config::AppConfig;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { "Mindwell Clinic API is running!" }))
        .nest("/appointments", appointment_routes(state.clone()))
        .nest("/notifications", notification_routes(state.clone()))
        .nest("/audit", audit_routes(state))
}
