// libs/notification-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::policy::require_role;

use crate::services::notify::NotificationService;

/// Notifications addressed to the authenticated user, newest first.
#[axum::debug_handler]
pub async fn list_my_notifications(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let user_id = Uuid::parse_str(&user.id)
        .map_err(|_| AppError::BadRequest("Invalid user id".to_string()))?;

    let service = NotificationService::new(&state);
    let notifications = service
        .list_for_user(user_id, auth.token())
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    Ok(Json(json!({
        "count": notifications.len(),
        "notifications": notifications,
    })))
}

/// Failed deliveries, for operator follow-up. Admin only.
#[axum::debug_handler]
pub async fn list_failed_notifications(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, "admin")?;

    let service = NotificationService::new(&state);
    let notifications = service
        .list_failed(auth.token())
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    Ok(Json(json!({
        "count": notifications.len(),
        "notifications": notifications,
    })))
}
