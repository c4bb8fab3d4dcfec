use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    error::CoreError, models::auth::AuthenticatedUser,
    services::notifications::NotificationService, AppState,
};

pub async fn list_notifications(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Value>, CoreError> {
    let notifications = NotificationService::list_for_user(&state.db, user.user_id).await?;
    let unread = NotificationService::unread_count(&state.db, user.user_id).await?;
    Ok(Json(json!({ "notifications": notifications, "unread": unread })))
}

pub async fn mark_read(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, CoreError> {
    NotificationService::mark_read(&state.db, user.user_id, id).await?;
    Ok(Json(json!({ "message": "Marked read" })))
}
