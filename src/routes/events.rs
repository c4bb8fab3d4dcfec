use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    error::CoreError,
    models::{
        auth::AuthenticatedUser,
        event::{CreateEventRequest, UpdateEventRequest},
    },
    services::events::EventService,
    AppState,
};

pub async fn list_events(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> Result<Json<Value>, CoreError> {
    let events = EventService::list_upcoming(&state.db).await?;
    Ok(Json(json!(events)))
}

pub async fn create_event(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreateEventRequest>,
) -> Result<(StatusCode, Json<Value>), CoreError> {
    let event = EventService::create(&state.db, user.user_id, &body).await?;
    Ok((StatusCode::CREATED, Json(json!(event))))
}

pub async fn get_event(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, CoreError> {
    let event = EventService::get(&state.db, id).await?;
    Ok(Json(json!(event)))
}

pub async fn update_event(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateEventRequest>,
) -> Result<Json<Value>, CoreError> {
    let event = EventService::update(&state.db, id, user.user_id, user.role, &body).await?;
    Ok(Json(json!(event)))
}

pub async fn list_event_rydz(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, CoreError> {
    let rydz = EventService::rydz_for_event(&state.db, id).await?;
    Ok(Json(json!(rydz)))
}
