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
        ryd::{CreateRydRequest, DriverRespondRequest, UpdateRydStatusRequest},
    },
    services::rydz::RydService,
    AppState,
};

pub async fn list_rydz(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Value>, CoreError> {
    let rydz = RydService::list_for_user(&state.db, user.user_id).await?;
    Ok(Json(json!(rydz)))
}

pub async fn create_ryd(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreateRydRequest>,
) -> Result<(StatusCode, Json<Value>), CoreError> {
    let ryd = RydService::create(&state.db, user.user_id, &body).await?;
    Ok((StatusCode::CREATED, Json(json!(ryd))))
}

pub async fn get_ryd(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, CoreError> {
    let view = RydService::get(&state.db, id).await?;
    Ok(Json(json!(view)))
}

pub async fn join_ryd(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<Value>), CoreError> {
    let entry = RydService::request_to_join(&state.db, user.user_id, id).await?;
    Ok((StatusCode::CREATED, Json(json!(entry))))
}

pub async fn cancel_join(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, CoreError> {
    RydService::cancel_join(&state.db, user.user_id, id).await?;
    Ok(Json(json!({ "message": "Request cancelled" })))
}

pub async fn driver_respond(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((id, passenger_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<DriverRespondRequest>,
) -> Result<Json<Value>, CoreError> {
    let status =
        RydService::driver_respond(&state.db, user.user_id, id, passenger_id, body.accept)
            .await?;
    Ok(Json(json!({ "status": status })))
}

pub async fn mark_on_board(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((id, passenger_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Value>, CoreError> {
    RydService::mark_on_board(&state.db, user.user_id, id, passenger_id).await?;
    Ok(Json(json!({ "message": "Passenger on board" })))
}

pub async fn mark_completed(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((id, passenger_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Value>, CoreError> {
    RydService::mark_completed(&state.db, user.user_id, id, passenger_id).await?;
    Ok(Json(json!({ "message": "Passenger dropped off" })))
}

pub async fn update_ryd_status(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateRydStatusRequest>,
) -> Result<Json<Value>, CoreError> {
    let ryd = RydService::update_status(&state.db, user.user_id, id, body.status).await?;
    Ok(Json(json!(ryd)))
}
