use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    error::CoreError,
    models::{
        approval::{ApproveDriverRequest, DecideApprovalRequest, DriverListKind},
        auth::AuthenticatedUser,
    },
    services::{approvals::ApprovalService, driver_list::DriverListService},
    AppState,
};

/// GET /approvals — the parent's pending approval requests.
pub async fn list_approvals(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Value>, CoreError> {
    let requests = ApprovalService::list_pending_approvals(&state.db, user.user_id).await?;
    Ok(Json(json!(requests)))
}

/// POST /approvals/decide — resolve one pending request.
pub async fn decide(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<DecideApprovalRequest>,
) -> Result<Json<Value>, CoreError> {
    let status = ApprovalService::decide_driver_approval(
        &state.db,
        user.user_id,
        body.student_id,
        body.driver_id,
        body.ryd_id,
        body.decision,
    )
    .await?;
    Ok(Json(json!({ "status": status })))
}

/// GET /approvals/drivers — approved/declined lists with profile snapshots.
pub async fn get_driver_lists(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Value>, CoreError> {
    let lists = DriverListService::get_driver_lists(&state.db, user.user_id).await?;
    Ok(Json(json!(lists)))
}

/// POST /approvals/drivers — pre-approve a driver for a set of students.
pub async fn approve_driver(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<ApproveDriverRequest>,
) -> Result<Json<Value>, CoreError> {
    let driver = DriverListService::approve_driver_for_students(
        &state.db,
        user.user_id,
        &body.driver_email,
        &body.student_ids,
    )
    .await?;
    Ok(Json(json!({ "message": "Driver approved", "driver": driver })))
}

#[derive(Debug, Deserialize)]
pub struct RemoveDriverQuery {
    pub list: DriverListKind,
}

/// DELETE /approvals/drivers/{driver_id}?list=approved|declined
pub async fn remove_driver(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(driver_id): Path<Uuid>,
    Query(query): Query<RemoveDriverQuery>,
) -> Result<Json<Value>, CoreError> {
    DriverListService::remove_from_list(&state.db, user.user_id, driver_id, query.list).await?;
    Ok(Json(json!({ "message": "Driver removed" })))
}
