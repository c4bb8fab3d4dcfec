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
        user::{LinkStudentRequest, UpdateProfileRequest, UserSnapshot},
    },
    services::users::UserService,
    AppState,
};

pub async fn me(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Value>, CoreError> {
    let profile = UserService::get(&state.db, user.user_id).await?;
    Ok(Json(json!(profile)))
}

pub async fn update_me(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<UpdateProfileRequest>,
) -> Result<Json<Value>, CoreError> {
    let profile = UserService::update_profile(&state.db, user.user_id, &body).await?;
    Ok(Json(json!(profile)))
}

pub async fn get_user(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, CoreError> {
    let profile = UserService::get(&state.db, id).await?;
    // Other users only see the public snapshot.
    Ok(Json(json!(UserSnapshot::from(profile))))
}

pub async fn list_my_students(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Value>, CoreError> {
    let students = UserService::managed_students(&state.db, user.user_id).await?;
    Ok(Json(json!(students)))
}

pub async fn list_my_parents(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Value>, CoreError> {
    let parents = UserService::associated_parents(&state.db, user.user_id).await?;
    Ok(Json(json!(parents)))
}

pub async fn link_student(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<LinkStudentRequest>,
) -> Result<(StatusCode, Json<Value>), CoreError> {
    let student =
        UserService::link_student(&state.db, user.user_id, &body.student_email).await?;
    Ok((StatusCode::CREATED, Json(json!(student))))
}

pub async fn unlink_student(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(student_id): Path<Uuid>,
) -> Result<Json<Value>, CoreError> {
    UserService::unlink_student(&state.db, user.user_id, student_id).await?;
    Ok(Json(json!({ "message": "Student removed" })))
}
