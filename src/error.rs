use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Error taxonomy shared by all core services. Handlers return this directly;
/// `IntoResponse` renders `{"error": ..., "kind": ...}` with a matching
/// status code, so callers can distinguish retryable infrastructure failures
/// from logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    /// The targeted request is no longer in the expected pending state —
    /// already resolved, withdrawn, or the ryd was cancelled.
    #[error("{0}")]
    StaleRequest(String),

    #[error("{0}")]
    Validation(String),

    /// Data-store connectivity/timeout trouble. Retryable by the user, not
    /// indicative of a logic bug. Never retried automatically.
    #[error("{0}")]
    Transient(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CoreError {
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::Unauthorized(_) => "unauthorized",
            CoreError::NotFound(_) => "not_found",
            CoreError::StaleRequest(_) => "stale_request",
            CoreError::Validation(_) => "validation_error",
            CoreError::Transient(_) => "transient_infrastructure_error",
            CoreError::Internal(_) => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            CoreError::Unauthorized(_) => StatusCode::FORBIDDEN,
            CoreError::NotFound(_) => StatusCode::NOT_FOUND,
            CoreError::StaleRequest(_) => StatusCode::CONFLICT,
            CoreError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            CoreError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
            CoreError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for CoreError {
    fn from(e: sqlx::Error) -> Self {
        classify_sqlx(e)
    }
}

/// Map data-store failures onto the taxonomy: pool/connection/io trouble is
/// transient and worth a user retry; anything else is an internal error.
fn classify_sqlx(e: sqlx::Error) -> CoreError {
    match &e {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            CoreError::Transient(
                "The data store is temporarily unreachable. Please try again.".into(),
            )
        }
        sqlx::Error::RowNotFound => CoreError::NotFound("Record not found".into()),
        _ => CoreError::Internal(e.into()),
    }
}

impl IntoResponse for CoreError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("internal error: {:#}", self);
        }
        let body = Json(json!({ "error": self.to_string(), "kind": self.kind() }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_timeout_is_transient() {
        let err = classify_sqlx(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, CoreError::Transient(_)));
        assert_eq!(err.kind(), "transient_infrastructure_error");
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn row_not_found_maps_to_not_found() {
        let err = classify_sqlx(sqlx::Error::RowNotFound);
        assert!(matches!(err, CoreError::NotFound(_)));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn taxonomy_kinds_and_statuses() {
        let cases = [
            (CoreError::Unauthorized("x".into()), "unauthorized", StatusCode::FORBIDDEN),
            (CoreError::NotFound("x".into()), "not_found", StatusCode::NOT_FOUND),
            (CoreError::StaleRequest("x".into()), "stale_request", StatusCode::CONFLICT),
            (CoreError::Validation("x".into()), "validation_error", StatusCode::UNPROCESSABLE_ENTITY),
            (CoreError::Transient("x".into()), "transient_infrastructure_error", StatusCode::SERVICE_UNAVAILABLE),
        ];
        for (err, kind, status) in cases {
            assert_eq!(err.kind(), kind);
            assert_eq!(err.status(), status);
        }
    }
}
