use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Message returned for any failure while assembling the dashboard. The underlying cause is
/// logged, never exposed.
pub const DASHBOARD_UNAVAILABLE: &str = "Failed to fetch dashboard data";

/// StoreError
///
/// Failures raised by a `DocumentStore` implementation.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A unique index rejected the write. Carries the offending field name.
    #[error("duplicate value for unique field '{0}'")]
    UniqueViolation(String),

    /// A stored document could not be converted to or from its typed model.
    #[error("document codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// ServiceError
///
/// Typed failures raised by the resource services and the auth extractor. The HTTP status and a
/// stable machine-readable code are derived here; handlers just return `Result<_, ServiceError>`.
///
/// ```json
/// {"code": "NOT_FOUND", "message": "Email not found"}
/// ```
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Malformed input. HTTP 400.
    #[error("{0}")]
    Validation(String),

    /// Missing or invalid bearer credential. HTTP 401.
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated but the role lacks the required right. HTTP 403.
    #[error("{0}")]
    PermissionDenied(String),

    /// Entity absent. HTTP 404.
    #[error("{0}")]
    NotFound(String),

    /// Uniqueness constraint violated ("Email already taken"). HTTP 400.
    #[error("{0}")]
    Conflict(String),

    /// Persistence failure. HTTP 500.
    #[error("{0}")]
    Storage(String),

    /// Any failure while building the dashboard. HTTP 500, opaque message.
    #[error("Failed to fetch dashboard data")]
    DashboardUnavailable,
}

impl ServiceError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ServiceError::Validation(_) => "VALIDATION_FAILED",
            ServiceError::Unauthorized(_) => "UNAUTHENTICATED",
            ServiceError::PermissionDenied(_) => "PERMISSION_DENIED",
            ServiceError::NotFound(_) => "NOT_FOUND",
            ServiceError::Conflict(_) => "ALREADY_EXISTS",
            ServiceError::Storage(_) => "STORAGE_ERROR",
            ServiceError::DashboardUnavailable => "DASHBOARD_UNAVAILABLE",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Validation(_) | ServiceError::Conflict(_) => StatusCode::BAD_REQUEST,
            ServiceError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ServiceError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Storage(_) | ServiceError::DashboardUnavailable => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UniqueViolation(field) => {
                ServiceError::Conflict(format!("{} already taken", field))
            }
            other => {
                tracing::error!("store failure: {:?}", other);
                ServiceError::Storage("Internal storage error".to_string())
            }
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = serde_json::json!({
            "code": self.error_code(),
            "message": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_code_mapping() {
        assert_eq!(ServiceError::Validation("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ServiceError::Conflict("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ServiceError::Unauthorized("x".into()).status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ServiceError::PermissionDenied("x".into()).status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ServiceError::NotFound("x".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ServiceError::DashboardUnavailable.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn unique_violation_becomes_conflict() {
        let err: ServiceError = StoreError::UniqueViolation("policyNumber".into()).into();
        assert!(matches!(err, ServiceError::Conflict(ref m) if m == "policyNumber already taken"));
    }

    #[test]
    fn dashboard_failure_hides_cause() {
        assert_eq!(ServiceError::DashboardUnavailable.to_string(), DASHBOARD_UNAVAILABLE);
    }

    #[tokio::test]
    async fn json_body_carries_code_and_message() {
        let resp = ServiceError::NotFound("Email not found".into()).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["code"], "NOT_FOUND");
        assert_eq!(body["message"], "Email not found");
    }
}
