use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use hashmend_types::api::{ApiEnvelope, ApiError};
use hashmend_types::error::ServiceError;
use tracing::error;

/// Bridges `ServiceError` onto the uniform envelope. Denials and store
/// errors leave with generic bodies; the detail stays in the server log.
pub struct ApiFailure(pub ServiceError);

impl From<ServiceError> for ApiFailure {
    fn from(e: ServiceError) -> Self {
        ApiFailure(e)
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        let (status, payload) = match self.0 {
            ServiceError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                ApiError {
                    code: "validation_error",
                    message: msg,
                    retry_after_secs: None,
                    correlation_id: None,
                },
            ),
            ServiceError::NotFound { kind, id } => (
                StatusCode::NOT_FOUND,
                ApiError {
                    code: "not_found",
                    message: format!("{kind} {id} not found"),
                    retry_after_secs: None,
                    correlation_id: None,
                },
            ),
            ServiceError::Environment(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError {
                    code: "environment_error",
                    message: msg,
                    retry_after_secs: None,
                    correlation_id: None,
                },
            ),
            ServiceError::Repair { step, reason } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError {
                    code: "repair_failed",
                    message: format!(
                        "repair aborted at {} and all changes were rolled back: {reason}",
                        step.as_str()
                    ),
                    retry_after_secs: None,
                    correlation_id: None,
                },
            ),
            ServiceError::AccessDenied { correlation_id } => (
                StatusCode::FORBIDDEN,
                ApiError {
                    code: "access_denied",
                    message: "access denied".to_string(),
                    retry_after_secs: None,
                    correlation_id: Some(correlation_id),
                },
            ),
            ServiceError::RateLimited { retry_after_secs } => (
                StatusCode::TOO_MANY_REQUESTS,
                ApiError {
                    code: "rate_limited",
                    message: "too many requests for this action".to_string(),
                    retry_after_secs: Some(retry_after_secs),
                    correlation_id: None,
                },
            ),
            ServiceError::Store(e) => {
                error!("store error: {e:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiError {
                        code: "internal_error",
                        message: "internal error".to_string(),
                        retry_after_secs: None,
                        correlation_id: None,
                    },
                )
            }
        };

        let retry_after = payload.retry_after_secs;
        let body = Json(ApiEnvelope::<serde_json::Value>::err(payload));
        let mut response = (status, body).into_response();
        if let Some(secs) = retry_after {
            if let Ok(value) = secs.to_string().parse() {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}
