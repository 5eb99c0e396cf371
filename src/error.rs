use aide::OperationOutput;
use axum::{http::StatusCode, response::IntoResponse, Json};
use schemars::JsonSchema;
use serde_json::json;

/// Represent errors in the application
///
/// All `ServiceError`s can be transformed to http errors.
#[derive(Debug, Clone, PartialEq, JsonSchema)]
pub enum ServiceError {
    /// Malformed or out-of-range input. Maps to `400 Bad Request`.
    BadRequest(&'static str, String),
    /// No valid session. Maps to `401 Unauthorized`.
    Unauthorized(&'static str),
    /// Valid session but missing permission. Maps to `403 Forbidden`.
    Forbidden(&'static str),
    NotFound,
    /// The locker controller responded with a non-success status.
    /// The response body is kept as error context.
    Upstream { status: u16, body: String },
    /// The locker controller response could not be parsed against
    /// the expected schema.
    UpstreamSchema(String),
    InternalServerError(String),
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl std::error::Error for ServiceError {}

/// Helper for `ServiceError` result
pub type ServiceResult<T> = Result<T, ServiceError>;

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ServiceError::NotFound,
            err => ServiceError::InternalServerError(err.to_string()),
        }
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        ServiceError::InternalServerError(err.to_string())
    }
}

impl OperationOutput for ServiceError {
    type Inner = String;
}
impl IntoResponse for ServiceError {
    fn into_response(self) -> axum::response::Response {
        match self {
            ServiceError::BadRequest(ref field, ref cause) => (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error": "Bad request",
                    "field": field,
                    "cause": cause,
                })),
            ),
            ServiceError::Unauthorized(cause) => (
                StatusCode::UNAUTHORIZED,
                Json(json!({
                    "error": "Unauthorized",
                    "cause": cause,
                })),
            ),
            ServiceError::Forbidden(cause) => (
                StatusCode::FORBIDDEN,
                Json(json!({
                    "error": "Forbidden",
                    "cause": cause,
                })),
            ),
            ServiceError::NotFound => (
                StatusCode::NOT_FOUND,
                Json(json!({
                    "error": "Not found",
                })),
            ),
            ServiceError::Upstream { status, ref body } => (
                StatusCode::BAD_GATEWAY,
                Json(json!({
                    "error": "Locker controller error",
                    "status": status,
                    "cause": body,
                })),
            ),
            ServiceError::UpstreamSchema(ref cause) => (
                StatusCode::BAD_GATEWAY,
                Json(json!({
                    "error": "Locker controller returned an unexpected response",
                    "cause": cause,
                })),
            ),
            ServiceError::InternalServerError(ref cause) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "cause": cause })),
            ),
        }
        .into_response()
    }
}
