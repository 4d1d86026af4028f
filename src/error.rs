use aide::OperationOutput;
use axum::{http::StatusCode, response::IntoResponse, Json};
use schemars::JsonSchema;
use serde_json::json;

/// Represent errors in the application
///
/// All `ServiceError`s can be transformed to http errors.
#[derive(Debug, Clone, PartialEq, Eq, JsonSchema)]
pub enum ServiceError {
    InternalServerError(String),
    NotFound,
    BadRequest(String),
    /// A card code that is malformed or fails its EAN-13 checksum.
    InvalidCode(String),
    /// A deployment limit was exceeded, eg the client id range that fits
    /// into a card code.
    Configuration(String),
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
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::RowNotFound => ServiceError::NotFound,
            error => ServiceError::InternalServerError(error.to_string()),
        }
    }
}

impl From<std::io::Error> for ServiceError {
    fn from(error: std::io::Error) -> Self {
        ServiceError::InternalServerError(error.to_string())
    }
}

impl OperationOutput for ServiceError {
    type Inner = String;
}
impl IntoResponse for ServiceError {
    fn into_response(self) -> axum::response::Response {
        match self {
            ServiceError::InternalServerError(ref cause) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "cause": cause })),
            ),
            ServiceError::NotFound => (
                StatusCode::NOT_FOUND,
                Json(json!({
                    "error": "Not found",
                })),
            ),
            ServiceError::BadRequest(ref cause) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "cause": cause })))
            }
            ServiceError::InvalidCode(ref cause) => (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error": "Invalid code",
                    "cause": cause,
                })),
            ),
            ServiceError::Configuration(ref cause) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Configuration",
                    "cause": cause,
                })),
            ),
        }
        .into_response()
    }
}
