//! Error responses for the admin API.
//!
//! Every failure leaves as `{code, message}` with a status matching the
//! domain error. Backend details are logged, not returned.

use crate::error::Error;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorResponse,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorResponse {
                code: code.to_string(),
                message: message.into(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

pub fn api_unauthorized(message: &str) -> ApiError {
    ApiError::new(StatusCode::UNAUTHORIZED, "unauthorized", message)
}

pub fn api_bad_request(message: &str) -> ApiError {
    ApiError::new(StatusCode::BAD_REQUEST, "validation_error", message)
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = match &err {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::DuplicateCode(_) | Error::DuplicateKey(_) => StatusCode::CONFLICT,
            Error::BaseLanguageProtected => StatusCode::FORBIDDEN,
            Error::UnsupportedFormat(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Error::MissingCredential => StatusCode::PRECONDITION_FAILED,
            Error::Network(_) => StatusCode::BAD_GATEWAY,
            Error::Store(inner) => {
                error!("Store failure: {:#}", inner);
                return ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    err.code(),
                    "internal server error",
                );
            }
            _ if err.is_validation() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError::new(status, err.code(), err.to_string())
    }
}
