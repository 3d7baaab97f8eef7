//! Converts `shared::Error` into the `{ kind, message, detail }` HTTP error
//! body (spec §6/§7). A thin newtype is required because neither the error
//! type nor `ResponseError` live in this crate.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
    pub detail: serde_json::Value,
}

pub struct ApiError(pub shared::Error);

impl From<shared::Error> for ApiError {
    fn from(err: shared::Error) -> Self {
        Self(err)
    }
}

impl fmt::Debug for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match &self.0 {
            shared::Error::Rejected(_) => StatusCode::CONFLICT,
            shared::Error::InvalidParams(_) => StatusCode::BAD_REQUEST,
            shared::Error::NotFound { .. } => StatusCode::NOT_FOUND,
            shared::Error::AdapterError { .. } => StatusCode::BAD_GATEWAY,
            shared::Error::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            shared::Error::Cancelled => StatusCode::OK,
            shared::Error::RollbackFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            shared::Error::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            shared::Error::Database(_) => StatusCode::BAD_GATEWAY,
            shared::Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        tracing::warn!(kind = self.0.kind(), error = %self.0, "request failed");
        HttpResponse::build(self.status_code()).json(ErrorBody {
            kind: self.0.kind().to_string(),
            message: self.0.to_string(),
            detail: serde_json::json!({}),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::ResponseError;

    #[test]
    fn test_not_found_maps_to_404() {
        let err: ApiError = shared::Error::not_found("attack", "1").into();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_invalid_params_maps_to_400() {
        let err: ApiError = shared::Error::invalid_params("bad").into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_rejected_maps_to_409() {
        let err: ApiError = shared::Error::rejected("busy").into();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }
}
