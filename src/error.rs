use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::validation::ResponseFormat;

/// Every way a generation request can fail. Nothing is retried; each
/// variant ends the request.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Missing prompt in request")]
    MissingInput,
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Provider request failed: {0}")]
    ProviderCall(String),
    #[error("Invalid API response {0}")]
    InvalidProviderResponse(ResponseFormat),
    #[error("Failed to persist image: {0}")]
    Persistence(String),
    #[error("Generation {0} not found")]
    NotFound(i64),
}

impl GenerationError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingInput | Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::ProviderCall(_) | Self::InvalidProviderResponse(_) => StatusCode::BAD_GATEWAY,
            Self::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

impl From<sqlx::Error> for GenerationError {
    fn from(err: sqlx::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for GenerationError {
    fn into_response(self) -> Response {
        (
            self.status(),
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_requested_format() {
        assert_eq!(
            GenerationError::InvalidProviderResponse(ResponseFormat::Url).to_string(),
            "Invalid API response url"
        );
        assert_eq!(
            GenerationError::InvalidProviderResponse(ResponseFormat::B64Json).to_string(),
            "Invalid API response b64_json"
        );
    }

    #[test]
    fn status_follows_failure_kind() {
        assert_eq!(GenerationError::MissingInput.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            GenerationError::ProviderCall("timeout".into()).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            GenerationError::Persistence("disk full".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(GenerationError::NotFound(3).status(), StatusCode::NOT_FOUND);
    }
}
