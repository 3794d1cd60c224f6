use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::Error as SerdeJsonError;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Missing base64Image in request body.")]
    MissingImage,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("JSON error: {0}")]
    Json(#[from] SerdeJsonError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Document extraction failed: {message}")]
    Extraction {
        message: String,
        details: Option<Value>,
    },

    #[error("Generic error: {0}")]
    Generic(String),
}

impl AppError {
    /// Upstream payload attached to the failure, if any.
    pub fn details(&self) -> Option<&Value> {
        match self {
            AppError::Extraction { details, .. } => details.as_ref(),
            _ => None,
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let body = match self {
            AppError::MissingImage => serde_json::json!({
                "error": self.to_string(),
            }),
            _ => serde_json::json!({
                "success": false,
                "error": self.to_string(),
                "details": self.details(),
            }),
        };
        HttpResponse::build(self.status_code()).json(body)
    }

    fn status_code(&self) -> StatusCode {
        match *self {
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::MissingImage => StatusCode::BAD_REQUEST,
            AppError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Json(_) => StatusCode::BAD_REQUEST,
            AppError::Http(_) => StatusCode::BAD_GATEWAY,
            AppError::Extraction { .. } => StatusCode::BAD_GATEWAY,
            AppError::Generic(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
