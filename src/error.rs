//! Error types and their HTTP mapping.
//!
//! Services return [`AppError`]; handlers turn it into an [`ApiError`], which renders as
//! `{"error": ..., "details": ...}` with the matching status code.

use crate::infrastructure::gemini::GenerationError;
use crate::infrastructure::haravan::CatalogFetchError;
use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use log::error;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    CatalogFetch(#[from] CatalogFetchError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("database error: {0}")]
    Storage(#[from] sqlx::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::CatalogFetch(_) | AppError::Generation(_) | AppError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Client errors speak for themselves; server errors get `summary` as the headline
    /// and the underlying message as `details`.
    pub fn context(self, summary: &str) -> ApiError {
        let status = self.status();
        if status.is_server_error() {
            error!("{summary}: {self}");
            ApiError {
                status,
                error: summary.to_owned(),
                details: Some(self.to_string()),
            }
        } else {
            ApiError {
                status,
                error: self.to_string(),
                details: None,
            }
        }
    }
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub error: String,
    pub details: Option<String>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a str>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: &self.error,
            details: self.details.as_deref(),
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<AppError> for ApiError {
    fn from(e: AppError) -> Self {
        e.context("Internal Server Error")
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError {
            status: StatusCode::BAD_REQUEST,
            error: "Invalid request body".to_owned(),
            details: Some(rejection.body_text()),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError {
            status: StatusCode::BAD_REQUEST,
            error: "Invalid query string".to_owned(),
            details: Some(rejection.body_text()),
        }
    }
}
