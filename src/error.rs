//! Errors surfaced by the HTTP handlers

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::forms::FieldErrors;
use crate::importer::ImportError;

#[derive(Error, Debug)]
pub enum AppError {
    /// Form input rejected; nothing was persisted
    #[error("Validation failed: {0}")]
    Validation(FieldErrors),

    #[error("{0}")]
    NotFound(String),

    /// History import failed after the identity was registered
    #[error("History import failed: {0}")]
    Import(#[from] ImportError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<FieldErrors> for AppError {
    fn from(errors: FieldErrors) -> Self {
        AppError::Validation(errors)
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Import(ImportError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Import(ImportError::Storage(_)) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Import(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            AppError::Validation(fields) => {
                tracing::debug!("Rejected form: {}", fields);
                serde_json::json!({ "error": "Validation failed", "fields": fields })
            }
            AppError::NotFound(message) => {
                tracing::warn!("{}", message);
                serde_json::json!({ "error": message })
            }
            AppError::Import(ImportError::Storage(e)) | AppError::Internal(e) => {
                tracing::error!("Internal error: {:#}", e);
                serde_json::json!({ "error": "Internal server error" })
            }
            AppError::Import(e) => {
                tracing::error!("History import failed: {}", e);
                serde_json::json!({ "error": self.to_string(), "kind": import_kind(e) })
            }
        };
        (status, Json(body)).into_response()
    }
}

fn import_kind(err: &ImportError) -> &'static str {
    match err {
        ImportError::InvalidCredential(_) => "invalid_credential",
        ImportError::Unauthorized { .. } => "unauthorized",
        ImportError::Upstream { .. } => "upstream",
        ImportError::Timeout(_) => "timeout",
        ImportError::Network(_) => "network",
        ImportError::InvalidResponse(_) => "invalid_response",
        ImportError::Storage(_) => "storage",
    }
}
