// src/error.rs
//! Error taxonomy for the certificate registry.
//!
//! Every failure of a registry operation is surfaced to the caller as a typed
//! [`RegistryError`]. The HTTP layer maps each variant onto a status code and a
//! JSON error body. Tampering is *not* an error: it is reported as a
//! verification outcome (see [`crate::models::certificate::VerificationOutcome`]).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Errors returned by registry, verifier, auth and storage operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Bad or missing input. Caller's fault, never retried automatically.
    #[error("validation error: {0}")]
    Validation(String),

    /// No identity, or an identity that could not be authenticated.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated actor without the rights for the requested operation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Unknown certificate id.
    #[error("certificate not found: {0}")]
    NotFound(String),

    /// Revocation of a certificate that is already revoked.
    #[error("certificate already revoked: {0}")]
    AlreadyRevoked(String),

    /// Creation of an account whose username is already taken.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Failure of the underlying storage backend.
    #[error("storage error: {0}")]
    Storage(String),
}

impl RegistryError {
    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            RegistryError::Validation(_) => "validation_error",
            RegistryError::Unauthorized(_) => "unauthorized_error",
            RegistryError::Forbidden(_) => "forbidden_error",
            RegistryError::NotFound(_) => "not_found_error",
            RegistryError::AlreadyRevoked(_) => "already_revoked_error",
            RegistryError::Conflict(_) => "conflict_error",
            RegistryError::Storage(_) => "storage_error",
        }
    }

    /// HTTP status the API answers with for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            RegistryError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            RegistryError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            RegistryError::Forbidden(_) => StatusCode::FORBIDDEN,
            RegistryError::NotFound(_) => StatusCode::NOT_FOUND,
            RegistryError::AlreadyRevoked(_) | RegistryError::Conflict(_) => StatusCode::CONFLICT,
            RegistryError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<std::io::Error> for RegistryError {
    fn from(e: std::io::Error) -> Self {
        RegistryError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for RegistryError {
    fn from(e: serde_json::Error) -> Self {
        RegistryError::Storage(e.to_string())
    }
}

impl IntoResponse for RegistryError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("request failed: {}", self);
        }
        let body = json!({
            "success": false,
            "error": {
                "code": status.as_u16(),
                "kind": self.kind(),
                "message": self.to_string(),
            }
        });
        (status, Json(body)).into_response()
    }
}
