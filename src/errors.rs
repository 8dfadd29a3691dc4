use std::path::PathBuf;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

pub type GuardianResult<T> = Result<T, GuardianError>;

#[derive(thiserror::Error, Debug)]
pub enum GuardianError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("protected role: {0}")]
    ProtectionViolation(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("token error: {0}")]
    Token(String),
    #[error("failed to read config file '{path}': {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file '{path}': {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("database error")]
    Database(#[from] sqlx::Error),
    #[error("internal server error: {0}")]
    Internal(String),
}

impl GuardianError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn protected(message: impl Into<String>) -> Self {
        Self::ProtectionViolation(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn token(err: impl Into<String>) -> Self {
        Self::Token(err.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    fn kind(&self) -> &'static str {
        match self {
            GuardianError::Configuration(_)
            | GuardianError::ConfigRead { .. }
            | GuardianError::ConfigParse { .. } => "configuration",
            GuardianError::ProtectionViolation(_) => "protected",
            GuardianError::Unauthorized(_) => "unauthorized",
            GuardianError::Forbidden(_) => "forbidden",
            GuardianError::NotFound(_) => "not_found",
            GuardianError::Conflict(_) => "conflict",
            GuardianError::BadRequest(_) => "bad_request",
            GuardianError::Token(_) => "token",
            GuardianError::Database(_) => "database",
            GuardianError::Internal(_) => "internal",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            GuardianError::Unauthorized(_) | GuardianError::Token(_) => StatusCode::UNAUTHORIZED,
            GuardianError::Forbidden(_) | GuardianError::ProtectionViolation(_) => StatusCode::FORBIDDEN,
            GuardianError::NotFound(_) => StatusCode::NOT_FOUND,
            GuardianError::Conflict(_) => StatusCode::CONFLICT,
            GuardianError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GuardianError::Configuration(_)
            | GuardianError::ConfigRead { .. }
            | GuardianError::ConfigParse { .. }
            | GuardianError::Database(_)
            | GuardianError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for GuardianError {
    fn into_response(self) -> Response {
        if let GuardianError::Database(err) = &self {
            tracing::error!(error = %err, "database error");
        }

        let payload = ErrorResponse {
            error: self.kind().to_string(),
            message: self.to_string(),
        };

        (self.status(), Json(payload)).into_response()
    }
}

impl From<anyhow::Error> for GuardianError {
    fn from(value: anyhow::Error) -> Self {
        Self::Internal(value.to_string())
    }
}
