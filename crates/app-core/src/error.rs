//! A centralized and idiomatic error handling module for the Axum web
//! application.
//!
//! Every failure surfaced to a handler is an [`AppError`]; its
//! [`IntoResponse`] impl renders the wire shape `{type, description}` used by
//! the API endpoints. Redirect-style endpoints are expected to catch errors
//! themselves and degrade to a redirect instead of emitting this body.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use super::config::ConfigError;
use super::oauth::OAuthError;
use super::password::HashingError;
use super::uid::SnowflakeError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation failed")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Validation failed")]
    ValidationStr(String),

    #[error("Invalid request format: {0}")]
    RequestFormat(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// A provider link already exists, either as the primary provider or as
    /// an additional connection. Carries the provider name.
    #[error("User is already connected using this provider")]
    AlreadyConnected(String),

    /// A required argument was absent or empty.
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// Establishing or reading the session failed.
    #[error("Session operation failed: {0}")]
    Session(String),

    // Internal Libraries
    #[error("Config operation failed")]
    Config(#[from] ConfigError),

    #[error("OAuth operation failed")]
    OAuth(#[from] OAuthError),

    #[error("Password Hashing operation failed")]
    Hashing(#[from] HashingError),

    #[error("Snowflake operation failed")]
    IdGeneration(#[from] SnowflakeError),

    // Third Party Libraries
    #[error("Store operation failed: {0}")]
    Store(#[from] sea_orm::DbErr),

    #[error("Serde JSON operation failed")]
    JsonParse(#[from] serde_json::Error),

    #[error("An internal server error occurred")]
    Internal,
}

/// The structured error body: `{"type": ..., "description": ...}`.
#[derive(Serialize)]
struct ErrorBody {
    #[serde(rename = "type")]
    kind: &'static str,
    description: String,
}

const INTERNAL_DESC: &str = "An internal server error occurred";

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind, description) = match self {
            AppError::Validation(err) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR", err.to_string()),
            AppError::ValidationStr(msg) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR", msg),
            AppError::RequestFormat(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),

            AppError::AlreadyConnected(provider) => {
                tracing::warn!(%provider, "Rejected duplicate provider link");
                (
                    StatusCode::CONFLICT,
                    "ALREADY_CONNECTED",
                    "User is already connected using this provider".to_string(),
                )
            },
            AppError::Precondition(msg) => (StatusCode::PRECONDITION_FAILED, "PRECONDITION_FAILED", msg),
            AppError::Session(err) => {
                tracing::error!("Session error: {err}");
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_SERVER_ERROR", "Internal server error".to_string())
            },

            // Internal Libraries
            AppError::Config(err) => {
                tracing::error!("Config getter error: {:?}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_SERVER_ERROR", INTERNAL_DESC.to_string())
            },
            AppError::OAuth(err) => {
                let status = match err {
                    OAuthError::InvalidUrl(_) | OAuthError::TokenExchange(_) | OAuthError::ProviderNotFound(_) => {
                        StatusCode::BAD_REQUEST
                    },
                    OAuthError::HttpClient(_) | OAuthError::ProfileParse => StatusCode::BAD_GATEWAY,
                };

                let description = match err {
                    OAuthError::InvalidUrl(_) | OAuthError::ProviderNotFound(_) => err.to_string(),
                    OAuthError::HttpClient(_) | OAuthError::ProfileParse => "OAuth provider unavailable".to_string(),
                    OAuthError::TokenExchange(_) => "OAuth operation failed".to_string(),
                };

                (status, "OAUTH_ERROR", description)
            },
            AppError::Hashing(err) => {
                tracing::error!("Password hashing error: {:?}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_SERVER_ERROR", INTERNAL_DESC.to_string())
            },
            AppError::IdGeneration(err) => {
                tracing::error!("ID generation error: {:?}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_SERVER_ERROR", INTERNAL_DESC.to_string())
            },

            // Third Party Libraries
            AppError::Store(err) => {
                tracing::error!("Store error: {:?}", err);
                // The description carries the underlying store message.
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_SERVER_ERROR", err.to_string())
            },
            AppError::JsonParse(err) => {
                tracing::error!("Failed to parse JSON: {:?}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_SERVER_ERROR", INTERNAL_DESC.to_string())
            },
            AppError::Internal => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_SERVER_ERROR", INTERNAL_DESC.to_string())
            },
        };

        (status, Json(ErrorBody { kind, description })).into_response()
    }
}
