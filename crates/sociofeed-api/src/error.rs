use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;

use sociofeed_auth::{PasswordError, TokenError};
use sociofeed_db::DbError;

use crate::mailer::MailError;
use crate::media::MediaError;

/// Stable error category, rendered as the `code` field of every error body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    BadRequest,
    Unauthorized,
    TokenExpired,
    InvalidCredentials,
    NotActivated,
    InvalidToken,
    Forbidden,
    NotFound,
    Conflict,
    Delivery,
    Internal,
}

impl ErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::BadRequest => "BAD_REQUEST",
            ErrorKind::Unauthorized => "UNAUTHORIZED",
            ErrorKind::TokenExpired => "TOKEN_EXPIRED",
            ErrorKind::InvalidCredentials => "INVALID_CREDENTIALS",
            ErrorKind::NotActivated => "NOT_ACTIVATED",
            ErrorKind::InvalidToken => "INVALID_TOKEN",
            ErrorKind::Forbidden => "FORBIDDEN",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::Delivery => "DELIVERY_FAILED",
            ErrorKind::Internal => "INTERNAL_ERROR",
        }
    }

    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::Validation | ErrorKind::BadRequest | ErrorKind::InvalidToken => {
                StatusCode::BAD_REQUEST
            }
            ErrorKind::Unauthorized | ErrorKind::TokenExpired | ErrorKind::InvalidCredentials => {
                StatusCode::UNAUTHORIZED
            }
            ErrorKind::NotActivated | ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Delivery | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Validation failed")]
    Validation(Vec<String>),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    TokenExpired(String),

    #[error("{0}")]
    InvalidCredentials(String),

    #[error("{0}")]
    NotActivated(String),

    #[error("{0}")]
    InvalidToken(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Delivery(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Validation(_) => ErrorKind::Validation,
            ApiError::BadRequest(_) => ErrorKind::BadRequest,
            ApiError::Unauthorized(_) => ErrorKind::Unauthorized,
            ApiError::TokenExpired(_) => ErrorKind::TokenExpired,
            ApiError::InvalidCredentials(_) => ErrorKind::InvalidCredentials,
            ApiError::NotActivated(_) => ErrorKind::NotActivated,
            ApiError::InvalidToken(_) => ErrorKind::InvalidToken,
            ApiError::Forbidden(_) => ErrorKind::Forbidden,
            ApiError::NotFound(_) => ErrorKind::NotFound,
            ApiError::Conflict(_) => ErrorKind::Conflict,
            ApiError::Delivery(_) => ErrorKind::Delivery,
            ApiError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let body = match self {
            ApiError::Validation(errors) => json!({ "errors": errors, "code": kind.code() }),
            ApiError::Internal(e) => {
                error!("Internal error: {:#}", e);
                json!({ "error": "Internal server error", "code": kind.code() })
            }
            ApiError::Delivery(message) => {
                error!("Delivery failure: {}", message);
                json!({ "error": message, "code": kind.code() })
            }
            other => json!({ "error": other.to_string(), "code": kind.code() }),
        };

        (kind.status(), Json(body)).into_response()
    }
}

impl From<DbError> for ApiError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::Conflict(detail) => {
                tracing::debug!("Constraint conflict: {}", detail);
                ApiError::Conflict("Resource already exists".into())
            }
            DbError::MissingReference(detail) => {
                tracing::debug!("Missing reference: {}", detail);
                ApiError::NotFound("Referenced resource not found".into())
            }
            other => ApiError::Internal(other.into()),
        }
    }
}

impl From<PasswordError> for ApiError {
    fn from(e: PasswordError) -> Self {
        ApiError::Internal(e.into())
    }
}

/// Only for token errors that escape a handler unclassified; the auth gate
/// and the session flows map their own messages.
impl From<TokenError> for ApiError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Encoding(_) => ApiError::Internal(e.into()),
            TokenError::Expired => ApiError::TokenExpired("Unauthorized: Token expired".into()),
            TokenError::Invalid | TokenError::WrongKind => {
                ApiError::Unauthorized("Unauthorized: Invalid token".into())
            }
        }
    }
}

impl From<MediaError> for ApiError {
    fn from(e: MediaError) -> Self {
        match e {
            MediaError::TooLarge { .. } => ApiError::BadRequest(e.to_string()),
            other => ApiError::Internal(other.into()),
        }
    }
}

impl From<MailError> for ApiError {
    fn from(e: MailError) -> Self {
        ApiError::Internal(e.into())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
