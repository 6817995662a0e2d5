//! API error type and JSON error bodies.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::accounts::AccountError;
use crate::association::AssociationError;
use crate::core_state::CoreError;
use crate::credentials::CredentialError;
use crate::messaging::DispatchError;
use crate::otp::OtpError;

/// Error response body: `{ "message": ..., "error": CODE }`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
    pub error: &'static str,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Authentication failed: {0}")]
    AuthFailed(String),
    #[error("Authentication required")]
    Unauthorized,
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Rate limit exceeded")]
    RateLimited { retry_after: u64 },
    #[error("Message dispatch failed: {0}")]
    Dispatch(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::AuthFailed(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Dispatch(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "VALIDATION",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::AuthFailed(_) => "AUTH_FAILED",
            ApiError::Unauthorized => "AUTH_REQUIRED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::RateLimited { .. } => "RATE_LIMITED",
            ApiError::Dispatch(_) => "DISPATCH_FAILED",
            ApiError::Internal(_) => "INTERNAL",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            ApiError::BadRequest(detail)
            | ApiError::NotFound(detail)
            | ApiError::AuthFailed(detail)
            | ApiError::Forbidden(detail) => detail.clone(),
            ApiError::Conflict(_) => "Email already exists".to_string(),
            ApiError::Unauthorized => "Authentication required".to_string(),
            ApiError::RateLimited { retry_after } => {
                format!("Rate limit exceeded. Retry after {retry_after}s")
            }
            ApiError::Dispatch(detail) => {
                tracing::error!(detail, "Message dispatch failed");
                "Failed to send OTP".to_string()
            }
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                "An internal error occurred".to_string()
            }
        };

        let body = ErrorBody {
            message,
            error: self.code(),
        };

        let mut response = (self.status(), Json(body)).into_response();
        // Add retry-after header for rate limited responses
        if let ApiError::RateLimited { retry_after } = &self {
            if let Ok(val) = axum::http::HeaderValue::from_str(&retry_after.to_string()) {
                response.headers_mut().insert("Retry-After", val);
            }
        }
        response
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Database(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<crate::db::DatabaseError> for ApiError {
    fn from(err: crate::db::DatabaseError) -> Self {
        match err {
            crate::db::DatabaseError::DuplicateEmail(email) => ApiError::Conflict(email),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<CredentialError> for ApiError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::UnknownToken | CredentialError::TokenExpired => ApiError::Unauthorized,
            CredentialError::MalformedHash => ApiError::Internal(err.to_string()),
            CredentialError::Database(e) => e.into(),
        }
    }
}

impl From<AssociationError> for ApiError {
    fn from(err: AssociationError) -> Self {
        match err {
            AssociationError::NotFound { entity, .. } => {
                ApiError::NotFound(format!("{entity} not found"))
            }
            AssociationError::InvalidRole { expected, .. } => {
                ApiError::BadRequest(format!("Selected account is not a {expected}"))
            }
            AssociationError::Conflict(email) => ApiError::Conflict(email),
            AssociationError::Database(e) => e.into(),
        }
    }
}

impl From<AccountError> for ApiError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::Validation(msg) => ApiError::BadRequest(msg),
            AccountError::NotFound(msg) => ApiError::NotFound(msg),
            AccountError::Conflict(email) => ApiError::Conflict(email),
            AccountError::InvalidPassword => ApiError::AuthFailed("Invalid password".into()),
            AccountError::Association(e) => e.into(),
            AccountError::Credential(e) => e.into(),
            AccountError::Database(e) => e.into(),
        }
    }
}

impl From<OtpError> for ApiError {
    fn from(err: OtpError) -> Self {
        match err {
            OtpError::InvalidPhone => ApiError::BadRequest(err.to_string()),
            OtpError::UserNotFound { .. } => ApiError::NotFound(err.to_string()),
            OtpError::NoChallenge
            | OtpError::Expired
            | OtpError::Invalid { .. }
            | OtpError::Exhausted => ApiError::AuthFailed(err.to_string()),
            OtpError::StoreUnavailable => ApiError::Internal(err.to_string()),
            OtpError::Dispatch(e) => e.into(),
            OtpError::Database(e) => e.into(),
        }
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        ApiError::Dispatch(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(err: JsonRejection) -> Self {
        ApiError::BadRequest(err.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(err: QueryRejection) -> Self {
        ApiError::BadRequest(err.body_text())
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::Internal(format!("blocking task failed: {err}"))
    }
}
