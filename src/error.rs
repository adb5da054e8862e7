//! HTTP-facing error taxonomy and its JSON rendering.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::auth::{jwt::TokenError, repo_types::StoreError};

/// One rejected input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub msg: &'static str,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed")]
    Validation(Vec<FieldError>),
    #[error("User already exists")]
    Conflict,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("no authorization header provided")]
    Unauthenticated,
    #[error("invalid authorization format, use 'Bearer <token>'")]
    MalformedHeader,
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error("user not found")]
    NotFound,
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_)
            | AppError::Conflict
            | AppError::InvalidCredentials
            | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated | AppError::MalformedHeader | AppError::Token(_) => {
                StatusCode::UNAUTHORIZED
            }
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION",
            AppError::Conflict => "CONFLICT",
            AppError::InvalidCredentials => "INVALID_CREDENTIALS",
            AppError::Unauthenticated => "UNAUTHENTICATED",
            AppError::MalformedHeader => "MALFORMED_HEADER",
            AppError::Token(TokenError::Expired) => "TOKEN_EXPIRED",
            AppError::Token(TokenError::BadSignature) => "BAD_SIGNATURE",
            AppError::Token(TokenError::Malformed) => "MALFORMED_TOKEN",
            AppError::NotFound => "NOT_FOUND",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::Internal(_) => "INTERNAL",
        }
    }

    /// Client-facing message. Internal detail never leaves the process.
    fn public_message(&self) -> String {
        match self {
            AppError::Token(TokenError::Expired) => "Token has expired".into(),
            AppError::Token(_) => "Invalid token".into(),
            AppError::Internal(_) => "Server error".into(),
            other => other.to_string(),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict => AppError::Conflict,
            StoreError::Backend(e) => AppError::Internal(e),
        }
    }
}

/// Body that is not JSON, has the wrong content type, or has fields of the
/// wrong type. The message is axum's own description of the rejection.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if let AppError::Internal(e) = &self {
            error!(error = ?e, "internal error");
        }

        let errors = match &self {
            AppError::Validation(fields) => json!(fields),
            other => json!([{ "msg": other.public_message() }]),
        };
        let body = Json(json!({
            "success": false,
            "code": self.code(),
            "errors": errors,
        }));
        (status, body).into_response()
    }
}
