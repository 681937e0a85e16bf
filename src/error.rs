use axum::{
    Json,
    extract::{
        FromRequest, FromRequestParts, Query, Request,
        rejection::JsonRejection,
    },
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;

use crate::repository::RepoError;

/// ErrorResponse
///
/// The JSON envelope returned for every failed request.
#[derive(Debug, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

/// AppError
///
/// The single error type surfaced by handlers and the service layer. The HTTP
/// status is chosen from the variant alone; message text never drives dispatch.
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed or out-of-range input (400).
    #[error("validation error: {0}")]
    Validation(String),

    /// Missing, malformed, or expired credentials (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The referenced entity does not exist (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// A uniqueness rule was violated (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Storage or unexpected failure (500). The detail is logged, never returned.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (code, message) = match self {
            AppError::Validation(msg) => ("VALIDATION_ERROR", msg),
            AppError::Unauthorized(msg) => ("UNAUTHORIZED", msg),
            AppError::NotFound(msg) => ("NOT_FOUND", msg),
            AppError::Conflict(msg) => ("CONFLICT", msg),
            AppError::Internal(detail) => {
                tracing::error!(error = %detail, "internal error");
                ("INTERNAL_SERVER_ERROR", "internal server error".to_string())
            }
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<RepoError> for AppError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::NotFound => AppError::not_found("record not found"),
            RepoError::Conflict => AppError::Conflict("record already exists".to_string()),
            RepoError::InvalidReference => {
                AppError::validation("author_id or genre_id does not exist")
            }
            RepoError::Timeout => AppError::internal("storage deadline exceeded"),
            RepoError::Db(e) => AppError::internal(format!("database error: {e}")),
        }
    }
}

/// Result type alias for service and handler operations.
pub type AppResult<T> = Result<T, AppError>;

/// ApiJson
///
/// Drop-in replacement for `axum::Json` on request bodies. Any body that fails
/// to parse or to match the target type is rejected with a 400 in the standard
/// error envelope, instead of axum's default 415/422 plain-text responses.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(AppError::validation(rejection.body_text())),
        }
    }
}

/// ApiQuery
///
/// `axum::extract::Query` with rejections (e.g. a repeated or mistyped key)
/// reported as a 400 in the standard error envelope.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(ApiQuery(value)),
            Err(rejection) => Err(AppError::validation(rejection.body_text())),
        }
    }
}
