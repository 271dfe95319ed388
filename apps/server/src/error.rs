use axum::Json;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use pixhost_storage::StorageError;
use serde::Serialize;
use std::borrow::Cow;
use tracing::{debug, error};

/// Failures surfaced by request handlers.
#[pixhost_derive::pixhost_error]
pub enum ApiError {
    #[error("{source}")]
    Storage { source: StorageError, context: Option<Cow<'static, str>> },

    #[error("Unauthorized{}: {message}", format_context(.context))]
    Unauthorized { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Bad request{}: {message}", format_context(.context))]
    BadRequest { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Internal server error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    success: bool,
    error: String,
    code: &'a str,
}

impl ApiError {
    pub(crate) fn bad_request(message: impl Into<Cow<'static, str>>) -> Self {
        Self::BadRequest { message: message.into(), context: None }
    }

    /// Stable outcome code; storage failures report their own taxonomy.
    #[must_use]
    pub const fn outcome(&self) -> &'static str {
        match self {
            Self::Storage { source, .. } => source.code(),
            other => other.code(),
        }
    }

    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Storage { source, .. } => match source {
                StorageError::UnsupportedType { .. }
                | StorageError::SizeLimit { .. }
                | StorageError::Containment { .. } => StatusCode::BAD_REQUEST,
                StorageError::NotFound { .. } => StatusCode::NOT_FOUND,
                StorageError::Conflict { .. } => StatusCode::CONFLICT,
                StorageError::BadArchive { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                StorageError::Io { .. } | StorageError::Internal { .. } => {
                    StatusCode::INTERNAL_SERVER_ERROR
                },
            },
            Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return StorageError::SizeLimit {
                message: err.body_text().into(),
                context: Some("Request body too large".into()),
            }
            .into();
        }
        Self::BadRequest { message: err.body_text().into(), context: Some("Malformed multipart body".into()) }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(code = self.outcome(), error = %self, "Request failed");
        } else {
            debug!(code = self.outcome(), error = %self, "Request rejected");
        }

        let body = ErrorBody { success: false, error: self.to_string(), code: self.outcome() };
        (status, Json(body)).into_response()
    }
}
