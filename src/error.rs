use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use thiserror::Error;

use crate::{repository::RepositoryError, storage::UploadError};

/// Result alias used by every handler.
pub type ApiResult<T> = Result<T, ApiError>;

/// ApiError
///
/// The failure taxonomy of the HTTP surface. Each variant maps to exactly one status code
/// and renders as `{ "error": <kind>, "msg": <message> }`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing, malformed or badly signed bearer token, or wrong credentials.
    #[error("{0}")]
    Unauthenticated(String),

    /// Valid principal, but its role or a business rule forbids the operation.
    #[error("{0}")]
    Forbidden(String),

    /// A token that verified correctly names a principal that no longer exists.
    /// Rendered as 404 for compatibility with existing clients.
    #[error("Usuario no encontrado")]
    PrincipalNotFound,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Método no permitido")]
    MethodNotAllowed,

    /// Upload extension outside the allow-list. Carries both lists for the client.
    #[error("Tipo de archivo no permitido")]
    UnsupportedMediaType {
        images: Vec<&'static str>,
        videos: Vec<&'static str>,
    },

    #[error("Error al subir archivo: {0}")]
    UploadFailed(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::PrincipalNotFound | ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::UnsupportedMediaType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::UploadFailed(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Stable machine-readable kind, sent alongside the human message.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Unauthenticated(_) => "unauthenticated",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::PrincipalNotFound | ApiError::NotFound(_) => "not_found",
            ApiError::Conflict(_) => "conflict",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::MethodNotAllowed => "method_not_allowed",
            ApiError::UnsupportedMediaType { .. } => "unsupported_media_type",
            ApiError::UploadFailed(_) => "upload_failed",
            ApiError::Internal(_) => "internal",
        }
    }

    pub fn not_found(entity: &str) -> Self {
        ApiError::NotFound(format!("{} no encontrado", entity))
    }

    fn body(&self) -> Value {
        let mut body = json!({
            "error": self.kind(),
            "msg": self.to_string(),
        });
        if let ApiError::UnsupportedMediaType { images, videos } = self {
            body["allowed_formats"] = json!({ "images": images, "videos": videos });
        }
        body
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, kind = self.kind(), "request failed");
        } else {
            tracing::debug!(error = %self, kind = self.kind(), "request rejected");
        }
        (status, Json(self.body())).into_response()
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::UniqueViolation(what) => {
                ApiError::Conflict(format!("{} ya existe", what))
            }
            RepositoryError::Database(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::MissingFile => ApiError::BadRequest(err.to_string()),
            UploadError::InvalidPath(_) => ApiError::BadRequest(err.to_string()),
            UploadError::UnsupportedExtension { .. } => ApiError::UnsupportedMediaType {
                images: crate::storage::IMAGE_EXTENSIONS.to_vec(),
                videos: crate::storage::VIDEO_EXTENSIONS.to_vec(),
            },
            UploadError::NotConfigured(_) | UploadError::Io(_) | UploadError::Transport(_) => {
                ApiError::UploadFailed(err.to_string())
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}
