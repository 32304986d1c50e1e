use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::validation::payload::FieldIssue;

/// The application's error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// A database error.
    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    /// A connection pool error.
    #[error("Pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    /// The pool could not be built from the configuration.
    #[error("Pool setup error: {0}")]
    PoolSetup(#[from] deadpool_postgres::CreatePoolError),

    /// The backend-as-a-service could not be reached or answered garbage.
    #[error("Upstream error: {0}")]
    Upstream(#[from] reqwest::Error),

    /// The backend-as-a-service answered with an unexpected status.
    #[error("Upstream rejected request ({status}): {message}")]
    UpstreamStatus { status: u16, message: String },

    /// Credentials were rejected by the auth provider.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// No session, or the session was rejected.
    #[error("Unauthorized")]
    Unauthorized,

    /// The request was authenticated but refused (CSRF).
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The row does not exist or is not owned by the caller.
    #[error("Resource not found")]
    NotFound,

    /// The payload failed schema validation.
    #[error("Invalid payload ({} issue(s))", .0.len())]
    InvalidPayload(Vec<FieldIssue>),

    /// A single validation message without field detail.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An internal server error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

/// A `Result` type that uses `AppError` as the error type.
pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a [FieldIssue]>,
}

impl AppError {
    /// The HTTP status this error maps to.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Database(_)
            | AppError::Pool(_)
            | AppError::PoolSetup(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Upstream(_) | AppError::UpstreamStatus { .. } => StatusCode::BAD_GATEWAY,
            AppError::Authentication(_) | AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::InvalidPayload(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// A short machine-readable kind for the error body.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Database(_) | AppError::Pool(_) | AppError::PoolSetup(_) => "database",
            AppError::Upstream(_) | AppError::UpstreamStatus { .. } => "upstream",
            AppError::Authentication(_) => "authentication",
            AppError::Unauthorized => "unauthorized",
            AppError::Forbidden(_) => "forbidden",
            AppError::NotFound => "not_found",
            AppError::InvalidPayload(_) => "invalid_payload",
            AppError::Validation(_) => "validation",
            AppError::Internal(_) => "internal",
        }
    }

    /// The message shown to callers. Infrastructure detail stays in the logs.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                "Database error".to_string()
            }
            AppError::Pool(e) => {
                tracing::error!("Pool error: {}", e);
                "Database unavailable".to_string()
            }
            AppError::PoolSetup(e) => {
                tracing::error!("Pool setup error: {}", e);
                "Database unavailable".to_string()
            }
            AppError::Upstream(e) => {
                tracing::error!("Upstream error: {}", e);
                "Backend service unavailable".to_string()
            }
            AppError::UpstreamStatus { status, message } => {
                tracing::error!("Upstream rejected request ({}): {}", status, message);
                "Backend service error".to_string()
            }
            AppError::Authentication(msg) => {
                tracing::warn!("Authentication failed: {}", msg);
                msg.clone()
            }
            AppError::Unauthorized => {
                tracing::debug!("Unauthorized request");
                "Unauthorized".to_string()
            }
            AppError::Forbidden(msg) => {
                tracing::warn!("Forbidden: {}", msg);
                msg.clone()
            }
            AppError::NotFound => "Resource not found".to_string(),
            AppError::InvalidPayload(issues) => {
                tracing::debug!("Invalid payload: {:?}", issues);
                "Invalid payload".to_string()
            }
            AppError::Validation(msg) => {
                tracing::debug!("Validation error: {}", msg);
                msg.clone()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let details = match &self {
            AppError::InvalidPayload(issues) => Some(issues.as_slice()),
            _ => None,
        };

        let body = sonic_rs::to_string(&ErrorBody {
            error: self.kind(),
            message: self.public_message(),
            details,
        })
        .unwrap_or_else(|_| {
            r#"{"error":"internal","message":"Internal server error"}"#.to_string()
        });

        (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_error_taxonomy() {
        assert_eq!(AppError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::InvalidPayload(vec![]).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Forbidden("csrf".into()).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::UpstreamStatus {
                status: 500,
                message: "boom".into()
            }
            .status(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn internal_details_are_not_exposed() {
        let err = AppError::Internal("row 42 had a null id".into());
        assert_eq!(err.public_message(), "Internal server error");
    }
}
