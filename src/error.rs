use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Application-level error type shared by handlers, services and the worker.
///
/// Cache misses and queue timeouts are not errors; they are represented as
/// `Ok(None)` by the cache and queue traits. Everything here is either a
/// client-visible condition or an infrastructure failure.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// The requested entity does not exist in the store.
    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    /// Request input failed validation.
    #[error("{0}")]
    Validation(String),

    /// A unique constraint was violated (duplicate signup).
    #[error("{0}")]
    Conflict(String),

    /// Missing or invalid credentials.
    #[error("{0}")]
    Unauthorized(String),

    /// The second half of a two-step mutation failed; state is asymmetric.
    #[error("partial mutation: {step}")]
    PartialMutation {
        step: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// Store, cache or queue unreachable or misbehaving.
    #[error(transparent)]
    Infrastructure(#[from] anyhow::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => AppError::NotFound { entity: "record" },
            sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
                AppError::Conflict("already exists".into())
            }
            _ => AppError::Infrastructure(err.into()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound { .. } => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            // Internal failures are logged in full but never leak details.
            AppError::PartialMutation { step, source } => {
                tracing::error!(error = %source, step, "partial mutation failure");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".into())
            }
            AppError::Infrastructure(err) => {
                tracing::error!(error = %err, "infrastructure error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".into())
            }
        };

        let body = json!({ "ok": false, "msg": message });
        (status, axum::Json(body)).into_response()
    }
}
