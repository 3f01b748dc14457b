/**
 * Error Conversion
 *
 * Conversions from store-level errors into the backend taxonomy, and
 * conversion of backend errors into HTTP responses.
 *
 * # Response Format
 *
 * ```json
 * {
 *   "error": { "kind": "not_found", "message": "..." },
 *   "status": 404
 * }
 * ```
 */

use axum::{
    response::{IntoResponse, Response},
    Json,
};

use crate::backend::error::types::BackendError;

impl From<sqlx::Error> for BackendError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => BackendError::not_found("row not found"),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                BackendError::conflict(db.message().to_string())
            }
            other => BackendError::internal(format!("database error: {}", other)),
        }
    }
}

impl From<redis::RedisError> for BackendError {
    fn from(err: redis::RedisError) -> Self {
        BackendError::internal(format!("coordination store error: {}", err))
    }
}

impl IntoResponse for BackendError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = serde_json::json!({
            "error": self.to_payload(),
            "status": status.as_u16(),
        });

        (status, Json(body)).into_response()
    }
}
