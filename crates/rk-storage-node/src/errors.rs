use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rk_storage::StorageError;

/// Wraps a [`StorageError`] with the HTTP status a handler should reply with.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("malformed request body: {0}")]
    BadRequest(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServerError::Storage(StorageError::NotFound { .. }) => StatusCode::NOT_FOUND,
            ServerError::Storage(StorageError::KeyTooLong { .. }) => StatusCode::BAD_REQUEST,
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}
