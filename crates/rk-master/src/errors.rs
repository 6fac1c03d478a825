use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

#[derive(Debug, thiserror::Error)]
pub enum MasterError {
    #[error("key not found")]
    NotFound,
    #[error("storage node unavailable: {reason}")]
    Unavailable { reason: String },
    #[error("internal error: {message}")]
    Internal { message: String },
    #[error("cannot place block: need {required} healthy replicas, only {healthy} available")]
    InsufficientReplicas { required: u32, healthy: u32 },
}

impl From<rk_ring::RingError> for MasterError {
    fn from(err: rk_ring::RingError) -> Self {
        match err {
            rk_ring::RingError::Empty => MasterError::Internal {
                message: "hash ring has no virtual nodes".to_string(),
            },
            rk_ring::RingError::InsufficientReplicas { required, healthy } => {
                MasterError::InsufficientReplicas { required, healthy }
            }
        }
    }
}

impl IntoResponse for MasterError {
    fn into_response(self) -> Response {
        let status = match &self {
            MasterError::NotFound => StatusCode::NOT_FOUND,
            MasterError::Unavailable { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            MasterError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            MasterError::InsufficientReplicas { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}
