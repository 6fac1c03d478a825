#[derive(Debug, thiserror::Error)]
pub enum RingError {
    #[error("ring has no virtual nodes")]
    Empty,
    #[error("could not place block: need {required} healthy replicas, only {healthy} distinct physical nodes are healthy")]
    InsufficientReplicas { required: u32, healthy: u32 },
}
