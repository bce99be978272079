use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Transport-level failures (timeouts, refused connections) that a
    /// caller may retry against the same or another endpoint.
    pub fn is_transient(&self) -> bool {
        matches!(self, BridgeError::Timeout(_) | BridgeError::OperationFailed(_))
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
