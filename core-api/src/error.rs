use bridge_traits::error::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    /// The instance answered 429. Not retried.
    #[error("Rate limited by {instance}")]
    RateLimited { instance: String },

    /// The caller cancelled the request.
    #[error("Request aborted")]
    Aborted,

    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Track response is missing {missing}")]
    MalformedTrackResponse { missing: String },

    #[error("No stream URL found in manifest for track {track_id}")]
    StreamUrlNotFound { track_id: i64 },

    #[error("No API instances configured")]
    NoInstances,

    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn is_aborted(&self) -> bool {
        matches!(self, ApiError::Aborted)
    }

    /// Whether another attempt (on the same or the next instance) may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Network(_) => true,
            ApiError::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Transport failures from the HTTP bridge. Retried like 5xx responses.
impl From<BridgeError> for ApiError {
    fn from(err: BridgeError) -> Self {
        ApiError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Decode(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(ApiError::Network("reset".into()).is_retryable());
        assert!(ApiError::Http { status: 503, url: "u".into() }.is_retryable());
        assert!(!ApiError::Http { status: 404, url: "u".into() }.is_retryable());
        assert!(!ApiError::RateLimited { instance: "i".into() }.is_retryable());
        assert!(!ApiError::Aborted.is_retryable());
        assert!(ApiError::from(BridgeError::Timeout("slow".into())).is_retryable());
    }

    #[test]
    fn test_aborted_is_distinguishable() {
        assert!(ApiError::Aborted.is_aborted());
        assert!(!ApiError::NoInstances.is_aborted());
    }
}
