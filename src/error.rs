use thiserror::Error;

/// Errors raised by the vision analysis pipeline.
///
/// The retryable/fatal split drives the retry loop: 5xx-class provider
/// failures, timeouts, and transport errors may be re-attempted, 4xx-class
/// rejections (bad input, auth, quota) never are.
#[derive(Debug, Error)]
pub enum VisionError {
    /// 4xx-equivalent rejection. Propagates immediately, never retried.
    #[error("vision provider rejected the request ({status}): {message}")]
    Fatal { status: u16, message: String },

    /// 5xx-equivalent provider failure.
    #[error("vision provider error ({status}): {message}")]
    Server { status: u16, message: String },

    /// The in-flight request was cancelled after the configured deadline.
    /// Treated like a 504: retryable.
    #[error("vision request timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("network error calling vision provider: {0}")]
    Transport(#[from] reqwest::Error),

    /// All retry attempts were spent; wraps the last classified error.
    #[error("vision analysis failed after {attempts} attempt(s): {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: Box<VisionError>,
    },

    #[error("invalid image: {0}")]
    InvalidImage(String),
}

impl VisionError {
    /// Classify an HTTP status from the provider.
    pub fn from_status(status: u16, message: String) -> Self {
        if (500..600).contains(&status) {
            VisionError::Server { status, message }
        } else {
            VisionError::Fatal { status, message }
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            VisionError::Server { .. } | VisionError::Timeout { .. } | VisionError::Transport(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            VisionError::from_status(503, "unavailable".to_string()),
            VisionError::Server { status: 503, .. }
        ));
        assert!(matches!(
            VisionError::from_status(400, "bad request".to_string()),
            VisionError::Fatal { status: 400, .. }
        ));
        assert!(matches!(
            VisionError::from_status(429, "quota".to_string()),
            VisionError::Fatal { status: 429, .. }
        ));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(VisionError::Server {
            status: 500,
            message: "boom".to_string()
        }
        .is_retryable());
        assert!(VisionError::Timeout { seconds: 20 }.is_retryable());

        assert!(!VisionError::Fatal {
            status: 401,
            message: "bad key".to_string()
        }
        .is_retryable());
        assert!(!VisionError::InvalidImage("empty".to_string()).is_retryable());
        assert!(!VisionError::Exhausted {
            attempts: 2,
            source: Box::new(VisionError::Timeout { seconds: 20 }),
        }
        .is_retryable());
    }
}
