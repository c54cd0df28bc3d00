//! Unified error type for the offline reader core.
//!
//! The error policy is degradation, not escalation: nothing in this
//! subsystem is allowed to become process-fatal. Persistence failures are
//! logged and the in-memory state remains the truth; a missing cache entry
//! is an `Option::None`, never an `Err`.

/// Unified error type shared across the workspace.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Durable read/write failure (bookmark set, snapshot, or image file).
    #[error("persistence failed: {0}")]
    Persistence(#[from] std::io::Error),

    /// The input could not be parsed as a fetchable URL.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Network-level or HTTP-status failure while fetching.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Response body exceeded the configured byte cap.
    #[error("response too large: {got} bytes exceeds {limit}")]
    TooLarge { got: usize, limit: usize },

    /// Navigation, capture, or deadline failure in the rendering engine.
    #[error("render failed: {0}")]
    Render(String),
}

impl From<crate::identity::UrlError> for Error {
    fn from(err: crate::identity::UrlError) -> Self {
        Error::InvalidUrl(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::TooLarge { got: 11, limit: 10 };
        assert!(err.to_string().contains("11 bytes exceeds 10"));
    }

    #[test]
    fn test_url_error_converts() {
        let err: Error = crate::identity::canonicalize("").unwrap_err().into();
        assert!(matches!(err, Error::InvalidUrl(_)));
    }
}
