//! Failure taxonomy for a single fetch cycle
//!
//! None of these ever escape `fetch_data`; they are recorded as the
//! collection's last error and published on the `Error` topic.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// The source hint could not be turned into a usable address
    #[error("Bad data URL '{hint}': {reason}")]
    Resolution { hint: String, reason: String },

    /// The server answered with a non-2xx status
    #[error("Failed to fetch {url}: HTTP {status} {reason}")]
    Status {
        url: String,
        status: u16,
        reason: String,
    },

    /// Network or filesystem failure before a response was available
    #[error("Exception fetching {url}: {message}")]
    Transport { url: String, message: String },

    /// Body was not a well-formed `{ "entries": [...] }` document
    #[error("Bad response from {url}: {message}")]
    Parse { url: String, message: String },
}

impl FetchError {
    /// Short category name used in structured log lines
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Resolution { .. } => "resolution",
            FetchError::Status { .. } => "status",
            FetchError::Transport { .. } => "transport",
            FetchError::Parse { .. } => "parse",
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            FetchError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_display() {
        let err = FetchError::Status {
            url: "https://ring.example/a.json".to_string(),
            status: 500,
            reason: "Internal Server Error".to_string(),
        };

        assert_eq!(err.kind(), "status");
        assert_eq!(err.status_code(), Some(500));
        assert!(err.to_string().contains("HTTP 500"));
    }

    #[test]
    fn test_non_status_errors_have_no_code() {
        let err = FetchError::Parse {
            url: "file:///tmp/x.json".to_string(),
            message: "expected value".to_string(),
        };
        assert_eq!(err.kind(), "parse");
        assert_eq!(err.status_code(), None);
    }
}
