// ⚠️ Error types for the reconciliation pipeline
// Only SourceFetchFailure aborts a run; everything else is recovered locally
// and surfaces in the diagnostic report.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvaderError {
    /// Raw label does not contain an `PREFIX_NNNN` identifier
    #[error("No identifier found in '{0}'")]
    NoIdentifierFound(String),

    /// A later or lower-priority feed claimed an id that is already fused
    #[error("Duplicate claim for {id} from feed '{feed}', first source wins")]
    DuplicateClaim { id: String, feed: String },

    /// A location feed could not be retrieved or decoded
    #[error("Failed to fetch location feed '{feed}': {reason}")]
    SourceFetchFailure { feed: String, reason: String },

    /// Feature has no usable (longitude, latitude) pair
    #[error("Feature '{0}' has no usable coordinate")]
    MalformedCoordinate(String),

    /// Padding repair ran out of candidates without a catalog hit
    #[error("No catalog match for '{raw}' after {attempts} retries")]
    RetryExhausted { raw: String, attempts: usize },

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl InvaderError {
    /// True for the only error class that must abort a run
    pub fn is_fatal(&self) -> bool {
        matches!(self, InvaderError::SourceFetchFailure { .. })
    }
}

/// Convenience Result type for pipeline operations
pub type Result<T> = std::result::Result<T, InvaderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_fetch_failure_is_fatal() {
        let fetch = InvaderError::SourceFetchFailure {
            feed: "umap".to_string(),
            reason: "timeout".to_string(),
        };
        assert!(fetch.is_fatal());
        assert!(!InvaderError::NoIdentifierFound("hello".to_string()).is_fatal());
        assert!(!InvaderError::MalformedCoordinate("PA_12".to_string()).is_fatal());
    }

    #[test]
    fn test_error_messages() {
        let err = InvaderError::DuplicateClaim {
            id: "PA_12".to_string(),
            feed: "feedB".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Duplicate claim for PA_12 from feed 'feedB', first source wins"
        );
    }
}
