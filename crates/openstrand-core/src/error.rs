//! Error types shared by the strand engine.

use thiserror::Error;

/// Errors produced by strand, mask, group and persistence operations.
#[derive(Debug, Error)]
pub enum StrandError {
    #[error("Invalid layer name: {0}")]
    InvalidLayerName(String),
    #[error("Duplicate layer name: {0}")]
    DuplicateLayerName(String),
    #[error("Strands {first} and {second} do not intersect")]
    MaskEmptyIntersection { first: String, second: String },
    #[error("No free endpoint to attach to")]
    AttachNoTargetEndpoint,
    #[error("Group not found: {0}")]
    GroupMissing(String),
    #[error("IO error: {0}")]
    PersistenceIo(String),
    #[error("History file is corrupt: {0}")]
    HistoryCorrupt(String),
    #[error("Invalid state file for step {step}: {reason}")]
    InvalidStateFile { step: usize, reason: String },
}

/// Result type for strand engine operations.
pub type StrandResult<T> = Result<T, StrandError>;

impl From<std::io::Error> for StrandError {
    fn from(err: std::io::Error) -> Self {
        StrandError::PersistenceIo(err.to_string())
    }
}

impl From<serde_json::Error> for StrandError {
    fn from(err: serde_json::Error) -> Self {
        StrandError::PersistenceIo(format!("Serialization error: {err}"))
    }
}

impl StrandError {
    /// Whether the error should be shown to the user.
    ///
    /// Empty intersections and missing attach targets are silent no-ops.
    pub fn is_user_visible(&self) -> bool {
        matches!(
            self,
            StrandError::PersistenceIo(_)
                | StrandError::HistoryCorrupt(_)
                | StrandError::InvalidStateFile { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_converts_to_persistence() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: StrandError = io.into();
        assert!(matches!(err, StrandError::PersistenceIo(_)));
        assert!(err.is_user_visible());
    }

    #[test]
    fn test_silent_errors() {
        let err = StrandError::MaskEmptyIntersection {
            first: "1_1".to_string(),
            second: "2_1".to_string(),
        };
        assert!(!err.is_user_visible());
        assert!(!StrandError::AttachNoTargetEndpoint.is_user_visible());
        assert_eq!(err.to_string(), "Strands 1_1 and 2_1 do not intersect");
    }
}
