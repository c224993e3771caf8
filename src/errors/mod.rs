//! Unified error handling for the import engine.

use crate::mapping::selector::SelectorError;
use crate::store::StoreError;

/// Error type covering the failure taxonomy of a sync run.
///
/// Configuration and feed errors abort a run before any catalog write;
/// per-listing and asset failures are handled inside the pipeline and never
/// surface as this type.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Feed error: {0}")]
    Feed(String),

    #[error("Malformed XML document: {0}")]
    Xml(String),

    #[error("Invalid selector: {0}")]
    Selector(#[from] SelectorError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ImportError {
    /// Check if this error originates from the feed document or archive.
    pub fn is_feed(&self) -> bool {
        matches!(self, Self::Feed(_) | Self::Xml(_))
    }

    /// Check if this error is a configuration problem.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::Selector(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_error_display() {
        let err = ImportError::Feed("no provider data available".to_string());
        assert_eq!(err.to_string(), "Feed error: no provider data available");
        assert!(err.is_feed());
        assert!(!err.is_configuration());
    }

    #[test]
    fn configuration_error_matcher() {
        let err = ImportError::Configuration("import folder missing".to_string());
        assert!(err.is_configuration());
        assert!(!err.is_feed());
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: ImportError = io.into();
        assert!(matches!(err, ImportError::Io(_)));
    }
}
