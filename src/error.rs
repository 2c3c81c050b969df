//! Crate-wide error taxonomy
//!
//! Setup errors (`Config`) and structural errors (`ShapeMismatch`) indicate a
//! programming or input mistake and always propagate to the caller. I/O-flavored
//! errors (`Persistence`, `Io`) carry enough context to name the failing
//! component in the final message.

use thiserror::Error;

/// Errors produced by training, persistence, and configuration
#[derive(Debug, Error)]
pub enum Error {
    /// Unknown noise mode, optimizer, activation, or invalid config value.
    /// Raised at setup, before any training step runs.
    #[error("configuration error: {0}")]
    Config(String),

    /// Tensor or parameter-tree structure disagreement
    #[error("shape mismatch in {context}: expected {expected}, got {actual}")]
    ShapeMismatch {
        /// Operation or component that detected the mismatch
        context: String,
        /// Expected structure description
        expected: String,
        /// Actual structure description
        actual: String,
    },

    /// A finite data split produced no elements where at least one was required
    #[error("data exhausted: {0}")]
    DataExhausted(String),

    /// Checkpoint write or read failure
    #[error("checkpoint persistence failed: {0}")]
    Persistence(String),

    /// Finalization requested but no checkpoint was ever persisted for the run
    #[error("no checkpoint available for run '{0}'")]
    NoCheckpoint(String),

    /// Byte-format encode/decode failure
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// Underlying filesystem error
    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl Error {
    /// Shorthand for a [`Error::ShapeMismatch`] with formatted endpoints
    pub fn shape_mismatch(
        context: impl Into<String>,
        expected: impl std::fmt::Debug,
        actual: impl std::fmt::Debug,
    ) -> Self {
        Error::ShapeMismatch {
            context: context.into(),
            expected: format!("{expected:?}"),
            actual: format!("{actual:?}"),
        }
    }
}

/// Convenience result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_mismatch_message_names_context() {
        let err = Error::shape_mismatch("forward model", [128usize, 128], [64usize, 64]);
        let msg = err.to_string();
        assert!(msg.contains("forward model"));
        assert!(msg.contains("[128, 128]"));
        assert!(msg.contains("[64, 64]"));
    }

    #[test]
    fn test_config_error_message() {
        let err = Error::Config("unknown noise mode 'Wavelet'".to_string());
        assert!(err.to_string().contains("Wavelet"));
    }

    #[test]
    fn test_io_error_converts() {
        fn read_missing() -> Result<Vec<u8>> {
            Ok(std::fs::read("/nonexistent/galaxia/file")?)
        }
        assert!(matches!(read_missing(), Err(Error::Io(_))));
    }
}
