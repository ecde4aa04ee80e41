//! Error types for the weaving engine

use std::path::PathBuf;

use entweave_core::Code;
use thiserror::Error;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that end a weave without a partial result
///
/// Schema and transform problems are never errors here; they reach the host
/// as diagnostics and the weave simply fails.
#[derive(Error, Debug)]
pub enum Error {
    /// Input module could not be read
    #[error("failed to read input {path}: {source}")]
    InputRead {
        /// Input path
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Cache entry could not be read
    #[error("failed to read cache entry {path}: {source}")]
    CacheRead {
        /// Entry path
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Cache entry could not be written
    #[error("failed to write cache entry {path}: {source}")]
    CacheWrite {
        /// Entry path
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Artifact could not be installed
    #[error("failed to write output {path}: {source}")]
    OutputWrite {
        /// Install path
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Referenced module could not be loaded
    #[error("failed to load referenced module {path}: {source}")]
    Reference {
        /// Reference path, resolved against the input's directory
        path: PathBuf,
        /// Loading error
        #[source]
        source: entweave_core::Error,
    },

    /// Woven module could not be serialized
    #[error("failed to serialize woven module: {0}")]
    Serialize(#[from] serde_yaml::Error),

    /// Effective configuration could not be serialized for the cache key
    #[error("failed to serialize configuration: {0}")]
    Config(#[from] serde_json::Error),

    /// Rust artifact could not be generated
    #[error("code generation failed: {0}")]
    Generation(String),
}

impl Error {
    /// Diagnostic code reported for this error
    pub fn code(&self) -> Code {
        match self {
            Error::InputRead { .. } => Code::InputRead,
            Error::CacheRead { .. } => Code::CacheRead,
            Error::CacheWrite { .. } => Code::CacheWrite,
            Error::OutputWrite { .. } => Code::OutputWrite,
            Error::Reference {
                source: entweave_core::Error::Read { .. },
                ..
            } => Code::InputRead,
            Error::Reference { .. } | Error::Generation(_) => Code::InvalidInput,
            Error::Serialize(_) | Error::Config(_) => Code::UnspecifiedFailure,
        }
    }

    /// Whether this is an environment fault rather than a problem with the
    /// declarations
    pub fn is_environment(&self) -> bool {
        self.code().is_environment()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn io() -> std::io::Error {
        std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied")
    }

    #[test]
    fn test_io_failures_are_environment_faults() {
        let err = Error::CacheWrite {
            path: PathBuf::from("cache/x"),
            source: io(),
        };
        assert_eq!(err.code(), Code::CacheWrite);
        assert!(err.is_environment());
    }

    #[test]
    fn test_reference_errors_by_cause() {
        let unreadable = Error::Reference {
            path: PathBuf::from("core.woven.yaml"),
            source: entweave_core::Error::Read {
                path: PathBuf::from("core.woven.yaml"),
                source: io(),
            },
        };
        assert!(unreadable.is_environment());

        let invalid = Error::Reference {
            path: PathBuf::from("core.woven.yaml"),
            source: entweave_core::Error::UnknownClass("x".to_string()),
        };
        assert_eq!(invalid.code(), Code::InvalidInput);
        assert!(!invalid.is_environment());
    }
}
