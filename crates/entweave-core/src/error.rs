//! Error types for entweave-core

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for entweave-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in entweave-core
///
/// Structural problems in user declarations are not errors in this sense;
/// they are reported as [`crate::Diagnostic`]s through the host.
#[derive(Error, Debug)]
pub enum Error {
    /// Module file could not be deserialized
    #[error("failed to parse module: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// Module deserialized but violates the declaration rules
    #[error("invalid declaration at {location}: {message}")]
    InvalidDeclaration {
        /// Where in the module the problem is (e.g. `classes[2].members[0]`)
        location: String,
        /// Description of the problem
        message: String,
    },

    /// A file could not be read
    #[error("failed to read {path}: {source}")]
    Read {
        /// Path that failed
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Configuration file could not be found
    #[error("configuration file not found: {path}")]
    ConfigNotFound {
        /// Path that was searched
        path: String,
    },

    /// The interpreter was asked about a class the module does not declare
    #[error("unknown class '{0}'")]
    UnknownClass(String),

    /// The interpreter was asked about a member the class does not have
    #[error("class '{class}' has no stored member '{member}'")]
    UnknownMember {
        /// Class name
        class: String,
        /// Member name
        member: String,
    },

    /// A method body is user source text and cannot be evaluated
    #[error("method '{method}' of '{class}' has a user-written body")]
    OpaqueBody {
        /// Class name
        class: String,
        /// Method name
        method: String,
    },

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
