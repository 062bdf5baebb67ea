//! Error types for inferret-core

use std::path::PathBuf;

use thiserror::Error;

/// Fatal errors that stop a run before (or instead of) concurrent execution.
#[derive(Error, Debug)]
pub enum InferError {
    /// The Inferfile is malformed: bad syntax, wrong types, missing or
    /// out-of-range fields.
    #[error("{}:{line}: {message}", document.display())]
    Parse {
        document: PathBuf,
        line: usize,
        message: String,
    },

    /// A `file` entry names a path that does not exist.
    #[error("file not found: {path} ({}: line {line})", document.display())]
    Reference {
        path: String,
        document: PathBuf,
        line: usize,
    },

    /// A file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The orchestrator was asked to run with zero admission slots.
    #[error("parallelism must be at least 1")]
    InvalidParallelism,
}

/// Result type for inferret-core operations.
pub type Result<T> = std::result::Result<T, InferError>;

/// Failure of a single oracle call.
///
/// Any one of these aborts the inference that issued the call; sibling
/// inferences are unaffected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    /// The request never produced an HTTP response.
    #[error("oracle transport error: {0}")]
    Transport(String),

    /// The oracle answered with a non-success status code.
    #[error("oracle returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body did not decode into a completion.
    #[error("malformed oracle response: {0}")]
    MalformedResponse(String),

    /// The completion text was not a `{"assertion": <bool>}` envelope.
    #[error("malformed verdict {content:?}: {reason}")]
    MalformedVerdict { content: String, reason: String },

    /// The oracle client itself is misconfigured.
    #[error("oracle configuration error: {0}")]
    Configuration(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_error_names_path_and_line() {
        let err = InferError::Reference {
            path: "./this/file/does/not/exist".to_string(),
            document: PathBuf::from("Inferfile"),
            line: 1,
        };
        assert_eq!(
            err.to_string(),
            "file not found: ./this/file/does/not/exist (Inferfile: line 1)"
        );
    }

    #[test]
    fn parse_error_is_prefixed_with_location() {
        let err = InferError::Parse {
            document: PathBuf::from("Inferfile"),
            line: 7,
            message: "count must be at least 1".to_string(),
        };
        assert_eq!(err.to_string(), "Inferfile:7: count must be at least 1");
    }
}
