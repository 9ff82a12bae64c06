//! Error types and reporting

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, ProbeError>;

/// Errors that stop a harvest.
///
/// Faults raised by the probed runtime itself never show up here; they are
/// absorbed by the extractor, the dummy builder and the prober.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config error in {path}: {message}")]
    Config { path: PathBuf, message: String },

    #[error("declaration error: {message}")]
    Declaration { message: String },

    #[error("sandbox error: {message}")]
    Sandbox { message: String },

    /// A structure refers to a type index the catalog never assigned.
    #[error("dangling type index {index} (catalog holds {len} types)")]
    DanglingType { index: i32, len: usize },

    #[error("malformed knowledge base: {message}")]
    Malformed { message: String },
}

impl ProbeError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn config(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Config {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn declaration(message: impl Into<String>) -> Self {
        Self::Declaration {
            message: message.into(),
        }
    }

    pub fn sandbox(message: impl Into<String>) -> Self {
        Self::Sandbox {
            message: message.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dangling_type_message() {
        let err = ProbeError::DanglingType { index: 7, len: 3 };
        assert_eq!(
            err.to_string(),
            "dangling type index 7 (catalog holds 3 types)"
        );
    }

    #[test]
    fn test_io_error_keeps_path() {
        let err = ProbeError::io(
            "/nowhere/out.json",
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        );
        assert!(err.to_string().contains("/nowhere/out.json"));
    }
}
