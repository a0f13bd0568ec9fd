//! Error types for the CLI

use thiserror::Error;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Errors that can occur in the CLI
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid argument
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Error message
        message: String,
    },

    /// A required external tool is not on PATH
    #[error("Required tool '{tool}' not found; install it and ensure it is on PATH")]
    MissingTool {
        /// Tool binary name
        tool: String,
    },

    /// Pipeline error bubbled up from the library
    #[error("QC pipeline error: {0}")]
    Pipeline(#[from] reelcheck::QcError),

    /// IO error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Create an invalid argument error
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a missing tool error
    #[must_use]
    pub fn missing_tool(tool: impl Into<String>) -> Self {
        Self::MissingTool { tool: tool.into() }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_argument_error() {
        let err = CliError::invalid_argument("no such profile");
        assert!(err.to_string().contains("Invalid argument"));
        assert!(err.to_string().contains("no such profile"));
    }

    #[test]
    fn test_missing_tool_error() {
        let err = CliError::missing_tool("ffprobe");
        assert!(err.to_string().contains("ffprobe"));
        assert!(err.to_string().contains("PATH"));
    }

    #[test]
    fn test_io_error_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let cli_err: CliError = io_err.into();
        assert!(cli_err.to_string().contains("I/O"));
    }

    #[test]
    fn test_pipeline_error_from() {
        let qc_err = reelcheck::QcError::config("bad segment length");
        let cli_err: CliError = qc_err.into();
        assert!(cli_err.to_string().contains("pipeline"));
    }
}
