//! Result and error types for Reelcheck.

use thiserror::Error;

/// Result type for Reelcheck operations
pub type QcResult<T> = Result<T, QcError>;

/// Errors that can occur in Reelcheck
///
/// Note the taxonomy: a validator that crashes or times out is *not* an
/// error here — the supervisor represents that outcome as a `CRASHED`
/// report. These variants cover pipeline defects: contract violations,
/// broken tooling invocations, unusable configuration.
#[derive(Debug, Error)]
pub enum QcError {
    /// A validator report broke the output contract
    #[error("Report contract violation in '{module}': {message}")]
    ContractViolation {
        /// Module that produced the offending report
        module: String,
        /// What was violated
        message: String,
    },

    /// Media probing failed
    #[error("Probe of '{path}' failed: {message}")]
    Probe {
        /// Input path that could not be probed
        path: String,
        /// Error message
        message: String,
    },

    /// Segmentation failed before any segment could be produced
    #[error("Segmentation of '{path}' failed: {message}")]
    Segmentation {
        /// Input path
        path: String,
        /// Error message
        message: String,
    },

    /// Deviation file could not be parsed
    #[error("Deviation file '{path}' is malformed: {message}")]
    DeviationParse {
        /// Deviation file path
        path: String,
        /// Error message
        message: String,
    },

    /// Remediation collaborator failed
    #[error("Remediation failed: {message}")]
    Remediation {
        /// Error message
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl QcError {
    /// Create a contract violation error
    #[must_use]
    pub fn contract(module: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ContractViolation {
            module: module.into(),
            message: message.into(),
        }
    }

    /// Create a probe error
    #[must_use]
    pub fn probe(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Probe {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// True for contract violations, which abort the current unit of work
    #[must_use]
    pub const fn is_contract_violation(&self) -> bool {
        matches!(self, Self::ContractViolation { .. })
    }
}
