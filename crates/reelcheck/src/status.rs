//! QC status enum and escalation ordering.
//!
//! The ordering is the heart of aggregation: merging any number of module
//! verdicts always keeps the worst status seen, and "worst" is defined
//! once, here.
//!
//! ```text
//! NOT_APPLICABLE (0) < PASSED (1) < WARNING (2) < REJECTED (3) < ERROR (4)
//!                                                                CRASHED (4)
//! ```
//!
//! `CRASHED` is a synthetic terminal state (execution never produced a
//! valid report) and ranks with `ERROR`. `NOT_APPLICABLE` is an `ERROR`
//! downgraded by policy and can never worsen an aggregate.

use serde::{Deserialize, Serialize};

/// Verdict of a single QC module, or of a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    /// Check passed with no findings
    Passed,
    /// Non-blocking findings
    Warning,
    /// Content defect; always fatal, never softened by policy
    Rejected,
    /// Execution or tooling defect; fatal unless a deviation applies
    Error,
    /// Validator never produced a valid report (synthesized by supervisor)
    Crashed,
    /// ERROR downgraded by an approved deviation
    NotApplicable,
}

impl Status {
    /// Escalation rank. Higher is worse; aggregation keeps the maximum.
    #[must_use]
    pub const fn severity(self) -> u8 {
        match self {
            Self::NotApplicable => 0,
            Self::Passed => 1,
            Self::Warning => 2,
            Self::Rejected => 3,
            Self::Error | Self::Crashed => 4,
        }
    }

    /// Return the worse of two statuses under the escalation ordering.
    ///
    /// Ties keep `self`, so merging is stable under re-runs.
    #[must_use]
    pub const fn escalate(self, other: Self) -> Self {
        if other.severity() > self.severity() {
            other
        } else {
            self
        }
    }

    /// True for the four statuses a validator is allowed to emit.
    ///
    /// `CRASHED` and `NOT_APPLICABLE` are synthesized inside the pipeline
    /// and are not part of the validator output contract.
    #[must_use]
    pub const fn is_contract_status(self) -> bool {
        matches!(
            self,
            Self::Passed | Self::Warning | Self::Rejected | Self::Error
        )
    }

    /// True if this status requires evidentiary events in a report.
    #[must_use]
    pub const fn requires_events(self) -> bool {
        matches!(self, Self::Warning | Self::Rejected | Self::Error)
    }

    /// Wire representation (`"PASSED"`, `"NOT_APPLICABLE"`, ...).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Passed => "PASSED",
            Self::Warning => "WARNING",
            Self::Rejected => "REJECTED",
            Self::Error => "ERROR",
            Self::Crashed => "CRASHED",
            Self::NotApplicable => "NOT_APPLICABLE",
        }
    }

    /// Parse a wire status string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PASSED" => Some(Self::Passed),
            "WARNING" => Some(Self::Warning),
            "REJECTED" => Some(Self::Rejected),
            "ERROR" => Some(Self::Error),
            "CRASHED" => Some(Self::Crashed),
            "NOT_APPLICABLE" => Some(Self::NotApplicable),
            _ => None,
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
