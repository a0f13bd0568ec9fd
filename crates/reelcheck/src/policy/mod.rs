//! Policy engine: status resolution and CI verdict computation.
//!
//! The state machine is status-based, per module:
//!
//! - `PASSED` / `WARNING` pass through untouched.
//! - `REJECTED` is terminal. No deviation, in any profile, softens it.
//! - `ERROR` is fatal under `strict`. Under a relaxed profile it becomes
//!   `NOT_APPLICABLE` iff the module is tooling-only, the error code is
//!   deviation-eligible, and a matching non-expired deviation is in force.
//! - `CRASHED` is an execution failure and is never deviation-eligible.
//!
//! Exactly one deviation is applied per module; a policy note records
//! which one fired.

mod deviation;

pub use deviation::{load_deviations, Deviation};

use crate::config::{PipelineConfig, Profile};
use crate::report::ValidatorReport;
use crate::status::Status;
use chrono::{NaiveDate, Utc};
use tracing::info;

/// Resolves raw module statuses into effective statuses.
#[derive(Debug)]
pub struct PolicyEngine<'a> {
    config: &'a PipelineConfig,
    deviations: Vec<Deviation>,
    today: NaiveDate,
}

impl<'a> PolicyEngine<'a> {
    /// Create an engine over a set of already-loaded deviations.
    #[must_use]
    pub fn new(config: &'a PipelineConfig, deviations: Vec<Deviation>) -> Self {
        Self {
            config,
            deviations,
            today: Utc::now().date_naive(),
        }
    }

    /// Pin "today" for expiry checks (tests, reproducible replays).
    #[must_use]
    pub const fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    /// Deviations currently in force.
    #[must_use]
    pub fn deviations(&self) -> &[Deviation] {
        &self.deviations
    }

    /// Resolve one module report in place: sets `effective_status` and
    /// appends a policy note when a deviation fires.
    pub fn resolve(&self, report: &mut ValidatorReport) {
        let effective = match report.status {
            // Never touched by policy
            Status::Passed | Status::Warning | Status::Rejected => report.status,
            // Execution failure; not a content verdict, not waivable
            Status::Crashed => Status::Crashed,
            Status::NotApplicable => Status::NotApplicable,
            Status::Error => self.resolve_error(report),
        };
        report.effective_status = Some(effective);
    }

    fn resolve_error(&self, report: &mut ValidatorReport) -> Status {
        if self.config.profile.is_strict() {
            return Status::Error;
        }

        if !self.config.tooling_modules.contains(&report.module) {
            return Status::Error;
        }
        let Some(error_code) = report.error_code.clone() else {
            return Status::Error;
        };
        if !self.config.deviation_eligible_errors.contains(&error_code) {
            return Status::Error;
        }

        // First matching deviation wins; at most one relaxation.
        if let Some(dev) = self
            .deviations
            .iter()
            .find(|d| d.matches(&report.module, &error_code, self.today))
        {
            info!(
                module = %report.module,
                deviation = %dev.id,
                "deviation applied; ERROR downgraded to NOT_APPLICABLE"
            );
            report
                .policy_notes
                .push(format!("Deviation applied: {} ({})", dev.id, dev.condition));
            return Status::NotApplicable;
        }

        Status::Error
    }
}

/// Reduce effective module statuses to the overall CI verdict.
///
/// `ERROR` (and `CRASHED`) short-circuits: any execution failure makes
/// the whole run an execution failure, without waiting to compare
/// against `REJECTED`. Otherwise `REJECTED` beats `WARNING` beats
/// `PASSED`. Exit codes: 0 for PASSED/WARNING, 2 for REJECTED, 3 for
/// ERROR.
#[must_use]
pub fn compute_ci<I>(statuses: I) -> (Status, i32)
where
    I: IntoIterator<Item = Status>,
{
    let mut worst = Status::Passed;

    for status in statuses {
        match status {
            Status::Error | Status::Crashed => return (Status::Error, 3),
            Status::Rejected => worst = Status::Rejected,
            Status::Warning => {
                if worst == Status::Passed {
                    worst = Status::Warning;
                }
            }
            Status::Passed | Status::NotApplicable => {}
        }
    }

    let code = match worst {
        Status::Rejected => 2,
        _ => 0,
    };
    (worst, code)
}
