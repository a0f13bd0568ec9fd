//! Master report aggregation.
//!
//! Reduces a batch of validator reports — or a batch of per-segment
//! master reports — into one master report:
//!
//! ```text
//! ValidatorReport ──→ add_report(offset) ──┐
//! MasterReport    ──→ add_master(offset) ──┤──→ finish() ──→ MasterReport
//!                                          │
//!                 escalation, metric reduction, offset-corrected
//!                 event collection, stitching, hash
//! ```
//!
//! Aggregation is commutative and associative over the module map
//! (subject to the escalation rule), so re-running against a partially
//! overwritten output directory merges evidence instead of discarding it.

pub mod stitch;

pub use stitch::{stitch_events, DEFAULT_TOLERANCE_SEC};

use crate::config::Profile;
use crate::policy::{self, Deviation};
use crate::report::{report_hash, round_ms, Event, MasterReport, ReportMetadata, ValidatorReport, TOOL_NAME};
use crate::status::Status;
use chrono::Utc;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// Metric keys that carry absolute positions on the time axis and must
/// be shifted when a segment-local report joins the global timeline.
const TIME_METRIC_KEYS: [&str; 5] = [
    "timestamp",
    "start_sec",
    "end_sec",
    "start_time",
    "end_time",
];

/// Accumulates module reports into a master report.
#[derive(Debug)]
pub struct MasterAggregator {
    profile: Profile,
    tolerance: f64,
    modules: BTreeMap<String, ValidatorReport>,
    events: Vec<Event>,
    deviations: Vec<Deviation>,
}

impl MasterAggregator {
    /// Create an empty aggregator for the given profile.
    #[must_use]
    pub fn new(profile: Profile) -> Self {
        Self {
            profile,
            tolerance: DEFAULT_TOLERANCE_SEC,
            modules: BTreeMap::new(),
            events: Vec::new(),
            deviations: Vec::new(),
        }
    }

    /// Override the stitching tolerance.
    #[must_use]
    pub const fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Record the deviations that were in force for this run.
    #[must_use]
    pub fn with_deviations(mut self, deviations: Vec<Deviation>) -> Self {
        self.deviations = deviations;
        self
    }

    /// Add one validator report whose timeline starts `offset` seconds
    /// into the full asset.
    pub fn add_report(&mut self, mut report: ValidatorReport, offset: f64) {
        if offset != 0.0 {
            for event in &mut report.events {
                event.shift(offset);
            }
            shift_time_metrics(&mut report.metrics, offset);
        }
        for event in &mut report.events {
            if event.source_module.is_empty() {
                event.source_module.clone_from(&report.module);
            }
        }

        self.events.extend(report.events.iter().cloned());

        match self.modules.get_mut(&report.module) {
            None => {
                self.modules.insert(report.module.clone(), report);
            }
            Some(existing) => {
                debug!(module = %report.module, "module collision; merging with escalation");
                existing.status = existing.status.escalate(report.status);
                existing.effective_status = Some(existing.effective().escalate(report.effective()));
                if existing.error_code.is_none() {
                    existing.error_code = report.error_code;
                }
                existing.events.extend(report.events);
                for note in report.policy_notes {
                    if !existing.policy_notes.contains(&note) {
                        existing.policy_notes.push(note);
                    }
                }
                for (key, incoming) in report.metrics {
                    match existing.metrics.get_mut(&key) {
                        None => {
                            existing.metrics.insert(key, incoming);
                        }
                        Some(current) => merge_metric(&key, current, incoming),
                    }
                }
            }
        }
    }

    /// Fold a per-segment master report into this aggregate, correcting
    /// every event and time metric by the segment's start offset.
    pub fn add_master(&mut self, master: &MasterReport, offset: f64) {
        for report in master.modules.values() {
            self.add_report(report.clone(), offset);
        }
        for dev in &master.known_deviations {
            if !self.deviations.iter().any(|d| d.id == dev.id) {
                self.deviations.push(dev.clone());
            }
        }
    }

    /// Number of modules registered so far.
    #[must_use]
    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    /// Build the immutable master report.
    #[must_use]
    pub fn finish(self) -> MasterReport {
        let overall_status = self
            .modules
            .values()
            .map(ValidatorReport::effective)
            .fold(Status::Passed, Status::escalate);
        let (_, ci_exit_code) =
            policy::compute_ci(self.modules.values().map(ValidatorReport::effective));

        let aggregated_events = stitch_events(self.events, self.tolerance);
        let hash = report_hash(&self.modules);

        MasterReport {
            metadata: ReportMetadata {
                generated_on: Utc::now().to_rfc3339(),
                profile: self.profile.as_str().to_string(),
                tool: TOOL_NAME.to_string(),
                report_hash: hash,
            },
            overall_status,
            ci_exit_code,
            modules: self.modules,
            aggregated_events,
            known_deviations: self.deviations,
        }
    }
}

/// Shift time-axis metrics by `offset` seconds: scalar fields named
/// after the time axis, and the same fields inside list-of-object
/// metrics such as clipped or dropped ranges.
fn shift_time_metrics(metrics: &mut BTreeMap<String, Value>, offset: f64) {
    for key in TIME_METRIC_KEYS {
        if let Some(value) = metrics.get_mut(key) {
            shift_number(value, offset);
        }
    }
    for value in metrics.values_mut() {
        let Value::Array(items) = value else { continue };
        for item in items {
            let Value::Object(fields) = item else { continue };
            for key in TIME_METRIC_KEYS {
                if let Some(field) = fields.get_mut(key) {
                    shift_number(field, offset);
                }
            }
        }
    }
}

fn shift_number(value: &mut Value, offset: f64) {
    if let Some(t) = value.as_f64() {
        if let Some(shifted) = serde_json::Number::from_f64(round_ms(t + offset)) {
            *value = Value::Number(shifted);
        }
    }
}

/// Field-specific reduction for metrics colliding across merges.
///
/// Lists concatenate; `min_*` keeps the minimum; `mean_*` averages
/// even when the key also mentions an error; `max_*` and anything else
/// named like an offset or error magnitude keeps the maximum;
/// unrecognized scalars keep the first value seen.
fn merge_metric(key: &str, current: &mut Value, incoming: Value) {
    if let (Value::Array(cur), Value::Array(inc)) = (&mut *current, &incoming) {
        cur.extend(inc.iter().cloned());
        return;
    }

    let (Some(a), Some(b)) = (current.as_f64(), incoming.as_f64()) else {
        return; // first value wins for non-numeric collisions
    };

    let lower = key.to_ascii_lowercase();
    let merged = if lower.starts_with("min_") {
        a.min(b)
    } else if lower.starts_with("mean_") {
        (a + b) / 2.0
    } else if lower.starts_with("max_") || lower.contains("offset") || lower.contains("error") {
        a.max(b)
    } else {
        return; // first value wins
    };

    if let Some(n) = serde_json::Number::from_f64(merged) {
        *current = Value::Number(n);
    }
}

/// Aggregate a batch of validator reports into one master report.
#[must_use]
pub fn aggregate_reports(
    reports: Vec<ValidatorReport>,
    profile: Profile,
    deviations: Vec<Deviation>,
) -> MasterReport {
    let mut agg = MasterAggregator::new(profile).with_deviations(deviations);
    for report in reports {
        agg.add_report(report, 0.0);
    }
    agg.finish()
}

/// Merge per-segment master reports, shifting each by its start offset.
#[must_use]
pub fn aggregate_segments<'a, I>(segment_masters: I, profile: Profile) -> MasterReport
where
    I: IntoIterator<Item = (f64, &'a MasterReport)>,
{
    let mut agg = MasterAggregator::new(profile);
    for (offset, master) in segment_masters {
        agg.add_master(master, offset);
    }
    agg.finish()
}
