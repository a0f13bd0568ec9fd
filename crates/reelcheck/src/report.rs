//! Report structures: the wire artifacts of the pipeline.
//!
//! A validator process leaves a [`ValidatorReport`] on disk; the
//! aggregator reduces a batch of them (or a batch of per-segment
//! [`MasterReport`]s) into one master report. Everything here serializes
//! to the stable JSON contract consumed by CI and dashboards.

use crate::status::Status;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Tool name stamped into master report metadata.
pub const TOOL_NAME: &str = "reelcheck";

/// A timestamped finding. Events are the evidentiary unit: a module
/// claiming anything worse than PASSED must carry at least one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event kind (e.g. "black_frame", "loudness_violation")
    #[serde(rename = "type")]
    pub kind: String,
    /// Start of the affected range, seconds from asset start
    pub start_time: f64,
    /// End of the affected range, seconds; `>= start_time`
    pub end_time: f64,
    /// Optional severity label ("low", "high", ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    /// Human-readable description
    #[serde(default)]
    pub details: String,
    /// Module that produced the event; filled in by the aggregator
    /// when the validator left it empty
    #[serde(default)]
    pub source_module: String,
}

impl Event {
    /// Shift both time bounds by `offset` seconds, rounding to
    /// milliseconds the way the wire format does.
    pub fn shift(&mut self, offset: f64) {
        self.start_time = round_ms(self.start_time + offset);
        self.end_time = round_ms(self.end_time + offset);
    }
}

/// Round a timestamp to millisecond precision.
#[must_use]
pub fn round_ms(t: f64) -> f64 {
    (t * 1000.0).round() / 1000.0
}

/// Output of one validator run. Identity is the `module` key: at most one
/// live report per module per run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ValidatorReport {
    /// Unique module key (e.g. "audio_qc")
    pub module: String,
    /// Asset the validator analyzed
    pub video_file: String,
    /// Raw status as emitted by the validator
    pub status: Status,
    /// Status after policy resolution; absent until the policy engine runs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_status: Option<Status>,
    /// Machine-matchable error code (deviation condition key)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    /// Scalar (or list-valued) measurements
    #[serde(default)]
    pub metrics: BTreeMap<String, Value>,
    /// Timestamped findings; non-empty whenever status demands evidence
    #[serde(default)]
    pub events: Vec<Event>,
    /// Annotations added during schema repair and policy resolution
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub policy_notes: Vec<String>,
    /// Free-form diagnostics; used by synthesized crash reports
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, Value>,
}

impl ValidatorReport {
    /// Create a minimal report with the given module and status.
    #[must_use]
    pub fn new(module: impl Into<String>, video_file: impl Into<String>, status: Status) -> Self {
        Self {
            module: module.into(),
            video_file: video_file.into(),
            status,
            effective_status: None,
            error_code: None,
            metrics: BTreeMap::new(),
            events: Vec::new(),
            policy_notes: Vec::new(),
            details: BTreeMap::new(),
        }
    }

    /// The status that counts for aggregation and CI: `effective_status`
    /// once policy has run, the raw status otherwise.
    #[must_use]
    pub fn effective(&self) -> Status {
        self.effective_status.unwrap_or(self.status)
    }
}

/// Provenance block of a master report.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// RFC 3339 UTC timestamp of report generation
    pub generated_on: String,
    /// Active compliance profile
    pub profile: String,
    /// Generating tool
    pub tool: String,
    /// SHA-256 of the canonical modules map; same inputs, same hash
    pub report_hash: String,
}

/// The single authoritative result of a run (or of one segment).
///
/// Built once, immutable once written.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MasterReport {
    /// Provenance
    pub metadata: ReportMetadata,
    /// Worst effective status across all modules
    pub overall_status: Status,
    /// CI exit code derived from `overall_status` (0, 2 or 3)
    pub ci_exit_code: i32,
    /// Per-module reports, keyed by module
    pub modules: BTreeMap<String, ValidatorReport>,
    /// All events across modules, offset-corrected, stitched, sorted
    #[serde(default)]
    pub aggregated_events: Vec<Event>,
    /// Deviations that were in force for this run
    #[serde(default)]
    pub known_deviations: Vec<crate::policy::Deviation>,
}

/// Content hash over the modules map.
///
/// `BTreeMap` keys and `metrics` keys serialize in sorted order, so two
/// runs over identical inputs with identical config hash identically.
#[must_use]
pub fn report_hash(modules: &BTreeMap<String, ValidatorReport>) -> String {
    let canonical = serde_json::to_vec(modules).unwrap_or_default();
    let digest = Sha256::digest(&canonical);
    format!("{digest:x}")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_uses_type_key() {
        let event = Event {
            kind: "black_frame".to_string(),
            start_time: 2.0,
            end_time: 5.0,
            severity: Some("high".to_string()),
            details: "full-frame black".to_string(),
            source_module: "black_freeze_qc".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "black_frame");
        assert!(json.get("kind").is_none());
    }

    #[test]
    fn test_event_shift_rounds_to_ms() {
        let mut event = Event {
            kind: "freeze".to_string(),
            start_time: 1.0001,
            end_time: 2.0004,
            severity: None,
            details: String::new(),
            source_module: String::new(),
        };
        event.shift(300.0);
        assert!((event.start_time - 301.0).abs() < 1e-9);
        assert!((event.end_time - 302.0).abs() < 1e-9);
    }

    #[test]
    fn test_effective_falls_back_to_raw() {
        let mut report = ValidatorReport::new("signal_qc", "in.mp4", Status::Error);
        assert_eq!(report.effective(), Status::Error);
        report.effective_status = Some(Status::NotApplicable);
        assert_eq!(report.effective(), Status::NotApplicable);
    }

    #[test]
    fn test_report_hash_deterministic() {
        let mut a = BTreeMap::new();
        a.insert(
            "audio_qc".to_string(),
            ValidatorReport::new("audio_qc", "in.mp4", Status::Passed),
        );
        let mut b = BTreeMap::new();
        b.insert(
            "audio_qc".to_string(),
            ValidatorReport::new("audio_qc", "in.mp4", Status::Passed),
        );
        assert_eq!(report_hash(&a), report_hash(&b));

        b.get_mut("audio_qc").unwrap().status = Status::Warning;
        assert_ne!(report_hash(&a), report_hash(&b));
    }

    #[test]
    fn test_validator_report_tolerates_minimal_json() {
        let report: ValidatorReport = serde_json::from_str(
            r#"{"module":"gop_qc","video_file":"in.mp4","status":"PASSED"}"#,
        )
        .unwrap();
        assert!(report.metrics.is_empty());
        assert!(report.events.is_empty());
        assert!(report.effective_status.is_none());
    }
}
