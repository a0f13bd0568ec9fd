//! Unit-of-work execution: one file or one segment, end to end.
//!
//! A unit owns its output directory exclusively; within it, validators
//! run in the battery's declared order (for log and report readability —
//! there is no cross-validator data dependency), each report passes
//! schema enforcement and policy resolution, and the unit finishes with
//! its own `Master_Report.json` on disk.

pub mod pool;

use crate::aggregate::MasterAggregator;
use crate::config::PipelineConfig;
use crate::policy::{Deviation, PolicyEngine};
use crate::report::{Event, MasterReport, ValidatorReport};
use crate::result::QcResult;
use crate::segment::Segment;
use crate::status::Status;
use crate::supervisor::Supervisor;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Per-unit master report filename.
pub const MASTER_REPORT_FILENAME: &str = "Master_Report.json";

/// Module key under which timeline holes are reported.
pub const TIMELINE_MODULE: &str = "segment_timeline";

/// Error code for a segment file that was never produced.
pub const SEGMENT_MISSING_CODE: &str = "SEGMENT_MISSING";

/// One independent unit of work: a whole file or one segment.
#[derive(Clone, Debug)]
pub enum WorkUnit {
    /// An unsegmented asset
    File {
        /// Input path
        input: PathBuf,
    },
    /// One time-slice of a segmented asset
    Segment(Segment),
}

impl WorkUnit {
    /// The media file this unit analyzes.
    #[must_use]
    pub fn input(&self) -> &Path {
        match self {
            Self::File { input } => input,
            Self::Segment(seg) => &seg.file,
        }
    }

    /// Offset of this unit's local timeline within the full asset.
    #[must_use]
    pub fn offset(&self) -> f64 {
        match self {
            Self::File { .. } => 0.0,
            Self::Segment(seg) => seg.start_sec,
        }
    }

    /// Human-readable unit label.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::File { input } => input
                .file_name()
                .map_or_else(|| input.to_string_lossy().into_owned(), |n| {
                    n.to_string_lossy().into_owned()
                }),
            Self::Segment(seg) => format!(
                "segment {} ({:.1}-{:.1}s)",
                seg.index, seg.start_sec, seg.end_sec
            ),
        }
    }

    /// Name of the output subdirectory this unit owns.
    #[must_use]
    pub fn outdir_name(&self) -> String {
        match self {
            Self::File { input } => input
                .file_stem()
                .map_or_else(|| "unit".to_string(), |s| s.to_string_lossy().into_owned()),
            Self::Segment(seg) => format!("seg_{:03}", seg.index),
        }
    }
}

/// Result of one dispatched unit, in dispatch order.
#[derive(Debug)]
pub struct UnitOutcome {
    /// Dispatch index
    pub index: usize,
    /// Unit label for reporting
    pub label: String,
    /// Timeline offset for top-level merging
    pub offset: f64,
    /// The unit's output directory
    pub outdir: PathBuf,
    /// Per-unit master report, or the fatal pipeline error that aborted
    /// this unit (validator crashes are NOT errors; they arrive as
    /// CRASHED modules inside an `Ok` master)
    pub result: QcResult<MasterReport>,
}

/// Run one unit's full validator battery and write its master report.
///
/// # Errors
///
/// `QcError::ContractViolation` if a validator broke the report
/// contract; `QcError::Io` on output directory or report write failure.
pub fn run_unit(
    unit: &WorkUnit,
    config: &PipelineConfig,
    deviations: &[Deviation],
    outdir: &Path,
) -> QcResult<MasterReport> {
    std::fs::create_dir_all(outdir)?;

    let policy = PolicyEngine::new(config, deviations.to_vec());
    let mut aggregator =
        MasterAggregator::new(config.profile).with_deviations(deviations.to_vec());

    if !unit.input().exists() {
        // A hole in the timeline, not a silent success.
        warn!(unit = %unit.label(), input = %unit.input().display(), "unit input missing");
        let mut hole = missing_input_report(unit);
        policy.resolve(&mut hole);
        aggregator.add_report(hole, 0.0);
    } else {
        let supervisor = Supervisor::new(&config.retry, config.profile, config.hwaccel.as_deref());
        for spec in &config.validators {
            let report_path = outdir.join(format!("{}.json", spec.module));
            let mut report = supervisor.run(spec, unit.input(), &report_path)?;
            policy.resolve(&mut report);
            aggregator.add_report(report, 0.0);
        }
    }

    let master = aggregator.finish();
    let master_path = outdir.join(MASTER_REPORT_FILENAME);
    std::fs::write(&master_path, serde_json::to_string_pretty(&master)?)?;
    info!(
        unit = %unit.label(),
        overall = %master.overall_status,
        path = %master_path.display(),
        "unit master report written"
    );
    Ok(master)
}

/// Synthesize the module report for a unit whose input file is absent
/// (a segment cut that failed, or a vanished source).
fn missing_input_report(unit: &WorkUnit) -> ValidatorReport {
    let local_end = match unit {
        WorkUnit::File { .. } => 0.0,
        WorkUnit::Segment(seg) => seg.duration_sec,
    };
    let mut report = ValidatorReport::new(
        TIMELINE_MODULE,
        unit.input().to_string_lossy(),
        Status::Error,
    );
    report.error_code = Some(SEGMENT_MISSING_CODE.to_string());
    report.events.push(Event {
        kind: "segment_missing".to_string(),
        start_time: 0.0,
        end_time: local_end,
        severity: Some("high".to_string()),
        details: format!("input file '{}' was never produced", unit.input().display()),
        source_module: TIMELINE_MODULE.to_string(),
    });
    report
}

/// Wrap a unit-level pipeline failure as a module report, so a final
/// master report can still be written and carry the diagnosis.
#[must_use]
pub fn failure_report(unit_label: &str, error: &crate::result::QcError) -> ValidatorReport {
    let mut report = ValidatorReport::new("pipeline", unit_label, Status::Error);
    report.error_code = Some("UNIT_EXECUTION_FAILED".to_string());
    report.events.push(Event {
        kind: "pipeline_failure".to_string(),
        start_time: 0.0,
        end_time: 0.0,
        severity: Some("high".to_string()),
        details: error.to_string(),
        source_module: "pipeline".to_string(),
    });
    report
}
