//! Bounded worker pool for embarrassingly-parallel QC units.
//!
//! Workers share nothing but a work queue and the filesystem, and each
//! unit owns its own output subdirectory, so the pool is a plain
//! scoped-thread fan-out. Collection is total: every dispatched unit
//! returns an outcome — success, a master full of CRASHED modules, or a
//! unit-level pipeline error — and a stuck validator cannot wedge the
//! pool beyond the supervisor's own per-attempt timeout.

use super::{run_unit, UnitOutcome, WorkUnit};
use crate::config::PipelineConfig;
use crate::policy::Deviation;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::mpsc;
use std::sync::Mutex;
use tracing::{debug, info};

/// Run every unit through the validator battery and collect all
/// outcomes, in dispatch order.
#[must_use]
pub fn run_all(
    units: Vec<WorkUnit>,
    config: &PipelineConfig,
    deviations: &[Deviation],
    base_outdir: &Path,
) -> Vec<UnitOutcome> {
    let unit_count = units.len();
    if unit_count == 0 {
        return Vec::new();
    }

    let workers = config.worker_count().min(unit_count);
    info!(units = unit_count, workers, "dispatching work units");

    let queue: Mutex<VecDeque<(usize, WorkUnit)>> =
        Mutex::new(units.into_iter().enumerate().collect());
    let (tx, rx) = mpsc::channel::<UnitOutcome>();

    std::thread::scope(|scope| {
        for worker_id in 0..workers {
            let queue = &queue;
            let tx = tx.clone();
            scope.spawn(move || loop {
                let Some((index, unit)) = next_unit(queue) else {
                    break;
                };
                debug!(worker_id, index, unit = %unit.label(), "unit picked up");
                let outdir = base_outdir.join(unit.outdir_name());
                let result = run_unit(&unit, config, deviations, &outdir);
                let outcome = UnitOutcome {
                    index,
                    label: unit.label(),
                    offset: unit.offset(),
                    outdir,
                    result,
                };
                // The receiver outlives the scope; a send can only fail
                // if collection was abandoned entirely.
                let _ = tx.send(outcome);
            });
        }
        drop(tx);
    });

    let mut outcomes: Vec<UnitOutcome> = rx.into_iter().collect();
    outcomes.sort_by_key(|o| o.index);
    debug_assert_eq!(outcomes.len(), unit_count);
    outcomes
}

fn next_unit(queue: &Mutex<VecDeque<(usize, WorkUnit)>>) -> Option<(usize, WorkUnit)> {
    queue.lock().ok()?.pop_front()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::{RetryPolicy, ValidatorSpec};
    use crate::runner::MASTER_REPORT_FILENAME;
    use crate::segment::Segment;
    use crate::status::Status;
    use std::time::Duration;
    use tempfile::TempDir;

    #[cfg(unix)]
    fn write_validator(dir: &TempDir, status: &str, event: &str) -> std::path::PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.path().join(format!("validator_{status}.sh"));
        std::fs::write(
            &path,
            format!(
                r#"#!/bin/sh
OUT=""
IN=""
while [ $# -gt 0 ]; do
  case "$1" in
    --output) OUT="$2"; shift ;;
    --input) IN="$2"; shift ;;
  esac
  shift
done
MODULE=$(basename "$OUT" .json)
printf '{{"module":"%s","video_file":"%s","status":"{status}","metrics":{{}},"events":[{event}]}}' "$MODULE" "$IN" > "$OUT"
"#
            ),
        )
        .unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn segment(index: usize, dir: &TempDir, exists: bool) -> Segment {
        let file = dir.path().join(format!("seg_{index:03}.mp4"));
        if exists {
            std::fs::write(&file, b"stub").unwrap();
        }
        let start = index as f64 * 300.0;
        Segment {
            index,
            file,
            start_sec: start,
            end_sec: start + 300.0,
            duration_sec: 300.0,
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_parallel_segments_collect_all_in_order() {
        let dir = TempDir::new().unwrap();
        let script = write_validator(&dir, "PASSED", "");
        let config = PipelineConfig::default()
            .with_validators(vec![ValidatorSpec::new("alpha_qc", script.to_string_lossy())])
            .with_retry(RetryPolicy {
                max_retries: 0,
                retry_delay: Duration::from_millis(1),
                timeout: Duration::from_secs(5),
            })
            .with_workers(3);

        let units: Vec<WorkUnit> = (0..4)
            .map(|i| WorkUnit::Segment(segment(i, &dir, true)))
            .collect();
        let outdir = dir.path().join("out");
        let outcomes = run_all(units, &config, &[], &outdir);

        assert_eq!(outcomes.len(), 4);
        for (i, outcome) in outcomes.iter().enumerate() {
            assert_eq!(outcome.index, i);
            assert!((outcome.offset - i as f64 * 300.0).abs() < 1e-9);
            let master = outcome.result.as_ref().unwrap();
            assert_eq!(master.overall_status, Status::Passed);
            assert!(outcome.outdir.join(MASTER_REPORT_FILENAME).exists());
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_missing_segment_does_not_block_others() {
        let dir = TempDir::new().unwrap();
        let script = write_validator(&dir, "PASSED", "");
        let config = PipelineConfig::default()
            .with_validators(vec![ValidatorSpec::new("alpha_qc", script.to_string_lossy())])
            .with_retry(RetryPolicy {
                max_retries: 0,
                retry_delay: Duration::from_millis(1),
                timeout: Duration::from_secs(5),
            })
            .with_workers(2);

        let units = vec![
            WorkUnit::Segment(segment(0, &dir, true)),
            WorkUnit::Segment(segment(1, &dir, false)), // hole
            WorkUnit::Segment(segment(2, &dir, true)),
        ];
        let outdir = dir.path().join("out");
        let outcomes = run_all(units, &config, &[], &outdir);

        assert_eq!(outcomes.len(), 3);
        assert_eq!(
            outcomes[0].result.as_ref().unwrap().overall_status,
            Status::Passed
        );
        assert_eq!(
            outcomes[1].result.as_ref().unwrap().overall_status,
            Status::Error
        );
        assert_eq!(
            outcomes[2].result.as_ref().unwrap().overall_status,
            Status::Passed
        );
    }

    #[test]
    fn test_empty_units() {
        let dir = TempDir::new().unwrap();
        let config = PipelineConfig::default();
        let outcomes = run_all(vec![], &config, &[], dir.path());
        assert!(outcomes.is_empty());
    }
}
