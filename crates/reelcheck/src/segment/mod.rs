//! Temporal segmentation: splitting a long asset into time-bounded,
//! stream-copied slices.
//!
//! The partition of `[0, total_duration)` is contiguous and
//! non-overlapping; the final segment may be shorter than the nominal
//! length. Cuts are stream copies (no re-encode), so a two-hour asset
//! splits in seconds. The emitted manifest is the single source of truth
//! for segment start offsets, which the aggregator later uses to
//! reconstruct the global timeline.
//!
//! A failed cut is logged and leaves its planned segment in the manifest
//! with no file on disk; the runner surfaces that hole explicitly rather
//! than silently dropping a slice of the timeline.

pub mod probe;

pub use probe::media_duration;

use crate::report::round_ms;
use crate::result::{QcError, QcResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{error, info};

/// Manifest filename written next to the segment files.
pub const MANIFEST_FILENAME: &str = "segments.json";

/// One contiguous time-slice of the source asset.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Segment {
    /// Zero-based segment index
    pub index: usize,
    /// Segment file path (may not exist if the cut failed)
    pub file: PathBuf,
    /// Start offset in the source asset, seconds
    pub start_sec: f64,
    /// End offset in the source asset, seconds
    pub end_sec: f64,
    /// Segment length, seconds
    pub duration_sec: f64,
}

/// Segmentation manifest: source of truth for offsets.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SegmentManifest {
    /// Source asset
    pub source: PathBuf,
    /// Nominal segment length, seconds
    pub segment_sec: f64,
    /// Probed total duration, seconds
    pub total_duration: f64,
    /// Planned segments in index order
    pub segments: Vec<Segment>,
}

impl SegmentManifest {
    /// Write the manifest as JSON into `outdir`.
    pub fn save(&self, outdir: &Path) -> QcResult<PathBuf> {
        let path = outdir.join(MANIFEST_FILENAME);
        std::fs::write(&path, serde_json::to_string_pretty(self)?)?;
        Ok(path)
    }

    /// Load a manifest back from `outdir`.
    pub fn load(outdir: &Path) -> QcResult<Self> {
        let path = outdir.join(MANIFEST_FILENAME);
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// Partition `[0, duration)` into contiguous `(start, end)` intervals of
/// nominal length `segment_sec`; the last interval may be shorter.
#[must_use]
pub fn plan(duration: f64, segment_sec: f64) -> Vec<(f64, f64)> {
    let mut intervals = Vec::new();
    if duration <= 0.0 || segment_sec <= 0.0 {
        return intervals;
    }
    let mut start = 0.0;
    while start < duration {
        let end = (start + segment_sec).min(duration);
        intervals.push((round_ms(start), round_ms(end)));
        start = end;
    }
    intervals
}

/// Split `input` into stream-copied segments under `outdir`.
///
/// Probes the duration once, plans the partition, cuts each interval,
/// and writes `segments.json`. A failed cut is reported but does not
/// abort the remaining segments.
///
/// # Errors
///
/// `QcError::Probe` if the duration cannot be determined;
/// `QcError::Segmentation` if every cut fails; `QcError::Io` on manifest
/// write failure.
pub fn segment_video(input: &Path, outdir: &Path, segment_sec: f64) -> QcResult<SegmentManifest> {
    if segment_sec <= 0.0 {
        return Err(QcError::config(format!(
            "segment length must be positive, got {segment_sec}"
        )));
    }

    std::fs::create_dir_all(outdir)?;
    let duration = media_duration(input)?;
    let intervals = plan(duration, segment_sec);

    info!(
        source = %input.display(),
        total_duration = duration,
        segments = intervals.len(),
        "segmenting"
    );

    let mut segments = Vec::with_capacity(intervals.len());
    let mut cut_failures = 0usize;

    for (index, (start, end)) in intervals.into_iter().enumerate() {
        let file = outdir.join(format!("seg_{index:03}.mp4"));

        if let Err(message) = cut_segment(input, &file, start, end - start) {
            error!(index, start_sec = start, %message, "segment cut failed; hole in timeline");
            cut_failures += 1;
        }

        segments.push(Segment {
            index,
            file,
            start_sec: start,
            end_sec: end,
            duration_sec: round_ms(end - start),
        });
    }

    if cut_failures == segments.len() {
        return Err(QcError::Segmentation {
            path: input.to_string_lossy().into_owned(),
            message: format!("all {cut_failures} segment cuts failed"),
        });
    }

    let manifest = SegmentManifest {
        source: input.to_path_buf(),
        segment_sec,
        total_duration: round_ms(duration),
        segments,
    };
    manifest.save(outdir)?;
    Ok(manifest)
}

/// Stream-copy cut of `[start, start+len)` into `file`.
fn cut_segment(input: &Path, file: &Path, start: f64, len: f64) -> Result<(), String> {
    let output = Command::new("ffmpeg")
        .args([
            "-y",
            "-ss",
            &start.to_string(),
            "-i",
            &input.to_string_lossy(),
            "-t",
            &len.to_string(),
            "-c",
            "copy",
            "-map",
            "0",
            "-avoid_negative_ts",
            "make_zero",
            &file.to_string_lossy(),
        ])
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| format!("failed to execute ffmpeg: {e}"))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!("ffmpeg exited with {}: {stderr}", output.status));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_even_split() {
        let intervals = plan(600.0, 300.0);
        assert_eq!(intervals, vec![(0.0, 300.0), (300.0, 600.0)]);
    }

    #[test]
    fn test_plan_short_tail() {
        let intervals = plan(650.0, 300.0);
        assert_eq!(intervals.len(), 3);
        assert_eq!(intervals[2], (600.0, 650.0));
        let tail_len = intervals[2].1 - intervals[2].0;
        assert!((tail_len - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_plan_contiguous_non_overlapping() {
        let intervals = plan(7215.48, 300.0);
        assert_eq!(intervals.len(), 25);
        assert!((intervals[0].0).abs() < 1e-9);
        for pair in intervals.windows(2) {
            assert!((pair[0].1 - pair[1].0).abs() < 1e-9, "gap or overlap");
        }
        assert!((intervals.last().unwrap().1 - 7215.48).abs() < 1e-3);
    }

    #[test]
    fn test_plan_degenerate_inputs() {
        assert!(plan(0.0, 300.0).is_empty());
        assert!(plan(600.0, 0.0).is_empty());
    }

    #[test]
    fn test_manifest_roundtrip() {
        let dir = tempfile::TempDir::new().unwrap();
        let manifest = SegmentManifest {
            source: PathBuf::from("/media/in.mp4"),
            segment_sec: 300.0,
            total_duration: 650.0,
            segments: plan(650.0, 300.0)
                .into_iter()
                .enumerate()
                .map(|(index, (start, end))| Segment {
                    index,
                    file: dir.path().join(format!("seg_{index:03}.mp4")),
                    start_sec: start,
                    end_sec: end,
                    duration_sec: end - start,
                })
                .collect(),
        };
        manifest.save(dir.path()).unwrap();

        let loaded = SegmentManifest::load(dir.path()).unwrap();
        assert_eq!(loaded.segments.len(), 3);
        assert!((loaded.segments[1].start_sec - 300.0).abs() < 1e-9);
        assert_eq!(loaded.source, PathBuf::from("/media/in.mp4"));
    }

    #[test]
    fn test_segment_video_rejects_bad_length() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = segment_video(Path::new("in.mp4"), dir.path(), 0.0).unwrap_err();
        assert!(matches!(err, QcError::Config { .. }));
    }
}
