//! Media duration probing via ffprobe.
//!
//! Shells out to ffprobe with JSON output and extracts the container
//! duration. This is the single probe the segmenter needs; everything
//! else about the asset is the validators' business.

use crate::result::{QcError, QcResult};
use std::path::Path;
use std::process::{Command, Stdio};

/// Build ffprobe command arguments for a duration query.
#[must_use]
pub fn build_ffprobe_args(input: &Path) -> Vec<String> {
    vec![
        "-v".to_string(),
        "error".to_string(),
        "-show_entries".to_string(),
        "format=duration".to_string(),
        "-of".to_string(),
        "json".to_string(),
        input.to_string_lossy().into_owned(),
    ]
}

/// Probe the total duration of a media file, in seconds.
///
/// # Errors
///
/// Returns `QcError::Probe` if ffprobe is not found, fails, or reports
/// no usable duration.
pub fn media_duration(input: &Path) -> QcResult<f64> {
    let args = build_ffprobe_args(input);

    let output = Command::new("ffprobe")
        .args(&args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| QcError::probe(input.to_string_lossy(), format!("failed to execute ffprobe: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(QcError::probe(
            input.to_string_lossy(),
            format!("ffprobe exited with {}: {stderr}", output.status),
        ));
    }

    let json = String::from_utf8_lossy(&output.stdout);
    parse_duration_json(&json).map_err(|message| QcError::probe(input.to_string_lossy(), message))
}

/// Parse ffprobe `-show_entries format=duration -of json` output.
pub fn parse_duration_json(json: &str) -> Result<f64, String> {
    let parsed: serde_json::Value =
        serde_json::from_str(json).map_err(|e| format!("failed to parse ffprobe JSON: {e}"))?;

    let duration = parsed
        .get("format")
        .and_then(|f| f.get("duration"))
        .and_then(|d| d.as_str())
        .ok_or_else(|| "ffprobe output missing format.duration".to_string())?;

    let secs: f64 = duration
        .parse()
        .map_err(|e| format!("unparseable duration '{duration}': {e}"))?;

    if secs <= 0.0 {
        return Err(format!("non-positive duration {secs}"));
    }
    Ok(secs)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_build_args() {
        let args = build_ffprobe_args(Path::new("/media/asset.mxf"));
        assert_eq!(args[0], "-v");
        assert!(args.contains(&"format=duration".to_string()));
        assert_eq!(args.last().unwrap(), "/media/asset.mxf");
    }

    #[test]
    fn test_parse_duration() {
        let json = r#"{"format": {"duration": "7215.480000"}}"#;
        let secs = parse_duration_json(json).unwrap();
        assert!((secs - 7215.48).abs() < 1e-6);
    }

    #[test]
    fn test_parse_missing_duration() {
        assert!(parse_duration_json(r#"{"format": {}}"#).is_err());
        assert!(parse_duration_json("not json").is_err());
    }

    #[test]
    fn test_parse_zero_duration_rejected() {
        let json = r#"{"format": {"duration": "0.000000"}}"#;
        assert!(parse_duration_json(json).is_err());
    }
}
