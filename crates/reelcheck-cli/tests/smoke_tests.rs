//! Smoke tests for the reelcheck CLI
//!
//! Exercise the binary end to end against stub validator scripts: flag
//! parsing, report layout on disk, and the exit-code contract (0
//! passed/warning, 2 rejected, 3 error or pipeline failure).

#![allow(deprecated)] // Allow deprecated Command::cargo_bin until assert_cmd is updated
#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Get a command for the reelcheck binary
fn reelcheck() -> Command {
    Command::cargo_bin("reelcheck").expect("reelcheck binary should exist")
}

// ============================================================================
// Basic CLI Tests
// ============================================================================

#[test]
fn test_version_flag() {
    reelcheck()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("0.3.1"));
}

#[test]
fn test_help_flag() {
    reelcheck()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--input"))
        .stdout(predicate::str::contains("--mode"))
        .stdout(predicate::str::contains("--segments"))
        .stdout(predicate::str::contains("--fix"));
}

#[test]
fn test_no_args_fails() {
    // --input is required
    reelcheck().assert().failure();
}

#[test]
fn test_missing_input_file_exits_3() {
    let dir = TempDir::new().unwrap();
    reelcheck()
        .args(["--input", "/nonexistent/asset.mp4"])
        .args(["--outdir", &dir.path().to_string_lossy()])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_unknown_profile_rejected() {
    reelcheck()
        .args(["--input", "a.mp4", "--mode", "cinema"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown profile"));
}

#[test]
fn test_quiet_conflicts_with_verbose() {
    reelcheck()
        .args(["--input", "a.mp4", "-q", "-v"])
        .assert()
        .failure();
}

// ============================================================================
// End-to-end against stub validators (unix: shell-script validators)
// ============================================================================

#[cfg(unix)]
fn write_stub_validator(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join(name);
    let script = format!(
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
BODY='{body}'
BODY=$(printf '%s' "$BODY" | sed "s|%MODULE%|$MODULE|g; s|%INPUT%|$IN|g")
printf '%s' "$BODY" > "$OUT"
"#
    );
    fs::write(&path, script).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// The default battery invokes qc-validate-* binaries that do not exist
/// in the test environment, so every module comes back CRASHED and the
/// run is an execution failure: exit 3, but the master report exists.
#[test]
#[cfg(unix)]
fn test_unavailable_battery_exits_3_with_master_report() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("clip.mp4");
    fs::write(&input, b"stub media").unwrap();
    let outdir = dir.path().join("reports");

    reelcheck()
        .args(["--input", &input.to_string_lossy()])
        .args(["--outdir", &outdir.to_string_lossy()])
        .arg("--no-color")
        .assert()
        .code(3)
        .stdout(predicate::str::contains("Overall: CRASHED"));

    let final_master = outdir.join("clip_qc_report").join("Final_Master_Report.json");
    let raw = fs::read_to_string(final_master).unwrap();
    let master: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(master["overall_status"], "CRASHED");
    assert_eq!(master["ci_exit_code"], 3);
    // All 12 default battery modules are present, each CRASHED.
    assert_eq!(master["modules"].as_object().unwrap().len(), 12);
}

#[test]
#[cfg(unix)]
fn test_rejection_exits_2() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("clip.mp4");
    fs::write(&input, b"stub media").unwrap();

    let stub = write_stub_validator(
        dir.path(),
        "reject.sh",
        r#"{"module":"%MODULE%","video_file":"%INPUT%","status":"REJECTED","metrics":{},"events":[{"type":"loudness","start_time":0.0,"end_time":1.0,"severity":"high","details":"-18 LKFS"}]}"#,
    );
    // Narrow the battery to the stub by shadowing PATH lookups: every
    // default validator resolves to the same rejecting stub.
    let battery_dir = dir.path().join("bin");
    fs::create_dir(&battery_dir).unwrap();
    for name in [
        "qc-validate-structure",
        "qc-validate-loudness",
        "qc-validate-audio-signal",
        "qc-validate-signal",
        "qc-validate-qctools",
        "qc-validate-artifacts",
        "qc-validate-black-freeze",
        "qc-validate-frames",
        "qc-validate-gop",
        "qc-validate-interlace",
        "qc-validate-timestamps",
        "qc-validate-avsync",
    ] {
        std::os::unix::fs::symlink(&stub, battery_dir.join(name)).unwrap();
    }

    let outdir = dir.path().join("reports");
    let path_env = format!(
        "{}:{}",
        battery_dir.display(),
        std::env::var("PATH").unwrap_or_default()
    );
    reelcheck()
        .env("PATH", path_env)
        .args(["--input", &input.to_string_lossy()])
        .args(["--outdir", &outdir.to_string_lossy()])
        .arg("--no-color")
        .assert()
        .code(2)
        .stdout(predicate::str::contains("Overall: REJECTED"))
        .stdout(predicate::str::contains("exit code 2"));

    // One report per module plus the unit and final masters.
    let unit_dir = outdir.join("clip_qc_report").join("clip");
    assert!(unit_dir.join("audio_qc.json").exists());
    assert!(unit_dir.join("Master_Report.json").exists());
}

#[test]
#[cfg(unix)]
fn test_passing_run_exits_0_and_prints_table() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("clip.mp4");
    fs::write(&input, b"stub media").unwrap();

    let stub = write_stub_validator(
        dir.path(),
        "pass.sh",
        r#"{"module":"%MODULE%","video_file":"%INPUT%","status":"PASSED","metrics":{},"events":[]}"#,
    );
    let battery_dir = dir.path().join("bin");
    fs::create_dir(&battery_dir).unwrap();
    for name in [
        "qc-validate-structure",
        "qc-validate-loudness",
        "qc-validate-audio-signal",
        "qc-validate-signal",
        "qc-validate-qctools",
        "qc-validate-artifacts",
        "qc-validate-black-freeze",
        "qc-validate-frames",
        "qc-validate-gop",
        "qc-validate-interlace",
        "qc-validate-timestamps",
        "qc-validate-avsync",
    ] {
        std::os::unix::fs::symlink(&stub, battery_dir.join(name)).unwrap();
    }

    let outdir = dir.path().join("reports");
    let path_env = format!(
        "{}:{}",
        battery_dir.display(),
        std::env::var("PATH").unwrap_or_default()
    );
    reelcheck()
        .env("PATH", path_env)
        .args(["--input", &input.to_string_lossy()])
        .args(["--outdir", &outdir.to_string_lossy()])
        .arg("--no-color")
        .assert()
        .code(0)
        .stdout(predicate::str::contains("structure_qc"))
        .stdout(predicate::str::contains("avsync_qc"))
        .stdout(predicate::str::contains("Overall: PASSED"));
}
