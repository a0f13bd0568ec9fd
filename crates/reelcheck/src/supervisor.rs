//! Execution supervisor: runs one validator subprocess with bounded
//! retries and a timeout.
//!
//! An attempt is successful only if the process exits 0 AND the report
//! file exists AND its contents parse as JSON. Corrupt JSON is retried
//! like any other failure; a timeout kills the child and counts as a
//! failure. When every attempt fails, a `CRASHED` placeholder report is
//! synthesized and written to the expected path, so downstream stages
//! never special-case a missing file.
//!
//! A validator failure is a representable outcome, never a pipeline
//! error. The one fatal path out of here is a contract violation in a
//! report the validator did produce.

use crate::config::{Profile, RetryPolicy, ValidatorSpec};
use crate::report::ValidatorReport;
use crate::result::{QcError, QcResult};
use crate::schema;
use crate::status::Status;
use serde_json::json;
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Error code stamped onto synthesized crash reports.
pub const CRASH_ERROR_CODE: &str = "VALIDATOR_CRASHED";

/// Maximum stderr bytes kept for logging and crash diagnostics.
const STDERR_CAPTURE_LIMIT: usize = 2000;

/// Poll interval while waiting on a child with a deadline.
const WAIT_POLL: Duration = Duration::from_millis(25);

/// Runs validators under one retry/timeout policy.
#[derive(Debug)]
pub struct Supervisor<'a> {
    retry: &'a RetryPolicy,
    profile: Profile,
    hwaccel: Option<&'a str>,
}

impl<'a> Supervisor<'a> {
    /// Create a supervisor for the given policy and profile.
    #[must_use]
    pub const fn new(retry: &'a RetryPolicy, profile: Profile, hwaccel: Option<&'a str>) -> Self {
        Self {
            retry,
            profile,
            hwaccel,
        }
    }

    /// Build the full argument vector for one validator invocation.
    #[must_use]
    pub fn build_command(&self, spec: &ValidatorSpec, input: &Path, output: &Path) -> Vec<String> {
        let mut cmd = spec.command.clone();
        cmd.push("--input".to_string());
        cmd.push(input.to_string_lossy().into_owned());
        cmd.push("--output".to_string());
        cmd.push(output.to_string_lossy().into_owned());
        if spec.supports_mode {
            cmd.push("--mode".to_string());
            cmd.push(self.profile.as_str().to_string());
        }
        if let Some(hwaccel) = self.hwaccel {
            cmd.push("--hwaccel".to_string());
            cmd.push(hwaccel.to_string());
        }
        cmd
    }

    /// Run one validator to completion, retrying per policy.
    ///
    /// Always leaves a parseable report file at `output` on return,
    /// either the validator's own or a synthesized crash report.
    ///
    /// # Errors
    ///
    /// `QcError::ContractViolation` if the validator produced a report
    /// that breaks the output contract; `QcError::Io` if the crash
    /// placeholder itself cannot be written.
    pub fn run(&self, spec: &ValidatorSpec, input: &Path, output: &Path) -> QcResult<ValidatorReport> {
        let cmd = self.build_command(spec, input, output);
        let attempts = self.retry.max_retries + 1;
        let mut last_failure = String::new();

        for attempt in 1..=attempts {
            let started = Instant::now();
            match self.attempt(&cmd, output, input) {
                AttemptOutcome::Success(report) => {
                    info!(
                        module = %spec.module,
                        status = %report.effective(),
                        attempt,
                        duration_sec = started.elapsed().as_secs_f64(),
                        "validator completed"
                    );
                    return Ok(report);
                }
                AttemptOutcome::Fatal(err) => return Err(err),
                AttemptOutcome::Failure(reason) => {
                    warn!(
                        module = %spec.module,
                        attempt,
                        duration_sec = started.elapsed().as_secs_f64(),
                        reason = %reason,
                        "validator attempt failed"
                    );
                    last_failure = reason;
                }
            }

            if attempt < attempts {
                std::thread::sleep(self.retry.retry_delay);
            }
        }

        warn!(module = %spec.module, attempts, "validator crashed; synthesizing placeholder report");
        self.synthesize_crash(spec, input, output, attempts, &last_failure)
    }

    fn attempt(&self, cmd: &[String], output: &Path, input: &Path) -> AttemptOutcome {
        let child = Command::new(&cmd[0])
            .args(&cmd[1..])
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn();

        let mut child = match child {
            Ok(child) => child,
            Err(e) => return AttemptOutcome::Failure(format!("spawn failed: {e}")),
        };

        // Drain stderr on its own thread so a chatty validator cannot
        // fill the pipe and block before exiting.
        let drain = spawn_stderr_drain(&mut child);

        let status = match wait_with_timeout(&mut child, self.retry.timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                return AttemptOutcome::Failure(format!(
                    "timed out after {:.1}s and was killed",
                    self.retry.timeout.as_secs_f64()
                ));
            }
            Err(e) => return AttemptOutcome::Failure(format!("wait failed: {e}")),
        };

        let stderr = drain.map_or_else(String::new, collect_stderr);

        if !status.success() {
            return AttemptOutcome::Failure(format!(
                "exit {}: {}",
                status.code().map_or_else(|| "signal".to_string(), |c| c.to_string()),
                stderr
            ));
        }
        if !output.exists() {
            return AttemptOutcome::Failure("exit 0 but no report file emitted".to_string());
        }

        match schema::load_report(output, &input.to_string_lossy()) {
            Ok(report) => AttemptOutcome::Success(report),
            Err(err @ QcError::ContractViolation { .. }) => AttemptOutcome::Fatal(err),
            Err(e) => AttemptOutcome::Failure(format!("corrupt report: {e}")),
        }
    }

    fn synthesize_crash(
        &self,
        spec: &ValidatorSpec,
        input: &Path,
        output: &Path,
        attempts: u32,
        last_failure: &str,
    ) -> QcResult<ValidatorReport> {
        let mut report = ValidatorReport::new(
            &spec.module,
            input.to_string_lossy(),
            Status::Crashed,
        );
        report.effective_status = Some(Status::Crashed);
        report.error_code = Some(CRASH_ERROR_CODE.to_string());
        report.details.insert(
            "error".to_string(),
            json!(format!("validator failed after {attempts} attempts")),
        );
        report
            .details
            .insert("log".to_string(), json!(last_failure));

        let serialized = serde_json::to_string_pretty(&report)?;
        std::fs::write(output, serialized)?;
        debug!(module = %spec.module, path = %output.display(), "crash report written");
        Ok(report)
    }
}

enum AttemptOutcome {
    Success(ValidatorReport),
    Failure(String),
    Fatal(QcError),
}

/// Wait for a child with a deadline; `None` means the deadline expired
/// and the child was killed.
fn wait_with_timeout(child: &mut Child, timeout: Duration) -> std::io::Result<Option<ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            child.kill()?;
            child.wait()?;
            return Ok(None);
        }
        std::thread::sleep(WAIT_POLL);
    }
}

/// Start a background reader for the child's stderr pipe.
fn spawn_stderr_drain(child: &mut Child) -> Option<std::thread::JoinHandle<String>> {
    let mut stderr = child.stderr.take()?;
    Some(std::thread::spawn(move || {
        let mut buf = String::new();
        let _ = stderr.read_to_string(&mut buf);
        buf
    }))
}

/// Join the drain thread and truncate its capture for diagnostics.
fn collect_stderr(drain: std::thread::JoinHandle<String>) -> String {
    let mut buf = drain.join().unwrap_or_default();
    if buf.len() > STDERR_CAPTURE_LIMIT {
        buf.truncate(STDERR_CAPTURE_LIMIT);
        buf.push_str("... [truncated]");
    }
    buf.trim().to_string()
}
