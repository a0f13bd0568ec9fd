//! Pipeline configuration.
//!
//! One explicit, immutable configuration struct is built at startup and
//! passed into the orchestrator; there is no package-level mutable state.
//! The default validator battery mirrors the standard QC battery
//! (structure, audio, signal, visual-defect and sync checks) in its fixed
//! declared order — the order only affects log readability, never the
//! verdict.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

/// Compliance profile selecting threshold and deviation behavior.
///
/// Policy only distinguishes `strict` from the relaxed profiles; the
/// individual relaxed profiles select different validator thresholds
/// and deviation scopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    /// Broadcast-grade: no deviations, ERROR is always fatal
    #[default]
    Strict,
    /// OTT delivery: tooling deviations permitted
    Ott,
    /// Netflix HD delivery profile
    NetflixHd,
    /// YouTube delivery profile
    Youtube,
}

impl Profile {
    /// Wire / CLI name of the profile.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Ott => "ott",
            Self::NetflixHd => "netflix_hd",
            Self::Youtube => "youtube",
        }
    }

    /// Under strict, no deviation may soften any status.
    #[must_use]
    pub const fn is_strict(self) -> bool {
        matches!(self, Self::Strict)
    }
}

impl std::str::FromStr for Profile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "strict" => Ok(Self::Strict),
            "ott" => Ok(Self::Ott),
            "netflix_hd" | "netflix-hd" => Ok(Self::NetflixHd),
            "youtube" => Ok(Self::Youtube),
            other => Err(format!(
                "unknown profile '{other}' (expected strict, ott, netflix_hd or youtube)"
            )),
        }
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One validator in the battery: a module key plus the subprocess that
/// implements it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorSpec {
    /// Unique module key; also the report filename stem
    pub module: String,
    /// Program plus fixed leading arguments; the supervisor appends
    /// `--input`, `--output` and (when supported) `--mode`
    pub command: Vec<String>,
    /// Whether the validator accepts a `--mode <profile>` flag
    pub supports_mode: bool,
}

impl ValidatorSpec {
    /// Create a spec for a single-binary validator that accepts `--mode`.
    #[must_use]
    pub fn new(module: impl Into<String>, program: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            command: vec![program.into()],
            supports_mode: true,
        }
    }
}

/// Retry and timeout policy for one validator invocation.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Additional attempts after the first (default 2)
    pub max_retries: u32,
    /// Fixed delay between attempts (default 1.0 s)
    pub retry_delay: Duration,
    /// Per-attempt wall-clock budget; expiry kills the child
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            retry_delay: Duration::from_secs(1),
            timeout: Duration::from_secs(600),
        }
    }
}

/// Immutable orchestrator configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Active compliance profile
    pub profile: Profile,
    /// Validator battery in declared execution order
    pub validators: Vec<ValidatorSpec>,
    /// Retry/timeout policy applied to every validator
    pub retry: RetryPolicy,
    /// Worker pool size; `None` means one worker per available core
    pub workers: Option<usize>,
    /// Modules whose ERROR may be softened by deviation (tooling-only)
    pub tooling_modules: BTreeSet<String>,
    /// Error codes eligible for deviation, per the tooling allowlist
    pub deviation_eligible_errors: BTreeSet<String>,
    /// Known-deviations file; `None` disables deviations entirely
    pub deviations_path: Option<PathBuf>,
    /// Hardware acceleration hint forwarded to validators
    pub hwaccel: Option<String>,
    /// Module watched by the `--fix` workflow
    pub remediation_module: String,
    /// External remediation command (program + fixed args)
    pub remediation_command: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            profile: Profile::Strict,
            validators: default_battery(),
            retry: RetryPolicy::default(),
            workers: None,
            tooling_modules: ["qctools_qc"].iter().map(ToString::to_string).collect(),
            deviation_eligible_errors: [
                "QCTOOLS_UNAVAILABLE",
                "QCTOOLS_NOT_INSTALLED",
                "QCTOOLS_BUILD_MISSING",
            ]
            .iter()
            .map(ToString::to_string)
            .collect(),
            deviations_path: Some(PathBuf::from("KNOWN_DEVIATIONS.md")),
            hwaccel: None,
            remediation_module: "audio_qc".to_string(),
            remediation_command: vec!["qc-fix-loudness".to_string()],
        }
    }
}

impl PipelineConfig {
    /// Set the active profile.
    #[must_use]
    pub const fn with_profile(mut self, profile: Profile) -> Self {
        self.profile = profile;
        self
    }

    /// Replace the validator battery.
    #[must_use]
    pub fn with_validators(mut self, validators: Vec<ValidatorSpec>) -> Self {
        self.validators = validators;
        self
    }

    /// Set the retry/timeout policy.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set an explicit worker pool size.
    #[must_use]
    pub const fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    /// Set the known-deviations file (or disable with `None`).
    #[must_use]
    pub fn with_deviations_path(mut self, path: Option<PathBuf>) -> Self {
        self.deviations_path = path;
        self
    }

    /// Set the hardware acceleration hint.
    #[must_use]
    pub fn with_hwaccel(mut self, hwaccel: impl Into<String>) -> Self {
        self.hwaccel = Some(hwaccel.into());
        self
    }

    /// Effective worker count.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(std::num::NonZeroUsize::get)
                .unwrap_or(1)
        })
    }
}

/// The standard QC battery, in declared order.
#[must_use]
pub fn default_battery() -> Vec<ValidatorSpec> {
    vec![
        // Hygiene and metadata
        ValidatorSpec::new("structure_qc", "qc-validate-structure"),
        // Audio quality
        ValidatorSpec::new("audio_qc", "qc-validate-loudness"),
        ValidatorSpec::new("audio_signal_qc", "qc-validate-audio-signal"),
        // Video signal levels
        ValidatorSpec::new("signal_qc", "qc-validate-signal"),
        ValidatorSpec::new("qctools_qc", "qc-validate-qctools"),
        ValidatorSpec::new("artifact_qc", "qc-validate-artifacts"),
        // Visual defects
        ValidatorSpec::new("black_freeze_qc", "qc-validate-black-freeze"),
        ValidatorSpec::new("frame_qc", "qc-validate-frames"),
        ValidatorSpec::new("gop_qc", "qc-validate-gop"),
        ValidatorSpec::new("interlace_qc", "qc-validate-interlace"),
        // Synchronization
        ValidatorSpec::new("timestamp_qc", "qc-validate-timestamps"),
        ValidatorSpec::new("avsync_qc", "qc-validate-avsync"),
    ]
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_parse() {
        assert_eq!("strict".parse::<Profile>().unwrap(), Profile::Strict);
        assert_eq!("netflix-hd".parse::<Profile>().unwrap(), Profile::NetflixHd);
        assert!("broadcast".parse::<Profile>().is_err());
        assert!(Profile::Strict.is_strict());
        assert!(!Profile::Ott.is_strict());
    }

    #[test]
    fn test_default_battery_unique_modules() {
        let battery = default_battery();
        let mut seen = BTreeSet::new();
        for spec in &battery {
            assert!(seen.insert(spec.module.clone()), "duplicate {}", spec.module);
        }
        assert_eq!(battery.len(), 12);
    }

    #[test]
    fn test_builder_chain() {
        let cfg = PipelineConfig::default()
            .with_profile(Profile::Ott)
            .with_workers(4)
            .with_hwaccel("cuda");
        assert_eq!(cfg.profile, Profile::Ott);
        assert_eq!(cfg.worker_count(), 4);
        assert_eq!(cfg.hwaccel.as_deref(), Some("cuda"));
        assert!(cfg.tooling_modules.contains("qctools_qc"));
    }
}
