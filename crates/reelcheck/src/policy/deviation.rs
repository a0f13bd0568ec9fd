//! Known-deviation records and their flat-text parser.
//!
//! Deviations live in a blank-line-delimited `key: value` file
//! (conventionally `KNOWN_DEVIATIONS.md`):
//!
//! ```text
//! id: DEV-001
//! module: qctools_qc
//! condition: QCTOOLS_UNAVAILABLE
//! scope: all
//! justification: tool not installed in this environment
//! approved_by: qa-lead
//! created_on: 2025-01-01
//! expires_on: 2025-12-31
//! profiles: ott
//! ```
//!
//! Malformed blocks are rejected with an explicit warning; expired or
//! out-of-profile blocks are discarded at load time so the policy engine
//! only ever sees deviations that are actually in force.

use crate::config::Profile;
use crate::result::{QcError, QcResult};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, warn};

/// A time-boxed, profile-scoped waiver for one tooling error condition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deviation {
    /// Stable identifier (e.g. "DEV-001")
    pub id: String,
    /// Module the waiver applies to
    pub module: String,
    /// Error code the waiver matches against
    pub condition: String,
    /// Asset scope ("all" or a narrower label)
    pub scope: String,
    /// Why the waiver exists
    pub justification: String,
    /// Who approved it
    pub approved_by: String,
    /// Approval date
    pub created_on: NaiveDate,
    /// Last day the waiver is valid (inclusive)
    pub expires_on: NaiveDate,
    /// Profiles the waiver is scoped to
    pub profiles: BTreeSet<String>,
}

impl Deviation {
    /// Whether this deviation matches a module/error pair and is still
    /// in force on `today`.
    #[must_use]
    pub fn matches(&self, module: &str, error_code: &str, today: NaiveDate) -> bool {
        self.module == module && self.condition == error_code && today <= self.expires_on
    }
}

/// Load the deviations in force for `profile` on `today`.
///
/// A missing file is not an error: it means no deviations are registered.
///
/// # Errors
///
/// `QcError::Io` if the file exists but cannot be read.
pub fn load_deviations(path: &Path, profile: Profile, today: NaiveDate) -> QcResult<Vec<Deviation>> {
    if !path.exists() {
        debug!(path = %path.display(), "no deviation file; none in force");
        return Ok(Vec::new());
    }

    let text = std::fs::read_to_string(path)?;
    let mut deviations = Vec::new();

    for (block_no, block) in text.split("\n\n").enumerate() {
        let block = block.trim();
        if block.is_empty() {
            continue;
        }
        match parse_block(block) {
            Ok(dev) => {
                if today > dev.expires_on {
                    debug!(id = %dev.id, expired = %dev.expires_on, "deviation expired; discarded");
                    continue;
                }
                if !dev.profiles.contains(profile.as_str()) {
                    debug!(id = %dev.id, profile = %profile, "deviation out of profile; discarded");
                    continue;
                }
                deviations.push(dev);
            }
            Err(e) => {
                warn!(
                    path = %path.display(),
                    block = block_no + 1,
                    error = %e,
                    "malformed deviation block rejected"
                );
            }
        }
    }

    Ok(deviations)
}

/// Parse one `key: value` block into a validated record.
fn parse_block(block: &str) -> QcResult<Deviation> {
    let mut id = None;
    let mut module = None;
    let mut condition = None;
    let mut scope = None;
    let mut justification = None;
    let mut approved_by = None;
    let mut created_on = None;
    let mut expires_on = None;
    let mut profiles = BTreeSet::new();

    for line in block.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            return Err(malformed(format!("line without 'key: value' shape: '{line}'")));
        };
        let key = key.trim();
        let value = value.trim().to_string();

        match key {
            "id" => id = Some(value),
            "module" => module = Some(value),
            "condition" => condition = Some(value),
            "scope" => scope = Some(value),
            "justification" => justification = Some(value),
            "approved_by" => approved_by = Some(value),
            "created_on" => created_on = Some(parse_date(key, &value)?),
            // `expires` is the legacy spelling still found in older files
            "expires_on" | "expires" => expires_on = Some(parse_date(key, &value)?),
            "profiles" => {
                profiles = value
                    .split([',', ' '])
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(ToString::to_string)
                    .collect();
            }
            other => return Err(malformed(format!("unknown key '{other}'"))),
        }
    }

    let id = id.ok_or_else(|| malformed("missing 'id'"))?;
    let module = module.ok_or_else(|| malformed("missing 'module'"))?;
    let condition = condition.ok_or_else(|| malformed("missing 'condition'"))?;
    let expires_on = expires_on.ok_or_else(|| malformed("missing 'expires_on'"))?;
    if profiles.is_empty() {
        return Err(malformed("missing or empty 'profiles'"));
    }

    Ok(Deviation {
        id,
        module,
        condition,
        scope: scope.unwrap_or_else(|| "all".to_string()),
        justification: justification.unwrap_or_default(),
        approved_by: approved_by.unwrap_or_default(),
        created_on: created_on.unwrap_or(expires_on),
        expires_on,
        profiles,
    })
}

fn parse_date(key: &str, value: &str) -> QcResult<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| malformed(format!("bad date in '{key}': {e}")))
}

fn malformed(message: impl Into<String>) -> QcError {
    QcError::DeviationParse {
        path: String::new(),
        message: message.into(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = "\
id: DEV-001
module: qctools_qc
condition: QCTOOLS_UNAVAILABLE
scope: all
justification: tool not installed in this environment
approved_by: qa-lead
created_on: 2025-01-01
expires_on: 2099-12-31
profiles: ott

id: DEV-002
module: qctools_qc
condition: QCTOOLS_BUILD_MISSING
scope: all
justification: container image lacks qctools build
approved_by: qa-lead
created_on: 2025-01-01
expires_on: 2020-01-01
profiles: ott

id: DEV-003
module: qctools_qc
condition: QCTOOLS_UNAVAILABLE
expires_on: 2099-12-31
profiles: youtube, netflix_hd
";

    fn write_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 15).unwrap()
    }

    #[test]
    fn test_load_filters_expired_and_profile() {
        let file = write_file(SAMPLE);
        let devs = load_deviations(file.path(), Profile::Ott, today()).unwrap();
        // DEV-002 expired, DEV-003 scoped to other profiles
        assert_eq!(devs.len(), 1);
        assert_eq!(devs[0].id, "DEV-001");
        assert!(devs[0].matches("qctools_qc", "QCTOOLS_UNAVAILABLE", today()));
        assert!(!devs[0].matches("qctools_qc", "OTHER_CODE", today()));
    }

    #[test]
    fn test_profile_scoping() {
        let file = write_file(SAMPLE);
        let devs = load_deviations(file.path(), Profile::Youtube, today()).unwrap();
        assert_eq!(devs.len(), 1);
        assert_eq!(devs[0].id, "DEV-003");
    }

    #[test]
    fn test_missing_file_is_empty() {
        let devs = load_deviations(
            Path::new("/nonexistent/KNOWN_DEVIATIONS.md"),
            Profile::Ott,
            today(),
        )
        .unwrap();
        assert!(devs.is_empty());
    }

    #[test]
    fn test_malformed_block_skipped_not_fatal() {
        let file = write_file(
            "id: DEV-BAD\nmodule: qctools_qc\n\n\
             id: DEV-OK\nmodule: qctools_qc\ncondition: QCTOOLS_UNAVAILABLE\n\
             expires_on: 2099-12-31\nprofiles: ott\n",
        );
        let devs = load_deviations(file.path(), Profile::Ott, today()).unwrap();
        assert_eq!(devs.len(), 1);
        assert_eq!(devs[0].id, "DEV-OK");
    }

    #[test]
    fn test_legacy_expires_key() {
        let file = write_file(
            "id: DEV-L\nmodule: qctools_qc\ncondition: QCTOOLS_UNAVAILABLE\n\
             expires: 2099-12-31\nprofiles: ott\n",
        );
        let devs = load_deviations(file.path(), Profile::Ott, today()).unwrap();
        assert_eq!(devs.len(), 1);
    }

    #[test]
    fn test_expiry_is_inclusive() {
        let dev = parse_block(
            "id: D\nmodule: m\ncondition: C\nexpires_on: 2026-01-15\nprofiles: ott",
        )
        .unwrap();
        assert!(dev.matches("m", "C", today()));
        assert!(!dev.matches("m", "C", today().succ_opt().unwrap()));
    }
}
