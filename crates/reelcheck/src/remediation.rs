//! External remediation collaborator.
//!
//! When the audio loudness module rejects an asset and the run asked for
//! `--fix`, the configured external fix command is invoked to produce a
//! corrected copy. Remediation changes a *new* output file; it never
//! alters the QC verdict of the analyzed asset.

use crate::result::{QcError, QcResult};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{info, warn};

/// Run the remediation command against `input`, writing `fixed_<name>`
/// into `outdir`.
///
/// # Errors
///
/// `QcError::Remediation` if the command cannot be spawned or exits
/// non-zero.
pub fn run_fix(command: &[String], input: &Path, outdir: &Path) -> QcResult<PathBuf> {
    let Some(program) = command.first() else {
        return Err(QcError::Remediation {
            message: "no remediation command configured".to_string(),
        });
    };

    let file_name = input
        .file_name()
        .map_or_else(|| "output".to_string(), |n| n.to_string_lossy().into_owned());
    let output = outdir.join(format!("fixed_{file_name}"));

    info!(program = %program, output = %output.display(), "running loudness remediation");

    let status = Command::new(program)
        .args(&command[1..])
        .arg("--input")
        .arg(input)
        .arg("--output")
        .arg(&output)
        .stdout(Stdio::null())
        .stderr(Stdio::inherit())
        .status()
        .map_err(|e| QcError::Remediation {
            message: format!("failed to spawn '{program}': {e}"),
        })?;

    if !status.success() {
        warn!(program = %program, %status, "remediation failed");
        return Err(QcError::Remediation {
            message: format!("'{program}' exited with {status}"),
        });
    }

    Ok(output)
}
