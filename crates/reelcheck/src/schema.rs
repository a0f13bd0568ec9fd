//! Validator report contract enforcement.
//!
//! A report is not trusted until it passes through here. The contract is
//! hard: required fields, a closed status enum, and evidence (events) for
//! any non-PASSED verdict. A module claiming failure with zero evidence
//! is an integration defect, not a QC finding, and raises instead of
//! being silently accepted.
//!
//! One pragmatic exception: legacy reports missing `module` or `status`
//! are repaired (module inferred from the filename, missing status forced
//! to ERROR) and annotated, rather than rejected outright.

use crate::report::ValidatorReport;
use crate::result::{QcError, QcResult};
use crate::status::Status;
use serde_json::Value;
use std::path::Path;
use tracing::warn;

/// Error code stamped onto repaired reports that had no status field.
pub const MISSING_STATUS_CODE: &str = "MISSING_STATUS_FIELD";

/// Load a report file, repair legacy shapes, and enforce the contract.
///
/// # Errors
///
/// `QcError::Json` if the file is not JSON at all (the supervisor treats
/// that as a retryable attempt failure); `QcError::ContractViolation` if
/// the parsed report breaks the contract (fatal to the unit of work).
pub fn load_report(path: &Path, fallback_video: &str) -> QcResult<ValidatorReport> {
    let raw = std::fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&raw)?;
    repair_and_validate(value, path, fallback_video)
}

/// Repair a raw report value and validate it against the contract.
pub fn repair_and_validate(
    mut value: Value,
    path: &Path,
    fallback_video: &str,
) -> QcResult<ValidatorReport> {
    let module_hint = module_from_filename(path);

    let Some(map) = value.as_object_mut() else {
        return Err(QcError::contract(
            module_hint,
            "report is not a JSON object",
        ));
    };

    let mut repairs = Vec::new();

    if !map.contains_key("module") {
        warn!(module = %module_hint, "report missing 'module'; inferring from filename");
        map.insert("module".to_string(), Value::String(module_hint.clone()));
        repairs.push("repaired: 'module' inferred from report filename".to_string());
    }

    if !map.contains_key("video_file") {
        map.insert(
            "video_file".to_string(),
            Value::String(fallback_video.to_string()),
        );
        repairs.push("repaired: 'video_file' backfilled from unit input".to_string());
    }

    if !map.contains_key("status") {
        warn!(module = %module_hint, "report missing 'status'; forcing ERROR");
        map.insert("status".to_string(), Value::String("ERROR".to_string()));
        map.insert(
            "error_code".to_string(),
            Value::String(MISSING_STATUS_CODE.to_string()),
        );
        // An evidence-free forced ERROR would itself violate the
        // contract, so the repair carries its own event.
        map.entry("events").or_insert_with(|| Value::Array(vec![]));
        if let Some(events) = map.get_mut("events").and_then(Value::as_array_mut) {
            if events.is_empty() {
                events.push(serde_json::json!({
                    "type": "contract_repair",
                    "start_time": 0.0,
                    "end_time": 0.0,
                    "details": "legacy report carried no status field",
                    "source_module": module_hint,
                }));
            }
        }
        repairs.push("repaired: missing 'status' forced to ERROR".to_string());
    }

    // Status must be a known member before typed deserialization.
    let status = match map.get("status").and_then(Value::as_str) {
        Some(s) => Status::parse(s)
            .ok_or_else(|| QcError::contract(&module_hint, format!("invalid status '{s}'")))?,
        None => {
            return Err(QcError::contract(
                module_hint,
                "'status' is not a string",
            ))
        }
    };
    if !status.is_contract_status() && status != Status::Crashed {
        return Err(QcError::contract(
            module_hint,
            format!("status '{status}' is not a validator-emittable status"),
        ));
    }

    for key in ["metrics", "events"] {
        if !map.contains_key(key) {
            // Tolerated only for synthesized crash reports; real
            // validators must emit both keys.
            if status == Status::Crashed {
                continue;
            }
            return Err(QcError::contract(
                module_hint,
                format!("missing required key '{key}'"),
            ));
        }
    }

    let mut report: ValidatorReport = serde_json::from_value(value)?;
    report.policy_notes.extend(repairs);
    validate_report(&report)?;
    Ok(report)
}

/// Enforce the contract on an already-typed report.
pub fn validate_report(report: &ValidatorReport) -> QcResult<()> {
    if report.module.is_empty() {
        return Err(QcError::contract("<unknown>", "empty 'module' key"));
    }

    if report.status.requires_events() && report.events.is_empty() {
        return Err(QcError::contract(
            &report.module,
            format!(
                "status={} but no events emitted",
                report.status
            ),
        ));
    }

    for event in &report.events {
        if event.start_time < 0.0 || event.end_time < event.start_time {
            return Err(QcError::contract(
                &report.module,
                format!(
                    "event '{}' has invalid time range {}..{}",
                    event.kind, event.start_time, event.end_time
                ),
            ));
        }
    }

    Ok(())
}

/// Infer a module key from a report filename (`audio_qc.json` -> `audio_qc`).
fn module_from_filename(path: &Path) -> String {
    path.file_stem()
        .map_or_else(|| "unknown".to_string(), |s| s.to_string_lossy().into_owned())
}
