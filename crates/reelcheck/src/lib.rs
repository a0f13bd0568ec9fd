//! Reelcheck: media QC orchestration, policy, and aggregation engine.
//!
//! Turns N independently-failing, independently-retryable validator
//! subprocesses into one trustworthy pass/fail decision with
//! machine-readable evidence.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                     REELCHECK Pipeline                           │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  Segmenter ──► {segment, offset} ──► Worker Pool                 │
//! │                                         │  per unit:             │
//! │                                         │  Supervisor × battery  │
//! │                                         │  ──► Schema ──► Policy │
//! │                                         │  ──► unit Master       │
//! │  Worker Pool ──► segment masters ──► Master Aggregator           │
//! │  (offset-aware event stitching) ──► Policy ──► CI exit code      │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The invariants this crate protects: exactly one status per module,
//! monotonic severity escalation, at most one relaxation of a failure
//! (via an explicit, expiring, profile-scoped deviation), idempotent
//! event merging across re-runs, and correct time-axis reconstruction
//! when a long asset is analyzed as independent segments.

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

pub mod aggregate;
pub mod config;
pub mod policy;
pub mod remediation;
pub mod report;
pub mod result;
pub mod runner;
pub mod schema;
pub mod segment;
pub mod status;
pub mod supervisor;

pub use aggregate::{aggregate_reports, aggregate_segments, stitch_events, MasterAggregator};
pub use config::{default_battery, PipelineConfig, Profile, RetryPolicy, ValidatorSpec};
pub use policy::{compute_ci, load_deviations, Deviation, PolicyEngine};
pub use report::{Event, MasterReport, ReportMetadata, ValidatorReport};
pub use result::{QcError, QcResult};
pub use runner::{pool::run_all, UnitOutcome, WorkUnit};
pub use segment::{media_duration, segment_video, Segment, SegmentManifest};
pub use status::Status;
pub use supervisor::Supervisor;
