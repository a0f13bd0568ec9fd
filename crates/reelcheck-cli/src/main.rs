//! Reelcheck CLI: run the QC validator battery against a media asset.
//!
//! ## Usage
//!
//! ```bash
//! reelcheck --input master.mp4                      # strict profile, whole file
//! reelcheck --input master.mp4 --mode ott           # OTT profile, deviations allowed
//! reelcheck --input master.mp4 --segments 300       # parallel 5-minute segments
//! reelcheck --input master.mp4 --fix                # remediate on audio failure
//! ```
//!
//! The exit code is the CI verdict: 0 for PASSED/WARNING, 2 for
//! REJECTED, 3 for ERROR or a pipeline failure.

mod error;
mod output;

use clap::Parser;
use error::{CliError, CliResult};
use output::Verbosity;
use reelcheck::runner::failure_report;
use reelcheck::{
    aggregate_reports, aggregate_segments, load_deviations, remediation, run_all, Deviation,
    MasterReport, PipelineConfig, Profile, Status, WorkUnit,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Filename of the top-level verdict artifact.
const FINAL_MASTER_FILENAME: &str = "Final_Master_Report.json";

#[derive(Parser, Debug)]
#[command(
    name = "reelcheck",
    version,
    about = "Automated media QC: validator battery, policy resolution, authoritative verdict"
)]
struct Cli {
    /// Media file to analyze
    #[arg(short, long, value_name = "FILE")]
    input: PathBuf,

    /// Base output directory; a per-asset subdirectory is created inside
    #[arg(short, long, value_name = "DIR", default_value = "qc_reports")]
    outdir: PathBuf,

    /// Compliance profile: strict, ott, netflix_hd or youtube
    #[arg(short, long, value_name = "PROFILE", default_value = "strict")]
    mode: Profile,

    /// Split the asset into fixed-length segments and run them in parallel
    #[arg(long, value_name = "SECONDS")]
    segments: Option<f64>,

    /// Worker pool size (defaults to one per available core)
    #[arg(long, value_name = "N")]
    workers: Option<usize>,

    /// Known-deviations file (default: KNOWN_DEVIATIONS.md if present)
    #[arg(long, value_name = "FILE")]
    deviations: Option<PathBuf>,

    /// Hardware acceleration hint forwarded to validators
    #[arg(long, value_name = "NAME")]
    hwaccel: Option<String>,

    /// Run the configured remediation command when the watched module fails
    #[arg(long)]
    fix: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Print only failures and the final verdict
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    match run(&cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(3)
        }
    }
}

fn init_tracing(cli: &Cli) {
    let default_level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> CliResult<u8> {
    if !cli.input.is_file() {
        return Err(CliError::invalid_argument(format!(
            "input file '{}' does not exist",
            cli.input.display()
        )));
    }

    let report_root = report_root(&cli.outdir, &cli.input);
    std::fs::create_dir_all(&report_root)?;

    let mut config = PipelineConfig::default().with_profile(cli.mode);
    if let Some(workers) = cli.workers {
        config = config.with_workers(workers);
    }
    if let Some(hwaccel) = &cli.hwaccel {
        config = config.with_hwaccel(hwaccel.clone());
    }
    if cli.deviations.is_some() {
        config = config.with_deviations_path(cli.deviations.clone());
    }

    let deviations = load_active_deviations(&config)?;
    let units = build_units(cli, &report_root)?;

    let outcomes = run_all(units, &config, &deviations, &report_root);

    // Every unit contributes to the final master: a unit that failed
    // outright (contract violation, lost output directory) enters as a
    // synthetic ERROR module so the verdict still covers it.
    let masters: Vec<(f64, MasterReport)> = outcomes
        .into_iter()
        .map(|outcome| {
            let master = match outcome.result {
                Ok(master) => master,
                Err(e) => {
                    warn!(unit = %outcome.label, error = %e, "unit failed; recorded in verdict");
                    aggregate_reports(vec![failure_report(&outcome.label, &e)], cli.mode, vec![])
                }
            };
            (outcome.offset, master)
        })
        .collect();

    let mut final_master =
        aggregate_segments(masters.iter().map(|(off, m)| (*off, m)), cli.mode);
    final_master.known_deviations = deviations;

    let final_path = report_root.join(FINAL_MASTER_FILENAME);
    std::fs::write(&final_path, serde_json::to_string_pretty(&final_master)?)?;
    info!(path = %final_path.display(), "final master report written");

    output::print_master(&final_master, verbosity(cli), !cli.no_color);

    if cli.fix {
        maybe_remediate(cli, &config, &final_master, &report_root);
    }

    Ok(u8::try_from(final_master.ci_exit_code).unwrap_or(3))
}

/// Per-asset report directory: `<outdir>/<stem>_qc_report`.
fn report_root(outdir: &Path, input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map_or_else(|| "asset".to_string(), |s| s.to_string_lossy().into_owned());
    outdir.join(format!("{stem}_qc_report"))
}

fn load_active_deviations(config: &PipelineConfig) -> CliResult<Vec<Deviation>> {
    let Some(path) = &config.deviations_path else {
        return Ok(Vec::new());
    };
    let today = chrono::Utc::now().date_naive();
    Ok(load_deviations(path, config.profile, today)?)
}

/// Plan the work: either one whole-file unit, or ffmpeg-cut segments.
fn build_units(cli: &Cli, report_root: &Path) -> CliResult<Vec<WorkUnit>> {
    let Some(segment_sec) = cli.segments else {
        return Ok(vec![WorkUnit::File {
            input: cli.input.clone(),
        }]);
    };

    check_tool("ffprobe")?;
    check_tool("ffmpeg")?;

    let segments_dir = report_root.join("segments");
    let manifest = reelcheck::segment_video(&cli.input, &segments_dir, segment_sec)?;
    info!(
        segments = manifest.segments.len(),
        total_duration = manifest.total_duration,
        "segmentation complete"
    );
    Ok(manifest
        .segments
        .into_iter()
        .map(WorkUnit::Segment)
        .collect())
}

/// Fail fast with a clear message when a media tool is absent, instead
/// of surfacing a raw spawn error mid-run.
fn check_tool(tool: &str) -> CliResult<()> {
    let probe = std::process::Command::new(tool)
        .arg("-version")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status();
    match probe {
        Ok(_) => Ok(()),
        Err(_) => Err(CliError::missing_tool(tool)),
    }
}

/// Run the remediation command if the watched module's effective status
/// warrants it. Remediation failure never changes the QC verdict.
fn maybe_remediate(
    cli: &Cli,
    config: &PipelineConfig,
    master: &MasterReport,
    report_root: &Path,
) {
    let Some(report) = master.modules.get(&config.remediation_module) else {
        return;
    };
    if !matches!(report.effective(), Status::Warning | Status::Rejected) {
        return;
    }

    info!(
        module = %config.remediation_module,
        status = %report.effective(),
        "running remediation"
    );
    match remediation::run_fix(&config.remediation_command, &cli.input, report_root) {
        Ok(fixed) => {
            println!("Remediated copy written: {}", fixed.display());
            println!("Re-run QC against the remediated file to confirm.");
        }
        Err(e) => {
            warn!(error = %e, "remediation failed");
            eprintln!("Remediation failed: {e}");
        }
    }
}

fn verbosity(cli: &Cli) -> Verbosity {
    if cli.quiet {
        Verbosity::Quiet
    } else if cli.verbose > 0 {
        Verbosity::Verbose
    } else {
        Verbosity::Normal
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn report_root_uses_file_stem() {
        let root = report_root(Path::new("/tmp/out"), Path::new("/media/show_ep01.mp4"));
        assert_eq!(root, PathBuf::from("/tmp/out/show_ep01_qc_report"));
    }

    #[test]
    fn verify_cli_args() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn profile_parses_from_mode_flag() {
        let cli = Cli::parse_from(["reelcheck", "--input", "a.mp4", "--mode", "netflix_hd"]);
        assert_eq!(cli.mode, Profile::NetflixHd);
        assert!(!cli.fix);
    }

    #[test]
    fn segments_flag_is_optional_seconds() {
        let cli = Cli::parse_from(["reelcheck", "--input", "a.mp4", "--segments", "300"]);
        assert_eq!(cli.segments, Some(300.0));
    }
}
