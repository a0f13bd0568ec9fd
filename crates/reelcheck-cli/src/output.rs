//! Terminal rendering of the final QC verdict.
//!
//! The printed report is a human courtesy; the JSON master report on
//! disk is the authoritative artifact. Layout follows the governance
//! header convention: provenance block first, then the per-module
//! table, then the single-line verdict.

use console::style;
use reelcheck::{MasterReport, Status};

/// How much to print.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Failures and the final verdict only
    Quiet,
    /// Header, module table, verdict
    #[default]
    Normal,
    /// Everything, plus aggregated events
    Verbose,
}

/// Render the final master report to stdout.
pub fn print_master(master: &MasterReport, verbosity: Verbosity, use_color: bool) {
    if verbosity != Verbosity::Quiet {
        print_header(master, use_color);
        print_module_table(master, use_color);
        if verbosity == Verbosity::Verbose {
            print_events(master);
        }
    }
    print_verdict(master, use_color);
}

fn print_header(master: &MasterReport, use_color: bool) {
    let title = format!(
        "{} QC report — profile: {}",
        master.metadata.tool, master.metadata.profile
    );
    if use_color {
        println!("{}", style(&title).bold());
    } else {
        println!("{title}");
    }
    println!("  generated: {}", master.metadata.generated_on);
    println!("  hash:      {}", master.metadata.report_hash);
    if !master.known_deviations.is_empty() {
        println!("  deviations in force:");
        for dev in &master.known_deviations {
            println!(
                "    {} — {} ({}), approved by {}, expires {}",
                dev.id, dev.module, dev.condition, dev.approved_by, dev.expires_on
            );
        }
    }
    println!();
}

fn print_module_table(master: &MasterReport, use_color: bool) {
    let width = master
        .modules
        .keys()
        .map(String::len)
        .max()
        .unwrap_or(0)
        .max("module".len());

    println!("  {:width$}  {:14}  {:14}  notes", "module", "raw", "effective");
    for (module, report) in &master.modules {
        let effective = report.effective();
        let mut notes = report.policy_notes.join("; ");
        if let Some(code) = &report.error_code {
            if notes.is_empty() {
                notes = code.clone();
            } else {
                notes = format!("{code}; {notes}");
            }
        }
        println!(
            "  {:width$}  {}  {}  {}",
            module,
            padded_status(report.status, use_color),
            padded_status(effective, use_color),
            notes
        );
    }
    println!();
}

fn print_events(master: &MasterReport) {
    if master.aggregated_events.is_empty() {
        return;
    }
    println!("  events ({}):", master.aggregated_events.len());
    for event in &master.aggregated_events {
        println!(
            "    [{:9.3} - {:9.3}] {} ({}): {}",
            event.start_time, event.end_time, event.kind, event.source_module, event.details
        );
    }
    println!();
}

fn print_verdict(master: &MasterReport, use_color: bool) {
    println!(
        "Overall: {} (exit code {})",
        paint_status(master.overall_status, use_color),
        master.ci_exit_code
    );
}

fn paint_status(status: Status, use_color: bool) -> String {
    let text = status.as_str();
    if !use_color {
        return text.to_string();
    }
    let styled = match status {
        Status::Passed => style(text).green(),
        Status::Warning => style(text).yellow(),
        Status::Rejected | Status::Error | Status::Crashed => style(text).red().bold(),
        Status::NotApplicable => style(text).dim(),
    };
    styled.to_string()
}

/// Fixed-width status cell; pads after styling so ANSI escapes do not
/// count against the column width.
fn padded_status(status: Status, use_color: bool) -> String {
    let pad = 14usize.saturating_sub(status.as_str().len());
    format!("{}{}", paint_status(status, use_color), " ".repeat(pad))
}
