//! CLI output formatting for progress, banners and the end-of-run summary.
//!
//! # Output Format
//!
//! ## Banner
//!
//! ```text
//! Converting all files in /photos/in
//! 	into /photos/out 	(group enhancing enabled)
//!
//! ```
//!
//! ## Progress
//!
//! One line per event, the relative path first:
//!
//! ```text
//! .../		 => browsing folder
//! .../IMG_0001.CR2		 => converting RAW-file
//! .../notes.txt		 => copying file
//! .../IMG_0002.CR2		 => ignored (file exists)
//! .../IMG_0003.CR2		 => failed (decode failed: ...)
//! ```
//!
//! ## Summary
//!
//! ```text
//!
//! 1 errors occurred:
//! 	/photos/in/IMG_0003.CR2: decode failed: ...
//! Converted 1, copied 1, ignored 1
//!
//! Finished in 0:00:02.512000
//! Done
//! ```
//!
//! # Architecture
//!
//! Each output has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects.

use crate::report::{Action, Event, RunReport};
use std::path::Path;
use std::time::Duration;

/// Which kind of run a banner announces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BannerKind {
    /// A whole directory is converted.
    Folder { group: bool },
    /// A whole directory is archived.
    Archive,
    /// A single file is processed.
    File,
}

// ============================================================================
// Banner
// ============================================================================

pub fn format_banner(kind: BannerKind, source: &Path, destination: &Path) -> Vec<String> {
    let (heading, group) = match kind {
        BannerKind::Folder { group } => (format!("Converting all files in {}", source.display()), group),
        BannerKind::Archive => (format!("Archiving all files in {}", source.display()), false),
        BannerKind::File => (format!("Converting {}", source.display()), false),
    };
    let mut into = format!("\tinto {}", destination.display());
    if group {
        into.push_str(" \t(group enhancing enabled)");
    }
    vec![heading, into, String::new()]
}

pub fn print_banner(kind: BannerKind, source: &Path, destination: &Path) {
    for line in format_banner(kind, source, destination) {
        println!("{}", line);
    }
}

// ============================================================================
// Progress events
// ============================================================================

fn action_label(action: &Action) -> String {
    match action {
        Action::BrowsingFolder => "browsing folder".to_string(),
        Action::Converting => "converting RAW-file".to_string(),
        Action::Copying => "copying file".to_string(),
        Action::Ignored => "ignored (file exists)".to_string(),
        Action::Failed(cause) => format!("failed ({})", cause),
    }
}

pub fn format_event(event: &Event) -> String {
    format!("...{}\t\t => {}", event.path, action_label(&event.action))
}

// ============================================================================
// Summary
// ============================================================================

/// Elapsed time as `H:MM:SS.ffffff`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!(
        "{}:{:02}:{:02}.{:06}",
        secs / 3600,
        (secs / 60) % 60,
        secs % 60,
        elapsed.subsec_micros()
    )
}

pub fn format_summary(report: &RunReport, elapsed: Duration) -> Vec<String> {
    let mut lines = vec![String::new()];
    if report.interrupted {
        lines.push("Interrupted".to_string());
    }
    if report.failures.is_empty() {
        lines.push("No errors occurred".to_string());
    } else {
        lines.push(format!("{} errors occurred:", report.failures.len()));
        for failure in &report.failures {
            lines.push(format!("\t{}: {}", failure.path.display(), failure.cause));
        }
    }
    lines.push(format!(
        "Converted {}, copied {}, ignored {}",
        report.converted, report.copied, report.ignored
    ));
    lines.push(String::new());
    lines.push(format!("Finished in {}", format_elapsed(elapsed)));
    lines.push("Done".to_string());
    lines
}

pub fn print_summary(report: &RunReport, elapsed: Duration) {
    for line in format_summary(report, elapsed) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================
