//! Progress lines and batch reports for the command-line surface.

use crate::error::{FailureKind, FetchStage};
use crate::fetch::{BatchEntry, FetchOutcome};
use serde::Serialize;
use std::fmt::Display;
use std::io::Write;

/// Write one line to `stderr`, ignoring write failures.
pub fn write_stderr_line(stderr: &mut dyn Write, message: impl Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort progress output; ignore write failures.
    }
}

/// Format the line reported for a published archive.
///
/// # Example
///
/// ```
/// use camino::Utf8PathBuf;
/// use vsix_fetch::artefact::spec::PackageSpec;
/// use vsix_fetch::fetch::FetchOutcome;
/// use vsix_fetch::output::success_line;
///
/// let outcome = FetchOutcome {
///     spec: PackageSpec::new("pub.ext", "9.9.9", None).expect("valid spec"),
///     path: Utf8PathBuf::from("out/pub.ext-9.9.9.vsix"),
///     bytes: 2048,
///     sha256: "ab".repeat(32),
///     was_gzipped: true,
///     repacked: true,
/// };
/// assert!(success_line(&outcome).starts_with("Saved out/pub.ext-9.9.9.vsix (2048 bytes"));
/// ```
#[must_use]
pub fn success_line(outcome: &FetchOutcome) -> String {
    let mut notes = Vec::new();
    if outcome.was_gzipped {
        notes.push("gzip layer removed");
    }
    if outcome.repacked {
        notes.push("repacked");
    }
    let notes = if notes.is_empty() {
        String::new()
    } else {
        format!(", {}", notes.join(", "))
    };
    format!(
        "Saved {} ({} bytes{notes}; sha256 {})",
        outcome.path, outcome.bytes, outcome.sha256
    )
}

/// Format the closing summary of a batch.
#[must_use]
pub fn summary_line(entries: &[BatchEntry]) -> String {
    let failed = entries.iter().filter(|e| e.result.is_err()).count();
    let succeeded = entries.len() - failed;
    let noun = if entries.len() == 1 {
        "package"
    } else {
        "packages"
    };
    format!(
        "Fetched {succeeded} of {} {noun}; {failed} failed",
        entries.len()
    )
}

/// One entry of the machine-readable batch report.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReportEntry<'a> {
    /// A published archive.
    Ok(&'a FetchOutcome),
    /// A failed download.
    Failed {
        /// The requested package.
        spec: String,
        /// The request URL.
        url: &'a str,
        /// The stage that failed.
        stage: FetchStage,
        /// The failure classification.
        kind: FailureKind,
        /// The full error message.
        message: String,
    },
}

impl<'a> From<&'a BatchEntry> for ReportEntry<'a> {
    fn from(entry: &'a BatchEntry) -> Self {
        match &entry.result {
            Ok(outcome) => Self::Ok(outcome),
            Err(err) => Self::Failed {
                spec: entry.spec.to_string(),
                url: err.url(),
                stage: err.stage(),
                kind: err.kind(),
                message: err.to_string(),
            },
        }
    }
}

/// Render the ordered batch outcome as pretty-printed JSON.
///
/// # Errors
///
/// Returns an error if serialisation fails.
pub fn json_report(entries: &[BatchEntry]) -> serde_json::Result<String> {
    let report: Vec<ReportEntry<'_>> = entries.iter().map(ReportEntry::from).collect();
    serde_json::to_string_pretty(&report)
}
