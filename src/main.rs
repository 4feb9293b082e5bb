//! `vsix-fetch` CLI entrypoint.
//!
//! Downloads the requested extension packages and publishes each one as a
//! well-formed `.vsix` archive. Progress goes to stderr; `--json` prints the
//! batch outcome on stdout.

use clap::Parser;
use log::warn;
use std::io::{self, Write};
use vsix_fetch::artefact::spec::PackageSpec;
use vsix_fetch::cli::Cli;
use vsix_fetch::config::FetchConfig;
use vsix_fetch::fetch::{BatchEntry, fetch_all};
use vsix_fetch::manifest::{BatchManifest, ManifestError};
use vsix_fetch::output::{json_report, summary_line, write_stderr_line};
use vsix_fetch::residue::{DEFAULT_RESIDUE_AGE, sweep_residue};

/// Exit status when every package was published.
const EXIT_OK: i32 = 0;
/// Exit status when at least one package failed.
const EXIT_FAILED: i32 = 1;
/// Exit status for invalid arguments or manifests.
const EXIT_USAGE: i32 = 2;

fn main() {
    let cli = Cli::parse();
    let mut stdout = io::stdout();
    let mut stderr = io::stderr();
    let exit_code = match prepare(&cli) {
        Ok((specs, config)) => run(&cli, &specs, &config, &mut stdout, &mut stderr),
        Err(message) => {
            write_stderr_line(&mut stderr, message);
            EXIT_USAGE
        }
    };
    if exit_code != EXIT_OK {
        std::process::exit(exit_code);
    }
}

/// Resolve the requested packages and the effective configuration.
fn prepare(cli: &Cli) -> Result<(Vec<PackageSpec>, FetchConfig), String> {
    let manifest = cli
        .manifest
        .as_deref()
        .map(BatchManifest::load)
        .transpose()
        .map_err(|e: ManifestError| e.to_string())?;
    let specs = cli
        .requested_specs(manifest.as_ref())
        .map_err(|e| e.to_string())?;
    if specs.is_empty() {
        return Err(
            "no packages requested; pass publisher.name@version[@platform] or --manifest FILE"
                .to_owned(),
        );
    }
    Ok((specs, cli.fetch_config(manifest.as_ref())))
}

fn run(
    cli: &Cli,
    specs: &[PackageSpec],
    config: &FetchConfig,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> i32 {
    if !cli.no_sweep {
        sweep_stale_files(config, stderr);
    }

    let entries = fetch_all(specs, config, stderr);
    report(cli, &entries, stdout, stderr);
    exit_code_for_entries(&entries)
}

fn sweep_stale_files(config: &FetchConfig, stderr: &mut dyn Write) {
    match sweep_residue(&config.dest_dir, DEFAULT_RESIDUE_AGE) {
        Ok(removed) if !removed.is_empty() && !config.quiet => {
            write_stderr_line(
                stderr,
                format!(
                    "Removed {} stale temporary file(s) from {}",
                    removed.len(),
                    config.dest_dir
                ),
            );
        }
        Ok(_) => {}
        Err(err) => warn!("could not sweep {}: {err}", config.dest_dir),
    }
}

fn report(cli: &Cli, entries: &[BatchEntry], stdout: &mut dyn Write, stderr: &mut dyn Write) {
    for entry in entries {
        if let Err(err) = &entry.result {
            write_stderr_line(stderr, format!("Failed to fetch {}: {err}", entry.spec));
        }
    }

    if cli.json {
        match json_report(entries) {
            Ok(json) => {
                if writeln!(stdout, "{json}").is_err() {
                    // Best-effort output; ignore write failures.
                }
            }
            Err(err) => write_stderr_line(stderr, format!("could not render JSON report: {err}")),
        }
    } else if !cli.quiet && entries.len() > 1 {
        write_stderr_line(stderr, summary_line(entries));
    }
}

fn exit_code_for_entries(entries: &[BatchEntry]) -> i32 {
    if entries.iter().all(|entry| entry.result.is_ok()) {
        EXIT_OK
    } else {
        EXIT_FAILED
    }
}
