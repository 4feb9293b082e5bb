//! CLI argument definitions for `vsix-fetch`.
//!
//! Kept apart from the entrypoint so that argument parsing and the mapping
//! onto [`FetchConfig`] can be tested without running downloads.

use crate::artefact::spec::PackageSpec;
use crate::config::{FetchConfig, RepackFailurePolicy};
use crate::manifest::{BatchManifest, ManifestError};
use camino::Utf8PathBuf;
use clap::Parser;
use std::time::Duration;

/// Fetch marketplace extension packages as well-formed VSIX archives.
#[derive(Parser, Debug, Default)]
#[command(name = "vsix-fetch")]
#[command(version, about)]
#[command(long_about = concat!(
    "Fetch marketplace extension packages as well-formed VSIX archives.\n\n",
    "Each package is streamed to a temporary file, unwrapped when a CDN added a ",
    "gzip layer, checked for ZIP structure, rewritten through a fresh ZIP writer ",
    "and published with an atomic rename. A failed download never leaves a ",
    "partial archive behind.",
))]
#[command(after_help = concat!(
    "EXAMPLES:\n",
    "  Fetch one universal package:\n",
    "    $ vsix-fetch rust-lang.rust-analyzer@0.3.2700\n\n",
    "  Fetch a platform-specific build into a directory:\n",
    "    $ vsix-fetch -d vscode_exts ms-vscode.cpptools@1.30.0@linux-x64\n\n",
    "  Fetch everything listed in a manifest, four at a time:\n",
    "    $ vsix-fetch --manifest extensions.toml --jobs 4\n\n",
    "EXIT STATUS:\n",
    "  0  every package was published\n",
    "  1  at least one package failed\n",
    "  2  invalid arguments or manifest",
))]
pub struct Cli {
    /// Packages to fetch, as publisher.name@version[@platform].
    #[arg(value_name = "SPEC")]
    pub specs: Vec<PackageSpec>,

    /// TOML manifest listing packages and settings.
    #[arg(short, long, value_name = "FILE")]
    pub manifest: Option<Utf8PathBuf>,

    /// Destination directory [default: current directory].
    #[arg(short, long, value_name = "DIR")]
    pub dest: Option<Utf8PathBuf>,

    /// Publish archives as received instead of rewriting them.
    #[arg(long)]
    pub no_repack: bool,

    /// Publish the received archive when repacking fails.
    #[arg(long, conflicts_with = "no_repack")]
    pub publish_unrepacked: bool,

    /// Marketplace gallery API base URL.
    #[arg(long, value_name = "URL")]
    pub marketplace: Option<String>,

    /// Number of packages fetched at once.
    #[arg(short, long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Request timeout in seconds.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Print the batch outcome as JSON on stdout.
    #[arg(long)]
    pub json: bool,

    /// Suppress progress output (errors still shown).
    #[arg(short, long)]
    pub quiet: bool,

    /// Do not remove stale temporary files before fetching.
    #[arg(long)]
    pub no_sweep: bool,
}

impl Cli {
    /// Build the fetch configuration: defaults, then the manifest, then
    /// command-line flags.
    ///
    /// # Examples
    ///
    /// ```
    /// use clap::Parser;
    /// use vsix_fetch::cli::Cli;
    ///
    /// let cli = Cli::parse_from(["vsix-fetch", "--no-repack", "-j", "2", "pub.ext@1.0.0"]);
    /// let config = cli.fetch_config(None);
    /// assert!(!config.repack);
    /// assert_eq!(config.jobs.get(), 2);
    /// ```
    #[must_use]
    pub fn fetch_config(&self, manifest: Option<&BatchManifest>) -> FetchConfig {
        let mut config = FetchConfig::default();
        if let Some(manifest) = manifest {
            config = manifest.apply_to(config);
        }
        if let Some(dest) = &self.dest {
            config.dest_dir = dest.clone();
        }
        if self.no_repack {
            config.repack = false;
        }
        if self.publish_unrepacked {
            config.repack_failure = RepackFailurePolicy::PublishNormalised;
        }
        if let Some(base) = &self.marketplace {
            config.marketplace_base = base.clone();
        }
        if let Some(jobs) = self.jobs {
            config = config.with_jobs(jobs);
        }
        if let Some(secs) = self.timeout {
            config.timeout = Duration::from_secs(secs);
        }
        config.quiet = self.quiet;
        config
    }

    /// Return the manifest's packages followed by those given as arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::InvalidEntry`] for an invalid manifest entry.
    pub fn requested_specs(
        &self,
        manifest: Option<&BatchManifest>,
    ) -> Result<Vec<PackageSpec>, ManifestError> {
        let mut specs = match manifest {
            Some(manifest) => manifest.specs()?,
            None => Vec::new(),
        };
        specs.extend(self.specs.iter().cloned());
        Ok(specs)
    }
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
