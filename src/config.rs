//! Runtime configuration for the fetch pipeline.
//!
//! [`FetchConfig`] carries every setting the orchestrator consults. Defaults
//! publish into the current directory with repacking enabled, and repack
//! failures are fatal.

use crate::artefact::download::DEFAULT_TIMEOUT;
use crate::artefact::marketplace::{DEFAULT_MARKETPLACE_BASE, DEFAULT_USER_AGENT};
use camino::Utf8PathBuf;
use serde::Deserialize;
use std::num::NonZeroUsize;
use std::time::Duration;

/// Default upper bound on downloaded and decompressed payload sizes.
pub const DEFAULT_MAX_PAYLOAD_BYTES: u64 = 512 * 1024 * 1024;

/// What to do when an archive cannot be repacked.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum RepackFailurePolicy {
    /// Abort the download with a corrupt-entry failure.
    #[default]
    Fatal,
    /// Log a warning and publish the normalised archive as received.
    PublishNormalised,
}

/// Settings for one or more downloads.
///
/// # Examples
///
/// ```
/// use vsix_fetch::config::{FetchConfig, RepackFailurePolicy};
///
/// let config = FetchConfig::default().with_repack(false).with_jobs(4);
/// assert!(!config.repack);
/// assert_eq!(config.jobs.get(), 4);
/// assert_eq!(config.repack_failure, RepackFailurePolicy::Fatal);
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FetchConfig {
    /// Directory receiving published archives; created when missing.
    pub dest_dir: Utf8PathBuf,
    /// Rewrite each archive through a fresh ZIP writer before publishing.
    pub repack: bool,
    /// Behaviour when repacking fails.
    pub repack_failure: RepackFailurePolicy,
    /// Largest accepted body, and largest accepted decompressed payload.
    pub max_payload_bytes: u64,
    /// Global timeout for each request.
    pub timeout: Duration,
    /// `User-Agent` header value.
    pub user_agent: String,
    /// Base URL of the marketplace gallery API.
    pub marketplace_base: String,
    /// Suppress progress output.
    pub quiet: bool,
    /// Number of downloads a batch runs at once.
    pub jobs: NonZeroUsize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            dest_dir: Utf8PathBuf::from("."),
            repack: true,
            repack_failure: RepackFailurePolicy::default(),
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            marketplace_base: DEFAULT_MARKETPLACE_BASE.to_owned(),
            quiet: false,
            jobs: NonZeroUsize::MIN,
        }
    }
}

impl FetchConfig {
    /// Set the destination directory.
    #[must_use]
    pub fn with_dest_dir(mut self, dest_dir: impl Into<Utf8PathBuf>) -> Self {
        self.dest_dir = dest_dir.into();
        self
    }

    /// Enable or disable repacking.
    #[must_use]
    pub fn with_repack(mut self, repack: bool) -> Self {
        self.repack = repack;
        self
    }

    /// Set the repack failure policy.
    #[must_use]
    pub fn with_repack_failure(mut self, policy: RepackFailurePolicy) -> Self {
        self.repack_failure = policy;
        self
    }

    /// Set the payload size limit.
    #[must_use]
    pub fn with_max_payload_bytes(mut self, limit: u64) -> Self {
        self.max_payload_bytes = limit;
        self
    }

    /// Set the marketplace base URL.
    #[must_use]
    pub fn with_marketplace_base(mut self, base: impl Into<String>) -> Self {
        self.marketplace_base = base.into();
        self
    }

    /// Suppress or enable progress output.
    #[must_use]
    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Set the batch concurrency; zero is treated as one.
    #[must_use]
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = NonZeroUsize::new(jobs).unwrap_or(NonZeroUsize::MIN);
        self
    }
}
