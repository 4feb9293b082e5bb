//! TOML batch manifests listing extensions to fetch.
//!
//! ```toml
//! dest_dir = "vscode_exts"
//! repack = true
//!
//! [[extension]]
//! id = "ms-vscode.cpptools"
//! version = "1.30.0"
//! target_platform = "linux-x64"
//! ```
//!
//! Top-level settings are optional and only override [`FetchConfig`] values
//! that the command line leaves unset.

use crate::artefact::spec::{PackageSpec, SpecError};
use crate::config::{FetchConfig, RepackFailurePolicy};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use std::fs;

/// Errors arising from loading a manifest.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    /// The manifest file could not be read.
    #[error("failed to read manifest {path}: {source}")]
    Read {
        /// The manifest path.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The manifest is not valid TOML or has unknown keys.
    #[error("invalid manifest {path}: {reason}")]
    Parse {
        /// The manifest path.
        path: Utf8PathBuf,
        /// Description of the parse error.
        reason: String,
    },

    /// An `[[extension]]` entry does not form a valid package spec.
    #[error("extension entry {index} is invalid: {source}")]
    InvalidEntry {
        /// One-based position of the entry.
        index: usize,
        /// The validation failure.
        #[source]
        source: SpecError,
    },
}

/// One `[[extension]]` table.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ManifestEntry {
    /// `publisher.name` identifier.
    pub id: String,
    /// Requested version.
    pub version: String,
    /// Optional target platform.
    #[serde(default)]
    pub target_platform: Option<String>,
}

/// A parsed batch manifest.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct BatchManifest {
    /// Destination directory, relative to the working directory.
    pub dest_dir: Option<Utf8PathBuf>,
    /// Whether to repack archives.
    pub repack: Option<bool>,
    /// Behaviour when repacking fails.
    pub repack_failure: Option<RepackFailurePolicy>,
    /// Marketplace base URL.
    pub marketplace: Option<String>,
    /// Batch concurrency.
    pub jobs: Option<usize>,
    /// Extensions to fetch, in order.
    #[serde(rename = "extension")]
    pub extensions: Vec<ManifestEntry>,
}

impl BatchManifest {
    /// Read and parse the manifest at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Read`] or [`ManifestError::Parse`].
    pub fn load(path: &Utf8Path) -> Result<Self, ManifestError> {
        let text = fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.to_owned(),
            source,
        })?;
        Self::parse(&text).map_err(|e| ManifestError::Parse {
            path: path.to_owned(),
            reason: e.to_string(),
        })
    }

    /// Parse manifest text.
    ///
    /// # Errors
    ///
    /// Returns the TOML error for malformed input or unknown keys.
    ///
    /// # Examples
    ///
    /// ```
    /// use vsix_fetch::manifest::BatchManifest;
    ///
    /// let manifest = BatchManifest::parse(r#"
    ///     [[extension]]
    ///     id = "pub.ext"
    ///     version = "9.9.9"
    /// "#).expect("valid manifest");
    /// let specs = manifest.specs().expect("valid specs");
    /// assert_eq!(specs.len(), 1);
    /// ```
    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Validate the extension entries into package specs, in order.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::InvalidEntry`] for the first invalid entry.
    pub fn specs(&self) -> Result<Vec<PackageSpec>, ManifestError> {
        self.extensions
            .iter()
            .enumerate()
            .map(|(position, entry)| {
                PackageSpec::new(&entry.id, &entry.version, entry.target_platform.as_deref())
                    .map_err(|source| ManifestError::InvalidEntry {
                        index: position + 1,
                        source,
                    })
            })
            .collect()
    }

    /// Apply the manifest's settings on top of `config`.
    #[must_use]
    pub fn apply_to(&self, mut config: FetchConfig) -> FetchConfig {
        if let Some(dest_dir) = &self.dest_dir {
            config.dest_dir = dest_dir.clone();
        }
        if let Some(repack) = self.repack {
            config.repack = repack;
        }
        if let Some(policy) = self.repack_failure {
            config.repack_failure = policy;
        }
        if let Some(base) = &self.marketplace {
            config.marketplace_base = base.clone();
        }
        if let Some(jobs) = self.jobs {
            config = config.with_jobs(jobs);
        }
        config
    }
}
