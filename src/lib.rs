//! Marketplace extension downloader.
//!
//! This crate fetches extension packages from a marketplace package-download
//! endpoint and publishes each one as a well-formed `.vsix` (ZIP) archive. The
//! response body is streamed to a temporary file, unwrapped when a CDN added a
//! gzip layer, checked for ZIP structure, optionally rewritten through a fresh
//! ZIP writer, and published with an atomic rename. It backs the `vsix-fetch`
//! binary and can be driven programmatically with an injected transport.
//!
//! # Modules
//!
//! - [`artefact`] - Package specs, transport, naming, normalisation, repacking
//! - [`cli`] - Command-line argument definitions
//! - [`config`] - Fetch configuration and defaults
//! - [`error`] - Pipeline stages, failure kinds and the fetch error
//! - [`fetch`] - Single and batch download orchestration
//! - [`manifest`] - TOML batch manifests
//! - [`output`] - Progress lines and batch reports
//! - [`residue`] - Sweeping temporary files left by interrupted runs
//! - [`stager`] - Atomic publication through a staged sibling file

pub mod artefact;
pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;
pub mod manifest;
pub mod output;
pub mod residue;
pub mod stager;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
