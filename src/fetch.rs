//! Download orchestration: request, stream, normalise, repack and publish.
//!
//! Each package runs through a strict pipeline. The body is streamed into a
//! hidden `.download` sibling of the final artifact, normalised into a ZIP
//! container, optionally repacked, and published through an atomic rename.
//! Temporary files are owned by guards, so every exit path removes them and
//! the final path only ever holds a complete archive.

use camino::Utf8PathBuf;
use log::{debug, warn};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::panic;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use crate::artefact::download::{HttpTransport, PackageResponse, PackageTransport, TransportError};
use crate::artefact::marketplace::DownloadRequest;
use crate::artefact::naming::resolve_filename;
use crate::artefact::normalisation::{NormalisedArchive, normalise_file};
use crate::artefact::repack::repack;
use crate::artefact::spec::PackageSpec;
use crate::config::{FetchConfig, RepackFailurePolicy};
use crate::error::{FetchError, FetchFailure, FetchStage};
use crate::output::{success_line, write_stderr_line};
use crate::stager::{atomic_write, temp_sibling};

/// Suffix of raw payload files streamed from the network.
pub const DOWNLOAD_SUFFIX: &str = ".download";

/// Size of the buffer used to copy response bodies.
const STREAM_BUFFER_LEN: usize = 64 * 1024;

/// A published archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchOutcome {
    /// The requested package.
    pub spec: PackageSpec,
    /// Path of the published archive.
    pub path: Utf8PathBuf,
    /// Size of the published archive in bytes.
    pub bytes: u64,
    /// Lowercase hex SHA-256 of the published archive.
    pub sha256: String,
    /// True when an outer gzip layer was removed.
    pub was_gzipped: bool,
    /// True when the archive was rewritten by the repacker.
    pub repacked: bool,
}

/// The outcome of one package in a batch.
#[derive(Debug)]
pub struct BatchEntry {
    /// The requested package.
    pub spec: PackageSpec,
    /// The published archive, or why the download failed.
    pub result: Result<FetchOutcome, FetchError>,
}

/// Fetch one package over HTTP and publish it into the destination directory.
///
/// # Errors
///
/// Returns a [`FetchError`] naming the request URL and the failed stage.
pub fn fetch_package(
    spec: &PackageSpec,
    config: &FetchConfig,
    stderr: &mut dyn Write,
) -> Result<FetchOutcome, FetchError> {
    let transport = HttpTransport::new(config.timeout);
    fetch_package_with(spec, config, &transport, stderr)
}

/// Testable inner function with an injected transport.
///
/// The production entry point [`fetch_package`] delegates here with the
/// `ureq` transport; tests inject stubs.
///
/// # Errors
///
/// Returns a [`FetchError`] naming the request URL and the failed stage.
pub fn fetch_package_with(
    spec: &PackageSpec,
    config: &FetchConfig,
    transport: &dyn PackageTransport,
    stderr: &mut dyn Write,
) -> Result<FetchOutcome, FetchError> {
    let request = DownloadRequest::for_spec(spec, &config.marketplace_base, &config.user_agent);
    let url = request.url.clone();
    let at = |stage: FetchStage| {
        let url = url.clone();
        move |failure: FetchFailure| FetchError::new(url, stage, failure)
    };

    if !config.quiet {
        write_stderr_line(stderr, format!("Downloading {spec}..."));
    }
    debug!("requesting {url}");
    let response = transport
        .open(&request)
        .map_err(FetchFailure::from)
        .map_err(at(FetchStage::Requesting))?;

    let file_name = resolve_filename(response.content_disposition.as_deref(), spec);
    let final_path = config.dest_dir.join(&file_name);
    let content_encoding = response.content_encoding.clone();

    fs::create_dir_all(&config.dest_dir)
        .map_err(|source| FetchFailure::Io {
            context: format!("failed to create destination directory {}", config.dest_dir),
            source,
        })
        .map_err(at(FetchStage::Streaming))?;
    let mut download = temp_sibling(&final_path, DOWNLOAD_SUFFIX)
        .map_err(FetchFailure::from)
        .map_err(at(FetchStage::Streaming))?;
    let received = stream_body(response, download.as_file_mut(), &url, config.max_payload_bytes)
        .map_err(at(FetchStage::Streaming))?;
    debug!("received {received} bytes from {url}");

    let normalised = normalise_file(download.path(), config.max_payload_bytes)
        .map_err(FetchFailure::from)
        .map_err(at(FetchStage::Normalising))?;
    if let Err(err) = download.close() {
        warn!("could not remove download file for {file_name}: {err}");
    }
    let was_gzipped = normalised.was_gzipped();
    if was_gzipped {
        debug!("removed an outer gzip layer from {url}");
    } else if content_encoding
        .as_deref()
        .is_some_and(|encoding| encoding.trim().eq_ignore_ascii_case("gzip"))
    {
        debug!("{url} declared gzip content encoding but the body was already decoded");
    }

    let (bytes, repacked) = repack_stage(normalised, config, stderr)
        .map_err(at(FetchStage::Repacking))?;

    let sha256 = hex_digest(&bytes);
    let path = atomic_write(&final_path, &bytes)
        .map_err(FetchFailure::from)
        .map_err(at(FetchStage::Publishing))?;

    let outcome = FetchOutcome {
        spec: spec.clone(),
        path,
        bytes: u64::try_from(bytes.len()).unwrap_or(u64::MAX),
        sha256,
        was_gzipped,
        repacked,
    };
    if !config.quiet {
        write_stderr_line(stderr, success_line(&outcome));
    }
    Ok(outcome)
}

/// Fetch every package over HTTP; see [`fetch_all_with`].
#[must_use]
pub fn fetch_all(
    specs: &[PackageSpec],
    config: &FetchConfig,
    stderr: &mut dyn Write,
) -> Vec<BatchEntry> {
    let transport = HttpTransport::new(config.timeout);
    fetch_all_with(specs, config, &transport, stderr)
}

/// Fetch every package, isolating failures, and return outcomes in input
/// order.
///
/// Up to `config.jobs` packages run at once. Progress for concurrent
/// downloads is buffered per package and written in input order.
#[must_use]
pub fn fetch_all_with(
    specs: &[PackageSpec],
    config: &FetchConfig,
    transport: &(dyn PackageTransport + Sync),
    stderr: &mut dyn Write,
) -> Vec<BatchEntry> {
    let workers = config.jobs.get().min(specs.len());
    if workers <= 1 {
        return specs
            .iter()
            .map(|spec| BatchEntry {
                spec: spec.clone(),
                result: fetch_package_with(spec, config, transport, stderr),
            })
            .collect();
    }

    let next = AtomicUsize::new(0);
    let mut finished: Vec<(usize, BatchEntry, Vec<u8>)> = thread::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .map(|_| scope.spawn(|| run_worker(specs, config, transport, &next)))
            .collect();
        handles
            .into_iter()
            .flat_map(|handle| match handle.join() {
                Ok(done) => done,
                Err(payload) => panic::resume_unwind(payload),
            })
            .collect()
    });
    finished.sort_by_key(|(index, _, _)| *index);

    finished
        .into_iter()
        .map(|(_, entry, progress)| {
            if stderr.write_all(&progress).is_err() {
                // Best-effort progress output; ignore write failures.
            }
            entry
        })
        .collect()
}

fn run_worker(
    specs: &[PackageSpec],
    config: &FetchConfig,
    transport: &(dyn PackageTransport + Sync),
    next: &AtomicUsize,
) -> Vec<(usize, BatchEntry, Vec<u8>)> {
    let mut done = Vec::new();
    loop {
        let index = next.fetch_add(1, Ordering::Relaxed);
        let Some(spec) = specs.get(index) else {
            return done;
        };
        let mut progress = Vec::new();
        let result = fetch_package_with(spec, config, transport, &mut progress);
        done.push((
            index,
            BatchEntry {
                spec: spec.clone(),
                result,
            },
            progress,
        ));
    }
}

/// Copy the response body into `file`, enforcing `limit` and any declared
/// `Content-Length`.
fn stream_body(
    response: PackageResponse,
    file: &mut File,
    url: &str,
    limit: u64,
) -> Result<u64, FetchFailure> {
    let PackageResponse {
        content_length,
        content_encoding,
        mut body,
        ..
    } = response;
    let too_large = || TransportError::TooLarge {
        url: url.to_owned(),
        limit,
    };
    if content_length.is_some_and(|declared| declared > limit) {
        return Err(too_large().into());
    }

    let mut buffer = vec![0_u8; STREAM_BUFFER_LEN];
    let mut received: u64 = 0;
    loop {
        let read = match body.read(&mut buffer) {
            Ok(0) => break,
            Ok(read) => read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(source) => {
                return Err(TransportError::Interrupted {
                    url: url.to_owned(),
                    source,
                }
                .into());
            }
        };
        received = received.saturating_add(u64::try_from(read).unwrap_or(u64::MAX));
        if received > limit {
            return Err(too_large().into());
        }
        let chunk = buffer.get(..read).unwrap_or_default();
        file.write_all(chunk).map_err(|source| FetchFailure::Io {
            context: "failed to write download file".to_owned(),
            source,
        })?;
    }
    file.flush().map_err(|source| FetchFailure::Io {
        context: "failed to flush download file".to_owned(),
        source,
    })?;

    // A decoded body no longer matches the length of the encoded one.
    let identity = content_encoding
        .as_deref()
        .is_none_or(|encoding| encoding.trim().eq_ignore_ascii_case("identity"));
    if let Some(expected) = content_length.filter(|&expected| identity && received < expected) {
        return Err(TransportError::Truncated {
            url: url.to_owned(),
            expected,
            received,
        }
        .into());
    }
    Ok(received)
}

/// Repack `archive` when configured, applying the failure policy.
///
/// Returns the bytes to publish and whether they were repacked.
fn repack_stage(
    archive: NormalisedArchive,
    config: &FetchConfig,
    stderr: &mut dyn Write,
) -> Result<(Vec<u8>, bool), FetchFailure> {
    if !config.repack {
        return Ok((archive.into_bytes(), false));
    }
    match repack(archive.bytes(), config.max_payload_bytes) {
        Ok(bytes) => Ok((bytes, true)),
        Err(err) => match config.repack_failure {
            RepackFailurePolicy::Fatal => Err(err.into()),
            RepackFailurePolicy::PublishNormalised => {
                warn!("repack failed; publishing the archive as received: {err}");
                if !config.quiet {
                    write_stderr_line(
                        stderr,
                        format!("Warning: repack failed ({err}); publishing the archive as received."),
                    );
                }
                Ok((archive.into_bytes(), false))
            }
        },
    }
}

fn hex_digest(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

#[cfg(test)]
#[path = "fetch_tests.rs"]
mod tests;
