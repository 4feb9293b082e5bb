//! Payload normalisation into a structurally valid ZIP container.
//!
//! Marketplace responses are supposed to be VSIX (ZIP) archives, but a CDN
//! may wrap them in an extra gzip layer despite an identity-encoding request,
//! or answer with an HTML error page. This module unwraps the former and
//! classifies the latter. Validation is structural only: the bytes must
//! start with a local-file-header signature or carry an
//! end-of-central-directory record within the trailing window.

use flate2::read::MultiGzDecoder;
use log::debug;
use std::fs;
use std::io::Read;
use std::path::Path;

/// Leading bytes of every gzip member.
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// ZIP local file header signature.
const LOCAL_FILE_HEADER: [u8; 4] = *b"PK\x03\x04";

/// ZIP end-of-central-directory signature.
const END_OF_CENTRAL_DIRECTORY: [u8; 4] = *b"PK\x05\x06";

/// Fixed EOCD record size plus the largest possible archive comment.
const EOCD_WINDOW: usize = 22 + u16::MAX as usize;

/// Bytes inspected when deciding whether a payload looks like text.
const TEXT_SNIFF_LEN: usize = 512;

/// Bytes quoted in a [`NormaliseError::NotAnArchive`] message.
const PREVIEW_LEN: usize = 64;

/// Errors arising from payload normalisation.
#[derive(Debug, thiserror::Error)]
pub enum NormaliseError {
    /// Zero bytes were received (or a gzip layer decoded to nothing).
    #[error("empty payload")]
    EmptyPayload,

    /// Gzip framing was detected but could not be decoded.
    #[error("gzip-framed payload could not be decoded: {reason}")]
    GzipDecode {
        /// Description of the decoder failure.
        reason: String,
    },

    /// No ZIP signature was found.
    #[error("{}", not_an_archive_message(.text_like, .preview))]
    NotAnArchive {
        /// True when the payload looks like text, most likely an HTML error
        /// page returned for a wrong version or platform.
        text_like: bool,
        /// Escaped leading bytes of the payload.
        preview: String,
    },

    /// The downloaded payload could not be read back from disk.
    #[error("failed to read downloaded payload: {0}")]
    Io(#[from] std::io::Error),
}

fn not_an_archive_message(text_like: &bool, preview: &str) -> String {
    if *text_like {
        format!(
            concat!(
                "payload is not a ZIP/VSIX archive but a text response, usually an ",
                "HTML error page (wrong version or target platform?); first bytes: \"{}\""
            ),
            preview
        )
    } else {
        format!("payload is not a ZIP/VSIX archive (no ZIP signature found); first bytes: \"{preview}\"")
    }
}

/// Bytes verified to carry ZIP structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalisedArchive {
    bytes: Vec<u8>,
    was_gzipped: bool,
}

impl NormalisedArchive {
    /// Return the archive bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume the wrapper and return the archive bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Return true when an outer gzip layer was removed.
    #[must_use]
    pub fn was_gzipped(&self) -> bool {
        self.was_gzipped
    }
}

/// Normalise an in-memory payload.
///
/// `max_len` caps the size of a decompressed gzip layer.
///
/// # Errors
///
/// Returns [`NormaliseError::EmptyPayload`] for empty input,
/// [`NormaliseError::GzipDecode`] when gzip framing cannot be decoded
/// within `max_len` bytes, and [`NormaliseError::NotAnArchive`] when no ZIP
/// signature is present.
///
/// # Examples
///
/// ```
/// use vsix_fetch::artefact::normalisation::{NormaliseError, normalise};
///
/// let err = normalise(b"<html>404</html>".to_vec(), 1024).expect_err("not a zip");
/// assert!(matches!(err, NormaliseError::NotAnArchive { text_like: true, .. }));
/// ```
pub fn normalise(payload: Vec<u8>, max_len: u64) -> Result<NormalisedArchive, NormaliseError> {
    if payload.is_empty() {
        return Err(NormaliseError::EmptyPayload);
    }

    let was_gzipped = payload.starts_with(&GZIP_MAGIC);
    let bytes = if was_gzipped {
        debug!("payload carries gzip framing; decompressing");
        let decoded = gunzip(&payload, max_len)?;
        if decoded.is_empty() {
            return Err(NormaliseError::EmptyPayload);
        }
        decoded
    } else {
        payload
    };

    if !has_zip_signature(&bytes) {
        let head = bytes.get(..PREVIEW_LEN).unwrap_or(&bytes);
        return Err(NormaliseError::NotAnArchive {
            text_like: looks_like_text(&bytes),
            preview: head.escape_ascii().to_string(),
        });
    }

    Ok(NormalisedArchive { bytes, was_gzipped })
}

/// Normalise the payload stored at `path`.
///
/// # Errors
///
/// As for [`normalise`], plus [`NormaliseError::Io`] when the file cannot be
/// read.
pub fn normalise_file(path: &Path, max_len: u64) -> Result<NormalisedArchive, NormaliseError> {
    normalise(fs::read(path)?, max_len)
}

/// Decompress every gzip member in `payload`, reading at most `max_len`
/// decoded bytes.
fn gunzip(payload: &[u8], max_len: u64) -> Result<Vec<u8>, NormaliseError> {
    let mut decoded = Vec::new();
    MultiGzDecoder::new(payload)
        .take(max_len.saturating_add(1))
        .read_to_end(&mut decoded)
        .map_err(|e| NormaliseError::GzipDecode {
            reason: e.to_string(),
        })?;
    if u64::try_from(decoded.len()).unwrap_or(u64::MAX) > max_len {
        return Err(NormaliseError::GzipDecode {
            reason: format!("decompressed size exceeds the {max_len}-byte limit"),
        });
    }
    Ok(decoded)
}

/// Return true when `bytes` starts with a local file header or carries an
/// end-of-central-directory record in its trailing window.
#[must_use]
pub fn has_zip_signature(bytes: &[u8]) -> bool {
    if bytes.starts_with(&LOCAL_FILE_HEADER) {
        return true;
    }
    let tail_start = bytes.len().saturating_sub(EOCD_WINDOW);
    bytes
        .get(tail_start..)
        .is_some_and(|tail| tail.windows(4).any(|w| w == END_OF_CENTRAL_DIRECTORY))
}

/// Heuristic for text responses such as HTML error pages.
fn looks_like_text(bytes: &[u8]) -> bool {
    let sniff = bytes.get(..TEXT_SNIFF_LEN).unwrap_or(bytes);
    if sniff.trim_ascii_start().starts_with(b"<") {
        return true;
    }
    let text = match std::str::from_utf8(sniff) {
        Ok(text) => text,
        // A multi-byte character cut off by the sniff window is still text.
        Err(e) if e.error_len().is_none() => sniff
            .get(..e.valid_up_to())
            .and_then(|valid| std::str::from_utf8(valid).ok())
            .unwrap_or_default(),
        Err(_) => return false,
    };
    !text.is_empty()
        && text
            .chars()
            .all(|c| !c.is_control() || matches!(c, '\n' | '\r' | '\t'))
}
