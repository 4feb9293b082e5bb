//! Rewriting a normalised archive into a fresh ZIP container.
//!
//! Some installers reject archives carrying unusual extra fields, odd
//! central-directory offsets or trailing bytes after the end record. Passing
//! every entry through a conformant writer removes those quirks while keeping
//! entry order, names, contents, timestamps and permission bits.

use log::trace;
use std::io::{self, Cursor, Read};
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Errors arising from repacking.
#[derive(Debug, thiserror::Error)]
pub enum RepackError {
    /// The central directory could not be parsed.
    #[error("archive structure is unreadable: {0}")]
    UnreadableArchive(#[source] ZipError),

    /// An entry could not be read (bad header, data or checksum).
    #[error("entry {index} ({name}) could not be read: {reason}")]
    CorruptEntry {
        /// Position of the entry in the central directory.
        index: usize,
        /// Entry name, when it could be read.
        name: String,
        /// Description of the failure.
        reason: String,
    },

    /// Decompressed entries exceed the payload limit.
    #[error("decompressed entries exceed the {limit}-byte payload limit")]
    TooLarge {
        /// The configured limit.
        limit: u64,
    },

    /// The new container could not be written.
    #[error("failed to write repacked archive: {0}")]
    Write(#[source] ZipError),
}

/// Rewrite `archive` entry by entry into a new ZIP container.
///
/// Stored entries stay stored; every other method is re-deflated.
/// `max_len` bounds the total decompressed size of all entries.
///
/// # Errors
///
/// Returns [`RepackError::UnreadableArchive`] when the archive cannot be
/// opened, [`RepackError::CorruptEntry`] for any unreadable entry,
/// [`RepackError::TooLarge`] when entries decompress beyond `max_len`, and
/// [`RepackError::Write`] if the writer fails.
pub fn repack(archive: &[u8], max_len: u64) -> Result<Vec<u8>, RepackError> {
    let mut reader =
        ZipArchive::new(Cursor::new(archive)).map_err(RepackError::UnreadableArchive)?;
    let mut writer = ZipWriter::new(Cursor::new(Vec::with_capacity(archive.len())));
    let mut budget = max_len;

    for index in 0..reader.len() {
        let mut entry = reader.by_index(index).map_err(|e| RepackError::CorruptEntry {
            index,
            name: String::from("<unknown>"),
            reason: e.to_string(),
        })?;
        let name = entry.name().to_owned();

        let method = match entry.compression() {
            CompressionMethod::Stored => CompressionMethod::Stored,
            _ => CompressionMethod::Deflated,
        };
        let mut options = SimpleFileOptions::default()
            .compression_method(method)
            .large_file(entry.size() >= u64::from(u32::MAX));
        if let Some(modified) = entry.last_modified() {
            options = options.last_modified_time(modified);
        }
        if let Some(mode) = entry.unix_mode() {
            options = options.unix_permissions(mode);
        }

        if entry.is_dir() {
            trace!("repack: directory {name}");
            writer
                .add_directory(name.as_str(), options)
                .map_err(RepackError::Write)?;
            continue;
        }

        if entry.size() > budget {
            return Err(RepackError::TooLarge { limit: max_len });
        }
        trace!("repack: file {name} ({} bytes)", entry.size());
        writer
            .start_file(name.as_str(), options)
            .map_err(RepackError::Write)?;
        let copied = io::copy(&mut (&mut entry).take(budget.saturating_add(1)), &mut writer)
            .map_err(|e| RepackError::CorruptEntry {
                index,
                name: name.clone(),
                reason: e.to_string(),
            })?;
        budget = budget
            .checked_sub(copied)
            .ok_or(RepackError::TooLarge { limit: max_len })?;
    }

    let cursor = writer.finish().map_err(RepackError::Write)?;
    Ok(cursor.into_inner())
}
