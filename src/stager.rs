//! Atomic publication of finished archives.
//!
//! Output is written to a hidden sibling of the destination
//! (`.{file_name}.XXXXXX.part`), flushed to disk and then renamed onto the
//! destination in a single step. Readers of the destination therefore see
//! either the previous complete file or the new complete file. A staged file
//! that is never committed is removed when dropped.

use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, warn};
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Suffix of staged, not yet renamed output files.
pub const PART_SUFFIX: &str = ".part";

/// Errors arising while staging or publishing a file.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    /// The destination has no usable parent directory or file name.
    #[error("invalid destination path: {path}")]
    InvalidDestination {
        /// The rejected destination.
        path: Utf8PathBuf,
    },

    /// The temporary sibling could not be created.
    #[error("failed to create a temporary file next to {path}: {source}")]
    Create {
        /// The destination the file was created for.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Writing or flushing the temporary sibling failed.
    #[error("failed to write staged output for {path}: {source}")]
    Write {
        /// The destination the file was staged for.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The final rename failed.
    #[error("failed to move staged output onto {path}: {source}")]
    Rename {
        /// The destination of the rename.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// A fully written temporary file awaiting its rename.
#[derive(Debug)]
pub struct StagedFile {
    file: NamedTempFile,
    dest: Utf8PathBuf,
}

impl StagedFile {
    /// Path of the temporary file.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Destination the file will be renamed onto.
    #[must_use]
    pub fn dest(&self) -> &Utf8Path {
        &self.dest
    }

    /// Rename the staged file onto its destination.
    ///
    /// # Errors
    ///
    /// Returns [`StageError::Rename`] if the rename fails; the staged file is
    /// removed and the destination is left untouched.
    pub fn commit(self) -> Result<Utf8PathBuf, StageError> {
        let Self { file, dest } = self;
        if let Err(err) = file.persist(dest.as_std_path()) {
            discard_temp(err.file);
            return Err(StageError::Rename {
                path: dest,
                source: err.error,
            });
        }
        sync_parent_dir(&dest);
        debug!("published {dest}");
        Ok(dest)
    }

    /// Remove the staged file without publishing it.
    ///
    /// Removal failures are logged, never raised.
    pub fn discard(self) {
        discard_temp(self.file);
    }
}

/// Write `bytes` to a temporary sibling of `dest` and flush it to disk.
///
/// # Errors
///
/// Returns [`StageError`] if the sibling cannot be created or written. No
/// temporary file remains in that case.
pub fn stage(dest: &Utf8Path, bytes: &[u8]) -> Result<StagedFile, StageError> {
    let mut file = temp_sibling(dest, PART_SUFFIX)?;
    write_durably(file.as_file_mut(), bytes).map_err(|source| StageError::Write {
        path: dest.to_owned(),
        source,
    })?;
    Ok(StagedFile {
        file,
        dest: dest.to_owned(),
    })
}

/// Atomically replace `dest` with `bytes`.
///
/// # Errors
///
/// Returns [`StageError`] if staging or the rename fails.
///
/// # Examples
///
/// ```
/// use camino::Utf8PathBuf;
/// use vsix_fetch::stager::atomic_write;
///
/// let dir = tempfile::tempdir().expect("temp dir");
/// let dest = Utf8PathBuf::try_from(dir.path().join("out.vsix")).expect("utf-8 path");
/// atomic_write(&dest, b"PK\x05\x06").expect("published");
/// assert_eq!(std::fs::read(&dest).expect("read back"), b"PK\x05\x06");
/// ```
pub fn atomic_write(dest: &Utf8Path, bytes: &[u8]) -> Result<Utf8PathBuf, StageError> {
    stage(dest, bytes)?.commit()
}

/// Create a hidden, uniquely named temporary file next to `dest`.
///
/// The name has the form `.{file_name}.XXXXXX{suffix}`. The file is removed
/// when the returned handle is dropped.
///
/// # Errors
///
/// Returns [`StageError::InvalidDestination`] if `dest` has no file name and
/// [`StageError::Create`] if the file cannot be created.
pub fn temp_sibling(dest: &Utf8Path, suffix: &str) -> Result<NamedTempFile, StageError> {
    let Some(name) = dest.file_name() else {
        return Err(StageError::InvalidDestination {
            path: dest.to_owned(),
        });
    };
    let dir = match dest.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    tempfile::Builder::new()
        .prefix(&format!(".{name}."))
        .suffix(suffix)
        .tempfile_in(dir)
        .map_err(|source| StageError::Create {
            path: dest.to_owned(),
            source,
        })
}

fn write_durably(file: &mut File, bytes: &[u8]) -> io::Result<()> {
    file.write_all(bytes)?;
    file.flush()?;
    file.sync_all()
}

fn discard_temp(file: NamedTempFile) {
    let path = file.path().to_path_buf();
    if let Err(err) = file.close() {
        warn!("could not remove temporary file {}: {err}", path.display());
    }
}

/// Best-effort sync of the directory entry after a rename.
#[cfg(unix)]
fn sync_parent_dir(dest: &Utf8Path) {
    let Some(parent) = dest.parent().filter(|p| !p.as_str().is_empty()) else {
        return;
    };
    if let Err(err) = File::open(parent).and_then(|dir| dir.sync_all()) {
        debug!("could not sync directory {parent}: {err}");
    }
}

#[cfg(not(unix))]
fn sync_parent_dir(_dest: &Utf8Path) {}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use std::fs;
    use std::thread;
    use tempfile::TempDir;

    #[fixture]
    fn dir() -> TempDir {
        tempfile::tempdir().expect("temp dir")
    }

    fn utf8(dir: &TempDir, name: &str) -> Utf8PathBuf {
        Utf8PathBuf::try_from(dir.path().join(name)).expect("utf-8 temp path")
    }

    fn residue(dir: &TempDir) -> Vec<String> {
        fs::read_dir(dir.path())
            .expect("list dir")
            .filter_map(Result::ok)
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with('.'))
            .collect()
    }

    #[rstest]
    fn staged_file_is_hidden_sibling(dir: TempDir) {
        let dest = utf8(&dir, "pkg.vsix");
        let staged = stage(&dest, b"content").expect("staged");
        let name = staged
            .path()
            .file_name()
            .and_then(|n| n.to_str())
            .expect("utf-8 name")
            .to_owned();
        assert!(name.starts_with(".pkg.vsix."), "got {name}");
        assert!(name.ends_with(PART_SUFFIX), "got {name}");
        assert_eq!(staged.path().parent(), Some(dir.path()));
        assert!(!dest.exists());
        staged.discard();
        assert!(residue(&dir).is_empty());
    }

    #[rstest]
    fn commit_publishes_content(dir: TempDir) {
        let dest = utf8(&dir, "pkg.vsix");
        let published = atomic_write(&dest, b"new content").expect("published");
        assert_eq!(published, dest);
        assert_eq!(fs::read(&dest).expect("read"), b"new content");
        assert!(residue(&dir).is_empty());
    }

    #[rstest]
    fn interruption_before_rename_keeps_previous_artifact(dir: TempDir) {
        let dest = utf8(&dir, "pkg.vsix");
        fs::write(&dest, b"previous complete artifact").expect("seed");

        let staged = stage(&dest, b"replacement").expect("staged");
        assert!(staged.path().exists());
        drop(staged);

        assert_eq!(
            fs::read(&dest).expect("read"),
            b"previous complete artifact"
        );
        assert!(residue(&dir).is_empty());
    }

    #[rstest]
    fn failed_rename_leaves_destination_untouched(dir: TempDir) {
        // A non-empty directory cannot be replaced by a file rename.
        let dest = utf8(&dir, "pkg.vsix");
        fs::create_dir(&dest).expect("blocking dir");
        fs::write(dest.join("keep"), b"x").expect("blocking file");

        let staged = stage(&dest, b"bytes").expect("staged");
        let err = staged.commit().expect_err("rename onto a directory");
        assert!(matches!(err, StageError::Rename { .. }));
        assert!(dest.join("keep").exists());
        assert!(residue(&dir).is_empty());
    }

    #[rstest]
    fn missing_directory_is_a_create_error(dir: TempDir) {
        let dest = utf8(&dir, "missing/pkg.vsix");
        assert!(matches!(
            stage(&dest, b"bytes"),
            Err(StageError::Create { .. })
        ));
    }

    #[test]
    fn destination_without_file_name_is_rejected() {
        assert!(matches!(
            temp_sibling(Utf8Path::new("/"), PART_SUFFIX),
            Err(StageError::InvalidDestination { .. })
        ));
    }

    #[rstest]
    fn concurrent_writers_to_one_name_never_mix(dir: TempDir) {
        let dest = utf8(&dir, "shared.vsix");
        let payloads: Vec<Vec<u8>> = (0u8..8).map(|i| vec![i; 4096]).collect();

        thread::scope(|scope| {
            for payload in &payloads {
                let dest = &dest;
                scope.spawn(move || atomic_write(dest, payload).expect("published"));
            }
        });

        let content = fs::read(&dest).expect("read");
        assert!(payloads.contains(&content));
        assert!(residue(&dir).is_empty());
    }
}
