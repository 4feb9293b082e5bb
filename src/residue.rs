//! Removal of temporary files left behind by interrupted runs.
//!
//! An interrupted download can leave hidden `.{name}.XXXXXX.download` or
//! `.{name}.XXXXXX.part` files next to the published archives. They never
//! shadow a real artifact, so sweeping them is housekeeping only. Files
//! younger than the age threshold may belong to a run still in progress and
//! are left alone.

use crate::fetch::DOWNLOAD_SUFFIX;
use crate::stager::PART_SUFFIX;
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, warn};
use std::fs;
use std::io;
use std::time::{Duration, SystemTime};

/// Default minimum age of a temporary file before it is swept.
pub const DEFAULT_RESIDUE_AGE: Duration = Duration::from_secs(60 * 60);

/// Return true when `file_name` matches the temporary naming scheme.
#[must_use]
pub fn is_residue_name(file_name: &str) -> bool {
    file_name.starts_with('.')
        && (file_name.ends_with(DOWNLOAD_SUFFIX) || file_name.ends_with(PART_SUFFIX))
}

/// Remove residue files in `dir` last modified at least `max_age` ago.
///
/// Returns the removed paths. A missing directory yields an empty list.
/// Files that cannot be inspected or removed are logged and skipped.
///
/// # Errors
///
/// Returns an error if `dir` exists but cannot be listed.
pub fn sweep_residue(dir: &Utf8Path, max_age: Duration) -> io::Result<Vec<Utf8PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err),
    };

    let now = SystemTime::now();
    let mut removed = Vec::new();
    for entry in entries.filter_map(Result::ok) {
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            continue;
        };
        if !is_residue_name(&name) {
            continue;
        }
        let path = dir.join(&name);
        let old_enough = entry
            .metadata()
            .and_then(|meta| meta.modified())
            .map(|modified| now.duration_since(modified).unwrap_or_default() >= max_age);
        match old_enough {
            Ok(true) => {}
            Ok(false) => {
                debug!("leaving recent temporary file {path}");
                continue;
            }
            Err(err) => {
                warn!("could not inspect {path}: {err}");
                continue;
            }
        }
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("removed stale temporary file {path}");
                removed.push(path);
            }
            Err(err) => warn!("could not remove stale temporary file {path}: {err}"),
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn utf8_dir() -> (tempfile::TempDir, Utf8PathBuf) {
        let temp = tempfile::tempdir().expect("temp dir");
        let path = Utf8PathBuf::try_from(temp.path().to_path_buf()).expect("UTF-8 path");
        (temp, path)
    }

    #[rstest]
    #[case::download(".pub.ext-9.9.9.vsix.a1B2c3.download", true)]
    #[case::part(".pub.ext-9.9.9.vsix.a1B2c3.part", true)]
    #[case::artifact("pub.ext-9.9.9.vsix", false)]
    #[case::visible_part("notes.part", false)]
    #[case::hidden_other(".gitignore", false)]
    fn recognises_residue_names(#[case] name: &str, #[case] expected: bool) {
        assert_eq!(is_residue_name(name), expected);
    }

    #[test]
    fn sweeps_only_residue() {
        let (_temp, dir) = utf8_dir();
        fs::write(dir.join("pub.ext-9.9.9.vsix"), b"artifact").expect("artifact");
        fs::write(dir.join(".pub.ext-9.9.9.vsix.abc123.part"), b"x").expect("part");
        fs::write(dir.join(".pub.ext-9.9.9.vsix.def456.download"), b"x").expect("download");

        let mut removed = sweep_residue(&dir, Duration::ZERO).expect("sweep");
        removed.sort();

        assert_eq!(
            removed,
            vec![
                dir.join(".pub.ext-9.9.9.vsix.abc123.part"),
                dir.join(".pub.ext-9.9.9.vsix.def456.download"),
            ]
        );
        assert!(dir.join("pub.ext-9.9.9.vsix").exists());
    }

    #[test]
    fn recent_residue_is_kept() {
        let (_temp, dir) = utf8_dir();
        let part = dir.join(".pub.ext-9.9.9.vsix.abc123.part");
        fs::write(&part, b"in flight").expect("part");

        let removed = sweep_residue(&dir, DEFAULT_RESIDUE_AGE).expect("sweep");
        assert!(removed.is_empty());
        assert!(part.exists());
    }

    #[test]
    fn missing_directory_is_empty() {
        let (_temp, dir) = utf8_dir();
        let removed = sweep_residue(&dir.join("absent"), Duration::ZERO).expect("sweep");
        assert!(removed.is_empty());
    }
}
