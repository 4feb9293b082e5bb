//! Output filename policy for downloaded packages.
//!
//! Prefers the server-supplied filename (sanitised to a single safe path
//! segment) and falls back to a deterministic name built from the
//! [`PackageSpec`]: `<publisher>.<name>-<version>[-<platform>].vsix`.

use super::content_disposition::filename_from_content_disposition;
use super::spec::PackageSpec;

/// The fixed extension of every published package.
pub const VSIX_EXTENSION: &str = ".vsix";

/// Suffixes replaced by [`VSIX_EXTENSION`] instead of being stacked under it.
const ARCHIVE_SUFFIXES: [&str; 3] = [".vsix", ".zip", ".gz"];

/// Longest stem kept from a server filename, leaving room for temporary
/// file decorations within the usual 255-byte name limit.
const MAX_STEM_LEN: usize = 200;

/// Resolve the final filename from an optional `Content-Disposition` header.
///
/// # Examples
///
/// ```
/// use vsix_fetch::artefact::naming::resolve_filename;
/// use vsix_fetch::artefact::spec::PackageSpec;
///
/// let spec = PackageSpec::new("acme.widget", "1.2.3", Some("linux-x64"))
///     .expect("valid spec");
/// assert_eq!(resolve_filename(None, &spec), "acme.widget-1.2.3-linux-x64.vsix");
/// assert_eq!(
///     resolve_filename(Some("attachment; filename=\"My Ext (copy).VSIX\""), &spec),
///     "MyExtcopy.vsix"
/// );
/// ```
#[must_use]
pub fn resolve_filename(content_disposition: Option<&str>, spec: &PackageSpec) -> String {
    content_disposition
        .and_then(filename_from_content_disposition)
        .and_then(|name| sanitise_server_filename(&name))
        .unwrap_or_else(|| fallback_filename(spec))
}

/// Sanitise a server-provided filename into a single safe path segment.
///
/// Returns `None` when the name must be ignored: it contains `..`, looks
/// like an absolute path, or is empty once disallowed characters and
/// surrounding dots are dropped.
#[must_use]
pub fn sanitise_server_filename(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.contains("..") || is_absolute_like(raw) {
        return None;
    }

    let segment = raw.rsplit(['/', '\\']).next().unwrap_or(raw);
    let cleaned = collapse_dots(segment.chars().filter(|&c| is_allowed(c)));
    let stem = strip_archive_suffixes(cleaned.trim_matches('.')).trim_end_matches('.');
    // Only ASCII survives the filter, so any byte offset is a char boundary.
    let stem = stem
        .get(..MAX_STEM_LEN)
        .unwrap_or(stem)
        .trim_end_matches('.');
    if stem.is_empty() {
        return None;
    }
    Some(format!("{stem}{VSIX_EXTENSION}"))
}

/// Collect `chars`, merging runs of `.` left behind by dropped characters.
fn collapse_dots(chars: impl Iterator<Item = char>) -> String {
    let mut out = String::new();
    for c in chars {
        if !(c == '.' && out.ends_with('.')) {
            out.push(c);
        }
    }
    out
}

/// Build the deterministic fallback filename for `spec`.
#[must_use]
pub fn fallback_filename(spec: &PackageSpec) -> String {
    let mut name = format!("{}-{}", spec.identifier(), spec.version());
    if let Some(platform) = spec.target_platform() {
        name.push('-');
        name.push_str(platform);
    }
    let name: String = name
        .chars()
        .map(|c| if is_allowed(c) { c } else { '_' })
        .collect();
    format!("{name}{VSIX_EXTENSION}")
}

fn is_allowed(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_')
}

fn is_absolute_like(raw: &str) -> bool {
    if raw.starts_with('/') || raw.starts_with('\\') {
        return true;
    }
    let mut chars = raw.chars();
    matches!(
        (chars.next(), chars.next()),
        (Some(drive), Some(':')) if drive.is_ascii_alphabetic()
    )
}

/// Remove trailing archive-like suffixes, case-insensitively.
fn strip_archive_suffixes(name: &str) -> &str {
    let mut current = name;
    loop {
        let stripped = ARCHIVE_SUFFIXES.iter().find_map(|suffix| {
            let split = current.len().checked_sub(suffix.len())?;
            let (stem, tail) = (current.get(..split)?, current.get(split..)?);
            tail.eq_ignore_ascii_case(suffix).then_some(stem)
        });
        match stripped {
            Some(stem) => current = stem,
            None => return current,
        }
    }
}
