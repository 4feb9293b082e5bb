//! `Content-Disposition` header parsing (`filename` and `filename*`).

use percent_encoding::percent_decode_str;

/// Extract the filename from a raw `Content-Disposition` header value.
///
/// Supports `filename="value"` (quoted, with backslash escapes),
/// `filename=value` (token) and `filename*=UTF-8''percent-encoded`
/// (RFC 5987). When both forms are present, `filename*` wins.
///
/// # Examples
///
/// ```
/// use vsix_fetch::artefact::content_disposition::filename_from_content_disposition;
///
/// let name = filename_from_content_disposition("attachment; filename=\"pkg.vsix\"");
/// assert_eq!(name.as_deref(), Some("pkg.vsix"));
/// ```
#[must_use]
pub fn filename_from_content_disposition(header_value: &str) -> Option<String> {
    let mut plain: Option<String> = None;

    for param in split_params(header_value).into_iter().skip(1) {
        let Some((key, value)) = param.split_once('=') else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        let value = value.trim();

        if key == "filename*" {
            if let Some(decoded) = decode_extended_value(value) {
                return Some(decoded);
            }
        } else if key == "filename" {
            let unquoted = unquote(value);
            if !unquoted.is_empty() {
                plain = Some(unquoted);
            }
        }
    }

    plain
}

/// Split a header value on `;` separators outside quoted strings.
fn split_params(header_value: &str) -> Vec<&str> {
    let mut params = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut escaped = false;
    for (index, c) in header_value.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            ';' if !in_quotes => {
                params.push(header_value.get(start..index).unwrap_or_default());
                start = index + 1;
            }
            _ => {}
        }
    }
    params.push(header_value.get(start..).unwrap_or_default());
    params
}

/// Decode an RFC 5987 `charset'language'value` string.
fn decode_extended_value(value: &str) -> Option<String> {
    let value = value.trim_matches('"');
    let encoded = match value.split_once("''") {
        Some((_charset, rest)) => rest,
        None => value,
    };
    let decoded = percent_decode_str(encoded).decode_utf8_lossy().into_owned();
    (!decoded.is_empty()).then_some(decoded)
}

/// Strip surrounding quotes and resolve backslash escapes.
fn unquote(value: &str) -> String {
    let Some(inner) = value
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    else {
        return value.to_owned();
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::quoted("attachment; filename=\"pkg.vsix\"", Some("pkg.vsix"))]
    #[case::token("attachment; filename=pkg.vsix", Some("pkg.vsix"))]
    #[case::escaped_quote("attachment; filename=\"a\\\"b.vsix\"", Some("a\"b.vsix"))]
    #[case::extended("attachment; filename*=UTF-8''caf%C3%A9.vsix", Some("café.vsix"))]
    #[case::case_insensitive_key("attachment; FILENAME=pkg.vsix", Some("pkg.vsix"))]
    #[case::missing("attachment", None)]
    #[case::empty_value("attachment; filename=\"\"", None)]
    #[case::semicolon_in_quotes("attachment; filename=\"a;b.vsix\"", Some("a;b.vsix"))]
    #[case::escaped_quote_then_semicolon(
        "attachment; filename=\"a\\\";b.vsix\"; size=10",
        Some("a\";b.vsix")
    )]
    fn parses_filename(#[case] header: &str, #[case] expected: Option<&str>) {
        assert_eq!(
            filename_from_content_disposition(header).as_deref(),
            expected
        );
    }

    #[test]
    fn extended_form_takes_precedence() {
        let header = "attachment; filename=\"fallback.vsix\"; filename*=UTF-8''real%20name.vsix";
        assert_eq!(
            filename_from_content_disposition(header).as_deref(),
            Some("real name.vsix")
        );
    }

    #[rstest]
    #[case::trailing_percent("100%", "100%")]
    #[case::short_escape("a%2", "a%2")]
    #[case::non_hex_escape("a%zz", "a%zz")]
    fn keeps_malformed_escapes(#[case] encoded: &str, #[case] expected: &str) {
        let header = format!("attachment; filename*=UTF-8''{encoded}");
        assert_eq!(
            filename_from_content_disposition(&header).as_deref(),
            Some(expected)
        );
    }
}
