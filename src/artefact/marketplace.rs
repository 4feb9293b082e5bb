//! Marketplace package-download URL construction.
//!
//! Builds the `vspackage` endpoint URL for a [`PackageSpec`] and the
//! request headers sent with it.

use super::spec::PackageSpec;

/// Default base URL of the marketplace gallery API.
pub const DEFAULT_MARKETPLACE_BASE: &str =
    "https://marketplace.visualstudio.com/_apis/public/gallery";

/// Default `User-Agent` header value.
pub const DEFAULT_USER_AGENT: &str = concat!("vsix-fetch/", env!("CARGO_PKG_VERSION"));

/// A single download attempt: URL plus preferred request headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    /// Fully formed package-download URL.
    pub url: String,
    /// Header name/value pairs to send with the request.
    pub headers: Vec<(String, String)>,
}

impl DownloadRequest {
    /// Build the request for `spec` against the marketplace at `base`.
    ///
    /// Identity encoding is requested so that the body arrives as the raw
    /// archive wherever the server honours it.
    ///
    /// # Examples
    ///
    /// ```
    /// use vsix_fetch::artefact::marketplace::DownloadRequest;
    /// use vsix_fetch::artefact::spec::PackageSpec;
    ///
    /// let spec = PackageSpec::new("pub.ext", "9.9.9", None).expect("valid spec");
    /// let request = DownloadRequest::for_spec(&spec, "https://example.test/gallery", "agent/1");
    /// assert_eq!(
    ///     request.url,
    ///     "https://example.test/gallery/publishers/pub/vsextensions/ext/9.9.9/vspackage"
    /// );
    /// assert_eq!(request.header("accept-encoding"), Some("identity"));
    /// ```
    #[must_use]
    pub fn for_spec(spec: &PackageSpec, base: &str, user_agent: &str) -> Self {
        Self {
            url: package_url(spec, base),
            headers: vec![
                ("User-Agent".to_owned(), user_agent.to_owned()),
                ("Accept-Encoding".to_owned(), "identity".to_owned()),
            ],
        }
    }

    /// Look up a header value by case-insensitive name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Build the `vspackage` URL for `spec`.
///
/// The identifier is split into its publisher and name path segments and the
/// platform, when present, becomes the `targetPlatform` query parameter.
#[must_use]
pub fn package_url(spec: &PackageSpec, base: &str) -> String {
    let base = base.trim_end_matches('/');
    let mut url = format!(
        "{base}/publishers/{}/vsextensions/{}/{}/vspackage",
        spec.publisher(),
        spec.name(),
        spec.version()
    );
    if let Some(platform) = spec.target_platform() {
        url.push_str("?targetPlatform=");
        url.push_str(platform);
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::universal(
        None,
        "https://example.test/publishers/acme/vsextensions/widget/1.2.3/vspackage"
    )]
    #[case::platform_specific(
        Some("linux-x64"),
        concat!(
            "https://example.test/publishers/acme/vsextensions/widget/1.2.3/vspackage",
            "?targetPlatform=linux-x64"
        )
    )]
    fn builds_vspackage_url(#[case] platform: Option<&str>, #[case] expected: &str) {
        let spec = PackageSpec::new("acme.widget", "1.2.3", platform).expect("valid spec");
        assert_eq!(package_url(&spec, "https://example.test/"), expected);
    }

    #[test]
    fn request_carries_user_agent_and_identity_encoding() {
        let spec = PackageSpec::new("acme.widget", "1.2.3", None).expect("valid spec");
        let request = DownloadRequest::for_spec(&spec, DEFAULT_MARKETPLACE_BASE, "agent/1");
        assert!(request.url.starts_with(DEFAULT_MARKETPLACE_BASE));
        assert_eq!(request.header("USER-AGENT"), Some("agent/1"));
        assert_eq!(request.header("Accept-Encoding"), Some("identity"));
        assert_eq!(request.header("Authorization"), None);
    }
}
