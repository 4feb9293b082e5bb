//! Package transport for marketplace downloads.
//!
//! Provides a trait-based abstraction over the HTTP request so that the
//! fetch pipeline can be driven by stub transports in tests, plus the
//! production implementation backed by `ureq`.

use super::marketplace::DownloadRequest;
use std::fmt;
use std::io::Read;
use std::time::Duration;

/// Default global timeout applied to each marketplace request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// An open response whose body has not been read yet.
pub struct PackageResponse {
    /// Raw `Content-Disposition` header value, if present.
    pub content_disposition: Option<String>,
    /// Raw `Content-Encoding` header value, if present.
    pub content_encoding: Option<String>,
    /// Declared body length in bytes, if the server sent one.
    pub content_length: Option<u64>,
    /// The response body.
    pub body: Box<dyn Read>,
}

impl PackageResponse {
    /// Wrap a body reader with no header metadata.
    #[must_use]
    pub fn from_body(body: Box<dyn Read>) -> Self {
        Self {
            content_disposition: None,
            content_encoding: None,
            content_length: None,
            body,
        }
    }
}

impl fmt::Debug for PackageResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackageResponse")
            .field("content_disposition", &self.content_disposition)
            .field("content_encoding", &self.content_encoding)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Trait for opening package downloads.
///
/// Abstractions allow tests to inject canned responses without network
/// access.
///
/// # Examples
///
/// ```
/// use vsix_fetch::artefact::download::HttpTransport;
///
/// let transport = HttpTransport::default();
/// // Use transport.open(&request) in production
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait PackageTransport {
    /// Issue `request` and return the response once its status line and
    /// headers have arrived.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] when the request fails or the server
    /// answers with a non-success status.
    fn open(&self, request: &DownloadRequest) -> Result<PackageResponse, TransportError>;
}

/// Errors arising from the transport stage, including body streaming.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The package was not found (HTTP 404).
    #[error("package not found: {url}")]
    NotFound {
        /// The URL that returned 404.
        url: String,
    },

    /// The server answered with a non-success status.
    #[error("unexpected HTTP status {status} from {url}")]
    Status {
        /// The requested URL.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The request could not be completed.
    #[error("request failed for {url}: {reason}")]
    Http {
        /// The requested URL.
        url: String,
        /// A human-readable description of the failure.
        reason: String,
    },

    /// Reading the body failed part-way through.
    #[error("connection dropped while reading {url}: {source}")]
    Interrupted {
        /// The requested URL.
        url: String,
        /// The underlying read error.
        #[source]
        source: std::io::Error,
    },

    /// The body ended before the declared `Content-Length`.
    #[error("truncated body from {url}: expected {expected} bytes, received {received}")]
    Truncated {
        /// The requested URL.
        url: String,
        /// Declared length.
        expected: u64,
        /// Bytes actually received.
        received: u64,
    },

    /// The body exceeded the configured payload limit.
    #[error("body from {url} exceeds the {limit}-byte payload limit")]
    TooLarge {
        /// The requested URL.
        url: String,
        /// The configured limit.
        limit: u64,
    },
}

/// HTTP transport using a `ureq` agent.
pub struct HttpTransport {
    agent: ureq::Agent,
}

impl HttpTransport {
    /// Create a transport whose requests time out after `timeout`.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl PackageTransport for HttpTransport {
    fn open(&self, request: &DownloadRequest) -> Result<PackageResponse, TransportError> {
        let mut builder = self.agent.get(request.url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let response = builder
            .call()
            .map_err(|e| map_ureq_error(&request.url, &e))?;

        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned)
        };
        let content_disposition = header("content-disposition");
        let content_encoding = header("content-encoding");
        let content_length = header("content-length").and_then(|v| v.trim().parse().ok());

        Ok(PackageResponse {
            content_disposition,
            content_encoding,
            content_length,
            body: Box::new(response.into_body().into_reader()),
        })
    }
}

/// Map a ureq error to a [`TransportError`].
fn map_ureq_error(url: &str, err: &ureq::Error) -> TransportError {
    match err {
        ureq::Error::StatusCode(404) => TransportError::NotFound {
            url: url.to_owned(),
        },
        ureq::Error::StatusCode(status) => TransportError::Status {
            url: url.to_owned(),
            status: *status,
        },
        other => TransportError::Http {
            url: url.to_owned(),
            reason: other.to_string(),
        },
    }
}
