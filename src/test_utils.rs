//! Shared test utilities: payload builders and a stub transport.
//!
//! Available to unit tests and, through the `test-support` feature, to the
//! behaviour suites under `tests/`.

use crate::artefact::download::{PackageResponse, PackageTransport, TransportError};
use crate::artefact::marketplace::DownloadRequest;
use flate2::Compression;
use flate2::write::GzEncoder;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::{self, Cursor, Read, Write};
use std::sync::Mutex;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

/// How a [`ZipEntry`] is stored in a built archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// A directory entry.
    Directory,
    /// A file stored without compression.
    Stored,
    /// A deflated file.
    Deflated,
}

/// One entry of an archive assembled by [`build_zip`].
#[derive(Debug, Clone)]
pub struct ZipEntry {
    /// Entry name inside the archive.
    pub name: String,
    /// File content (empty for directories).
    pub content: Vec<u8>,
    /// Storage kind.
    pub kind: EntryKind,
    /// Unix permission bits, if any.
    pub mode: Option<u32>,
}

impl ZipEntry {
    /// A directory entry.
    pub fn dir(name: &str) -> Self {
        Self::new(name, &[], EntryKind::Directory)
    }

    /// A stored file entry.
    pub fn stored(name: &str, content: &[u8]) -> Self {
        Self::new(name, content, EntryKind::Stored)
    }

    /// A deflated file entry.
    pub fn deflated(name: &str, content: &[u8]) -> Self {
        Self::new(name, content, EntryKind::Deflated)
    }

    /// Set the entry's unix permission bits.
    #[must_use]
    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = Some(mode);
        self
    }

    fn new(name: &str, content: &[u8], kind: EntryKind) -> Self {
        Self {
            name: name.to_owned(),
            content: content.to_vec(),
            kind,
            mode: None,
        }
    }
}

/// Assemble a ZIP archive from `entries` with a fixed modification time.
pub fn build_zip(entries: &[ZipEntry]) -> Vec<u8> {
    let modified =
        DateTime::from_date_and_time(2024, 5, 17, 12, 30, 0).expect("valid fixed timestamp");
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for entry in entries {
        let method = match entry.kind {
            EntryKind::Stored => CompressionMethod::Stored,
            EntryKind::Directory | EntryKind::Deflated => CompressionMethod::Deflated,
        };
        let mut options = SimpleFileOptions::default()
            .compression_method(method)
            .last_modified_time(modified);
        if let Some(mode) = entry.mode {
            options = options.unix_permissions(mode);
        }
        if entry.kind == EntryKind::Directory {
            writer
                .add_directory(entry.name.as_str(), options)
                .expect("add directory");
        } else {
            writer
                .start_file(entry.name.as_str(), options)
                .expect("start file");
            writer.write_all(&entry.content).expect("write entry");
        }
    }
    writer.finish().expect("finish archive").into_inner()
}

/// A small but realistic VSIX archive.
pub fn sample_vsix() -> Vec<u8> {
    let manifest = concat!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n",
        "<PackageManifest Version=\"2.0.0\">\n",
        "  <Metadata><Identity Id=\"ext\" Version=\"9.9.9\" Publisher=\"pub\"/></Metadata>\n",
        "</PackageManifest>\n"
    );
    let package_json = concat!(
        "{\n",
        "  \"name\": \"ext\",\n",
        "  \"publisher\": \"pub\",\n",
        "  \"version\": \"9.9.9\",\n",
        "  \"main\": \"./out/extension.js\"\n",
        "}\n"
    );
    let script = "exports.activate = function () { return 'activated'; };\n".repeat(8);
    build_zip(&[
        ZipEntry::deflated("extension.vsixmanifest", manifest.as_bytes()),
        ZipEntry::deflated("[Content_Types].xml", b"<Types></Types>\n"),
        ZipEntry::dir("extension/"),
        ZipEntry::deflated("extension/package.json", package_json.as_bytes()),
        ZipEntry::stored("extension/README.md", b"# ext\n\nA sample extension.\n"),
        ZipEntry::deflated("extension/out/extension.js", script.as_bytes()).with_mode(0o644),
    ])
}

/// Read every entry of `archive` as `(name, content)` pairs, in order.
pub fn read_entries(archive: &[u8]) -> Vec<(String, Vec<u8>)> {
    let mut reader = ZipArchive::new(Cursor::new(archive)).expect("readable archive");
    (0..reader.len())
        .map(|index| {
            let mut entry = reader.by_index(index).expect("readable entry");
            let mut content = Vec::new();
            entry.read_to_end(&mut content).expect("entry content");
            (entry.name().to_owned(), content)
        })
        .collect()
}

/// Wrap `bytes` in a single gzip member.
pub fn gzip(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).expect("gzip write");
    encoder.finish().expect("gzip finish")
}

/// The kind of page a CDN serves for an unknown version or platform.
pub fn html_error_page() -> Vec<u8> {
    concat!(
        "<!DOCTYPE html>\n",
        "<html><head><title>404 - Not Found</title></head>\n",
        "<body><h1>The requested extension version was not found.</h1></body></html>\n"
    )
    .as_bytes()
    .to_vec()
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// A canned reply served by [`StubTransport`].
#[derive(Debug, Clone)]
pub enum StubReply {
    /// A successful response.
    Payload {
        /// Response body.
        body: Vec<u8>,
        /// `Content-Disposition` header, if any.
        content_disposition: Option<String>,
        /// Declared `Content-Length`, if any.
        content_length: Option<u64>,
    },
    /// A non-success status before any body.
    Status(u16),
    /// A body that fails with a connection reset after `body` was sent.
    Interrupted {
        /// Bytes delivered before the failure.
        body: Vec<u8>,
    },
}

impl StubReply {
    /// A successful response carrying `body` and an accurate length.
    pub fn payload(body: Vec<u8>) -> Self {
        let content_length = u64::try_from(body.len()).ok();
        Self::Payload {
            body,
            content_disposition: None,
            content_length,
        }
    }

    /// A successful response with a `Content-Disposition` header.
    pub fn named(body: Vec<u8>, content_disposition: &str) -> Self {
        let content_length = u64::try_from(body.len()).ok();
        Self::Payload {
            body,
            content_disposition: Some(content_disposition.to_owned()),
            content_length,
        }
    }

    /// A response that declares `declared` bytes but sends only `body`.
    pub fn truncated(body: Vec<u8>, declared: u64) -> Self {
        Self::Payload {
            body,
            content_disposition: None,
            content_length: Some(declared),
        }
    }
}

/// A [`PackageTransport`] serving canned replies keyed by URL.
///
/// Unknown URLs answer 404. Requests are recorded for later inspection.
#[derive(Debug, Default)]
pub struct StubTransport {
    replies: HashMap<String, StubReply>,
    fallback: Option<StubReply>,
    requests: Mutex<Vec<DownloadRequest>>,
}

impl StubTransport {
    /// Create a transport with no replies.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `reply` for requests to `url`.
    #[must_use]
    pub fn with_reply(mut self, url: &str, reply: StubReply) -> Self {
        self.replies.insert(url.to_owned(), reply);
        self
    }

    /// Serve `reply` for every URL without a specific reply.
    #[must_use]
    pub fn with_fallback(mut self, reply: StubReply) -> Self {
        self.fallback = Some(reply);
        self
    }

    /// Return the requests received so far, in arrival order.
    pub fn requests(&self) -> Vec<DownloadRequest> {
        self.requests.lock().expect("request log poisoned").clone()
    }
}

impl PackageTransport for StubTransport {
    fn open(&self, request: &DownloadRequest) -> Result<PackageResponse, TransportError> {
        self.requests
            .lock()
            .expect("request log poisoned")
            .push(request.clone());

        let reply = self
            .replies
            .get(&request.url)
            .or(self.fallback.as_ref())
            .cloned()
            .unwrap_or(StubReply::Status(404));

        match reply {
            StubReply::Payload {
                body,
                content_disposition,
                content_length,
            } => Ok(PackageResponse {
                content_disposition,
                content_encoding: None,
                content_length,
                body: Box::new(Cursor::new(body)),
            }),
            StubReply::Status(404) => Err(TransportError::NotFound {
                url: request.url.clone(),
            }),
            StubReply::Status(status) => Err(TransportError::Status {
                url: request.url.clone(),
                status,
            }),
            StubReply::Interrupted { body } => Ok(PackageResponse::from_body(Box::new(
                ResettingReader {
                    inner: Cursor::new(body),
                },
            ))),
        }
    }
}

/// Reader that yields its content then fails with a connection reset.
struct ResettingReader {
    inner: Cursor<Vec<u8>>,
}

impl Read for ResettingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.inner.read(buf)? {
            0 => Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            )),
            n => Ok(n),
        }
    }
}
