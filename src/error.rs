//! Error types for the fetch pipeline.
//!
//! Each pipeline component reports its own error enum. The orchestrator wraps
//! whichever one ended a download in a [`FetchError`] that records the request
//! URL and the stage that failed, so a report can tell a wrong version or
//! platform apart from a transient network failure or a local disk problem.

use crate::artefact::download::TransportError;
use crate::artefact::normalisation::NormaliseError;
use crate::artefact::repack::RepackError;
use crate::stager::StageError;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Pipeline stage in which a download stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStage {
    /// Issuing the request and awaiting the response headers.
    Requesting,
    /// Copying the response body into the download file.
    Streaming,
    /// Unwrapping and validating the payload.
    Normalising,
    /// Rewriting the archive container.
    Repacking,
    /// Staging and renaming the final artifact.
    Publishing,
}

impl fmt::Display for FetchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Requesting => "requesting",
            Self::Streaming => "streaming",
            Self::Normalising => "normalising",
            Self::Repacking => "repacking",
            Self::Publishing => "publishing",
        };
        f.write_str(label)
    }
}

/// Coarse classification of a failed download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The request failed or the body could not be received in full.
    Transport,
    /// Zero bytes were received.
    EmptyPayload,
    /// A gzip layer could not be decoded.
    GzipDecode,
    /// The payload is not a ZIP container.
    NotAnArchive,
    /// The archive could not be rewritten entry by entry.
    CorruptEntry,
    /// A local filesystem operation failed.
    Io,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Transport => "transport error",
            Self::EmptyPayload => "empty payload",
            Self::GzipDecode => "gzip decode error",
            Self::NotAnArchive => "not an archive",
            Self::CorruptEntry => "corrupt entry",
            Self::Io => "I/O error",
        };
        f.write_str(label)
    }
}

/// The component error that ended a download.
#[derive(Debug, Error)]
pub enum FetchFailure {
    /// Request or body transfer failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Payload normalisation failure.
    #[error(transparent)]
    Normalise(#[from] NormaliseError),

    /// Repack failure.
    #[error(transparent)]
    Repack(#[from] RepackError),

    /// Staging or rename failure.
    #[error(transparent)]
    Stage(#[from] StageError),

    /// Any other local I/O failure.
    #[error("{context}: {source}")]
    Io {
        /// What was being attempted.
        context: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl FetchFailure {
    /// Classify this failure.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Transport(_) => FailureKind::Transport,
            Self::Normalise(NormaliseError::EmptyPayload) => FailureKind::EmptyPayload,
            Self::Normalise(NormaliseError::GzipDecode { .. }) => FailureKind::GzipDecode,
            Self::Normalise(NormaliseError::NotAnArchive { .. }) => FailureKind::NotAnArchive,
            Self::Repack(_) => FailureKind::CorruptEntry,
            Self::Normalise(NormaliseError::Io(_)) | Self::Stage(_) | Self::Io { .. } => {
                FailureKind::Io
            }
        }
    }
}

/// A failed download, with enough context to diagnose it.
#[derive(Debug, Error)]
#[error("{} failed while {} ({}): {}", .url, .stage, .failure.kind(), .failure)]
pub struct FetchError {
    url: String,
    stage: FetchStage,
    #[source]
    failure: FetchFailure,
}

impl FetchError {
    /// Wrap `failure` with its request URL and stage.
    #[must_use]
    pub fn new(url: impl Into<String>, stage: FetchStage, failure: impl Into<FetchFailure>) -> Self {
        Self {
            url: url.into(),
            stage,
            failure: failure.into(),
        }
    }

    /// The request URL of the failed download.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The stage in which the download stopped.
    #[must_use]
    pub fn stage(&self) -> FetchStage {
        self.stage
    }

    /// The underlying component error.
    #[must_use]
    pub fn failure(&self) -> &FetchFailure {
        &self.failure
    }

    /// Coarse classification of the failure.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        self.failure.kind()
    }

    /// True when the server answered with text instead of an archive,
    /// usually an HTML error page for a wrong version or platform.
    #[must_use]
    pub fn is_text_response(&self) -> bool {
        matches!(
            self.failure,
            FetchFailure::Normalise(NormaliseError::NotAnArchive {
                text_like: true,
                ..
            })
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const URL: &str = "https://example.test/publishers/pub/vsextensions/ext/9.9.9/vspackage";

    #[rstest]
    #[case::transport(
        FetchFailure::from(TransportError::NotFound { url: URL.to_owned() }),
        FailureKind::Transport
    )]
    #[case::empty(FetchFailure::from(NormaliseError::EmptyPayload), FailureKind::EmptyPayload)]
    #[case::gzip(
        FetchFailure::from(NormaliseError::GzipDecode { reason: "eof".to_owned() }),
        FailureKind::GzipDecode
    )]
    #[case::repack(
        FetchFailure::from(RepackError::TooLarge { limit: 1 }),
        FailureKind::CorruptEntry
    )]
    #[case::io(
        FetchFailure::Io {
            context: "creating destination".to_owned(),
            source: std::io::Error::other("disk full"),
        },
        FailureKind::Io
    )]
    fn failures_are_classified(#[case] failure: FetchFailure, #[case] expected: FailureKind) {
        assert_eq!(failure.kind(), expected);
    }

    #[test]
    fn message_names_url_stage_and_kind() {
        let err = FetchError::new(
            URL,
            FetchStage::Normalising,
            NormaliseError::NotAnArchive {
                text_like: true,
                preview: "<!DOCTYPE html>".to_owned(),
            },
        );
        let msg = err.to_string();
        assert!(msg.contains(URL), "{msg}");
        assert!(msg.contains("normalising"), "{msg}");
        assert!(msg.contains("not an archive"), "{msg}");
        assert!(err.is_text_response());
    }

    #[test]
    fn kinds_serialise_as_snake_case() {
        let json = serde_json::to_string(&FailureKind::NotAnArchive).expect("serialise");
        assert_eq!(json, "\"not_an_archive\"");
    }
}
