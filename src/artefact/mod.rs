//! Package identity, transport and payload handling.
//!
//! # Sub-modules
//!
//! - [`content_disposition`] - `Content-Disposition` filename extraction.
//! - [`download`] - Package transport trait and HTTP implementation.
//! - [`marketplace`] - Package-download URL and request headers.
//! - [`naming`] - Output filename policy.
//! - [`normalisation`] - Gzip unwrapping and ZIP structure checks.
//! - [`repack`] - Rewriting archives through a fresh ZIP writer.
//! - [`spec`] - Package specification newtype (`PackageSpec`).

pub mod content_disposition;
pub mod download;
pub mod marketplace;
pub mod naming;
pub mod normalisation;
pub mod repack;
pub mod spec;
