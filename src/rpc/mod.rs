//! Remote scan service: an HTTP front end over a shared artifact cache.
//!
//! Clients inspect artifacts themselves, upload whatever blobs the server
//! reports missing, then ask it to scan by cache key. The server never
//! fetches artifacts; a key it cannot find fails the request.
//!
//! | Method | Path | Body | Response |
//! |--------|------|------|----------|
//! | `POST` | `/scan` | [`ScanRequest`](crate::scanner::ScanRequest) | [`ScanResults`](crate::model::ScanResults) |
//! | `POST` | `/cache/artifact` | [`PutArtifact`] | `204` |
//! | `POST` | `/cache/blob` | [`PutBlob`] | `204` |
//! | `POST` | `/cache/missing` | [`MissingBlobsRequest`] | [`MissingBlobs`](crate::cache::MissingBlobs) |
//! | `GET` | `/cache/artifact/{key}` | | [`ArtifactInfo`](crate::cache::ArtifactInfo) |
//! | `GET` | `/cache/blob/{key}` | | [`BlobInfo`](crate::cache::BlobInfo) |
//! | `GET` | `/healthz` | | `ok` |
//!
//! Errors are returned as [`ErrorBody`]. When the server is configured with
//! a token, every route except `/healthz` requires it in the token header.

mod client;
mod server;

pub use client::{RemoteCache, RemoteScanner};
pub use server::{router, serve, shutdown_signal, AppState};

use crate::cache::{ArtifactInfo, BlobInfo};
use crate::model::FailureKind;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_TOKEN_HEADER: &str = "Fleetscan-Token";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutArtifact {
    pub key: String,
    pub info: ArtifactInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutBlob {
    pub key: String,
    pub info: BlobInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissingBlobsRequest {
    pub artifact_key: String,
    pub blob_keys: Vec<String>,
}

/// JSON error payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    /// Set when the error is a per-artifact scan failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<FailureKind>,
}

/// Transport-level failure talking to a scan server.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("request to scan server failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("scan server rejected the token")]
    Unauthorized,

    #[error("scan server returned {status}: {}", body.message)]
    Status { status: u16, body: ErrorBody },

    #[error("invalid scan server url: {0}")]
    Url(String),
}
