//! Error kinds surfaced by detection, caching and orchestration.

use crate::model::FailureKind;
use thiserror::Error;

/// Failure of a single detection dispatch.
#[derive(Debug, Error)]
pub enum DetectError {
    /// No driver is registered for the OS family.
    #[error("unsupported os: {family}")]
    UnsupportedOs { family: String },

    /// The resolved driver failed while matching.
    #[error("failed detection for {family} {os_name}: {source:#}")]
    DetectionFailure {
        family: String,
        os_name: String,
        #[source]
        source: anyhow::Error,
    },
}

impl DetectError {
    pub fn kind(&self) -> FailureKind {
        match self {
            DetectError::UnsupportedOs { .. } => FailureKind::UnsupportedOs,
            DetectError::DetectionFailure { .. } => FailureKind::DetectionFailure,
        }
    }
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache miss: {kind} {key}")]
    Miss { kind: &'static str, key: String },

    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache entry could not be encoded: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("remote cache error: {0}")]
    Remote(String),
}

impl CacheError {
    pub fn blob_miss(key: impl Into<String>) -> Self {
        CacheError::Miss {
            kind: "blob",
            key: key.into(),
        }
    }

    pub fn artifact_miss(key: impl Into<String>) -> Self {
        CacheError::Miss {
            kind: "artifact",
            key: key.into(),
        }
    }

    pub fn is_miss(&self) -> bool {
        matches!(self, CacheError::Miss { .. })
    }
}

/// Failure of a scan for one artifact, local or remote.
#[derive(Debug, Error)]
pub enum ScanFailure {
    #[error(transparent)]
    Detect(#[from] DetectError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("remote scan failed: {0}")]
    Remote(String),

    /// Failure reported by a scan server, with the kind it assigned.
    #[error("{message}")]
    Rejected { kind: FailureKind, message: String },
}

impl ScanFailure {
    pub fn kind(&self) -> FailureKind {
        match self {
            ScanFailure::Detect(e) => e.kind(),
            ScanFailure::Cache(e) if e.is_miss() => FailureKind::CacheMiss,
            ScanFailure::Cache(_) => FailureKind::Remote,
            ScanFailure::Remote(_) => FailureKind::Remote,
            ScanFailure::Rejected { kind, .. } => *kind,
        }
    }
}

/// Failures that abort a whole run before any report is produced.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("invalid scan options: {0}")]
    Validation(String),

    #[error("failed to list artifacts: {0:#}")]
    ArtifactSource(#[source] anyhow::Error),
}
