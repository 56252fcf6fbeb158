pub mod cache;
pub mod config;
pub mod detector;
pub mod error;
pub mod model;
pub mod options;
pub mod output;
pub mod platform;
pub mod rpc;
pub mod runner;
pub mod scanner;
pub mod source;

pub use cache::{ArtifactCache, FsCache, MemoryCache};
pub use config::Config;
pub use detector::{Detection, Detector, Driver, DriverRegistry, OsFamily};
pub use error::{CacheError, DetectError, ScanError, ScanFailure};
pub use model::{
    Artifact, ArtifactId, DetectedVulnerability, OsIdentity, Package, Report, Repository, Severity,
};
pub use options::ScanOptions;
pub use runner::Runner;
