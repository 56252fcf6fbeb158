//! Core data types for package inventories, findings and reports.
//!
//! This module contains the fundamental types used throughout fleetscan:
//!
//! - [`Package`] - One installed OS package
//! - [`OsIdentity`] - The distribution release hosting a package set
//! - [`Repository`] - Optional repository/channel hints for a release
//! - [`DetectedVulnerability`] - A driver finding for one package
//! - [`Artifact`] - A scannable unit produced by a source adapter
//! - [`Report`] - Aggregated per-artifact results
//!
//! # Example
//!
//! ```
//! use fleetscan::{OsIdentity, Package};
//!
//! let os = OsIdentity::new("debian", "11");
//! let package = Package::new("openssl", "1.1.1k-1");
//!
//! println!("{} on {}", package.name, os);
//! ```

mod artifact;
mod package;
mod report;
mod vulnerability;

pub use artifact::*;
pub use package::*;
pub use report::*;
pub use vulnerability::*;
