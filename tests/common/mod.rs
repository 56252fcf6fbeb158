#![allow(dead_code)]

use chrono::{DateTime, Utc};
use fleetscan::detector::{Advisory, AdvisoryStore, Detector, DriverRegistry, MemoryAdvisoryStore};
use fleetscan::model::{Artifact, OsIdentity, Package, Severity};
use fleetscan::scanner::{Inventory, InventoryEntry, Layer};
use std::sync::Arc;

pub fn scan_time() -> DateTime<Utc> {
    "2025-06-01T00:00:00Z".parse().unwrap()
}

fn advisory(id: &str, fixed: Option<&str>, severity: Severity) -> Advisory {
    Advisory {
        vulnerability_id: id.to_string(),
        fixed_version: fixed.map(str::to_string),
        severity,
        title: None,
    }
}

/// A small fixed vulnerability-data snapshot.
pub fn advisory_store() -> Arc<dyn AdvisoryStore> {
    Arc::new(
        MemoryAdvisoryStore::new()
            .with("debian 11", "openssl", advisory("CVE-2021-3449", Some("1.1.1k-1"), Severity::Medium))
            .with("debian 11", "openssl", advisory("CVE-2021-3711", Some("1.1.1k-1+deb11u1"), Severity::Critical))
            .with("debian 11", "openssl", advisory("CVE-2022-0778", Some("1.1.1n-0+deb11u1"), Severity::High))
            .with("debian 11", "zlib", advisory("CVE-2018-25032", Some("1:1.2.11.dfsg-2+deb11u1"), Severity::High))
            .with("redhat 6", "sudo", advisory("CVE-2021-3156", None, Severity::High)),
    )
}

pub fn detector() -> Detector {
    Detector::new(DriverRegistry::with_advisories(advisory_store()).build())
}

fn entry(artifact: Artifact, os: OsIdentity, packages: Vec<Package>) -> InventoryEntry {
    InventoryEntry {
        artifact,
        architecture: Some("amd64".to_string()),
        layers: vec![Layer {
            os: Some(os),
            packages,
            ..Default::default()
        }],
    }
}

/// Inventory of three images: Debian 11, CentOS 6 and an OS without a driver.
pub fn inventory() -> Inventory {
    Inventory {
        artifacts: vec![
            entry(
                Artifact::image("debian:11"),
                OsIdentity::new("debian", "11.7"),
                vec![Package::new("openssl", "1.1.1k-1")],
            ),
            entry(
                Artifact::image("centos:6"),
                OsIdentity::new("centos", "6.10"),
                vec![Package::new("sudo", "1.8.6p3-29.el6_10.3")],
            ),
            entry(
                Artifact::image("haiku:r1"),
                OsIdentity::new("haiku", "r1beta4"),
                vec![Package::new("bash", "5.2")],
            ),
        ],
    }
}
