mod common;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{detector, inventory, scan_time};
use fleetscan::cache::MemoryCache;
use fleetscan::config::IgnoreConfig;
use fleetscan::detector::{Detector, Driver, DriverRegistry};
use fleetscan::model::{
    Artifact, ArtifactId, ArtifactOutcome, DetectedVulnerability, FailureKind, OsIdentity, Package,
    ReportStatus, Repository,
};
use fleetscan::scanner::{InventoryEntry, InventoryInspector, Layer, LocalScanner};
use fleetscan::source::{ArtifactSource, ClusterSource, StaticLister, StaticSource, Workload};
use fleetscan::{Runner, ScanError, ScanOptions};
use std::sync::Arc;

fn runner(options: ScanOptions) -> Runner {
    let cache = Arc::new(MemoryCache::new());
    let inspector = Arc::new(InventoryInspector::new(cache.clone(), inventory()));
    let scanner = Arc::new(LocalScanner::new(cache, detector()).with_scan_time(scan_time()));
    Runner::new(inspector, scanner, options).with_concurrency(2)
}

fn images(ids: &[&str]) -> StaticSource {
    StaticSource::new("fleet", ids.iter().map(|id| Artifact::image(*id)).collect())
}

#[tokio::test]
async fn aggregates_with_partial_failures() {
    let report = runner(ScanOptions::default())
        .run(&images(&["debian:11", "centos:6", "haiku:r1", "busybox:latest"]))
        .await
        .unwrap();

    assert_eq!(report.status, ReportStatus::Partial);
    assert_eq!(report.context, "fleet");
    assert_eq!(report.results.len(), 4);

    let debian = report.results[&ArtifactId::from("debian:11")]
        .outcome
        .results()
        .unwrap();
    assert_eq!(debian.vulnerabilities.len(), 2);
    assert!(!debian.eosl());

    let centos = report.results[&ArtifactId::from("centos:6")]
        .outcome
        .results()
        .unwrap();
    assert!(centos.eosl());
    assert_eq!(centos.vulnerabilities.len(), 1);

    assert!(matches!(
        report.results[&ArtifactId::from("haiku:r1")].outcome,
        ArtifactOutcome::Failed { kind: FailureKind::UnsupportedOs, .. }
    ));
    assert!(matches!(
        report.results[&ArtifactId::from("busybox:latest")].outcome,
        ArtifactOutcome::Failed { kind: FailureKind::Inspection, .. }
    ));
    assert_eq!(report.eosl_count(), 1);
}

#[tokio::test]
async fn aggregation_is_order_independent() {
    let forward = runner(ScanOptions::default())
        .run(&images(&["debian:11", "centos:6", "haiku:r1"]))
        .await
        .unwrap();
    let backward = runner(ScanOptions::default())
        .run(&images(&["haiku:r1", "centos:6", "debian:11"]))
        .await
        .unwrap();

    assert_eq!(forward.results, backward.results);
    assert_eq!(forward.status, backward.status);
}

#[tokio::test]
async fn invalid_options_produce_no_report() {
    let options = ScanOptions {
        vuln_type: vec!["kernel".to_string()],
        ..Default::default()
    };
    let err = runner(options)
        .run(&images(&["debian:11"]))
        .await
        .unwrap_err();
    assert!(matches!(err, ScanError::Validation(_)));
}

struct BrokenSource;

#[async_trait]
impl ArtifactSource for BrokenSource {
    fn context(&self) -> String {
        "broken".to_string()
    }

    async fn list_artifacts(&self) -> anyhow::Result<Vec<Artifact>> {
        anyhow::bail!("registry unreachable")
    }
}

#[tokio::test]
async fn source_failure_aborts_run() {
    let err = runner(ScanOptions::default())
        .run(&BrokenSource)
        .await
        .unwrap_err();
    assert!(matches!(err, ScanError::ArtifactSource(_)));
    assert!(err.to_string().contains("registry unreachable"));
}

#[tokio::test]
async fn ignore_rules_filter_findings() {
    let runner = runner(ScanOptions::default()).with_ignore(IgnoreConfig {
        packages: vec![],
        vulnerabilities: vec!["CVE-2022-0778".to_string()],
    });
    let report = runner.run(&images(&["debian:11"])).await.unwrap();

    assert!(report.is_complete());
    let ids: Vec<&str> = report
        .vulnerabilities()
        .map(|v| v.vulnerability_id.as_str())
        .collect();
    assert_eq!(ids, vec!["CVE-2021-3711"]);
}

#[tokio::test]
async fn os_type_filter_skips_detection() {
    let options = ScanOptions {
        vuln_type: vec!["library".to_string()],
        list_all_packages: true,
        ..Default::default()
    };
    let report = runner(options).run(&images(&["haiku:r1"])).await.unwrap();

    // No OS detection means the unsupported family is never dispatched.
    assert!(report.is_complete());
    let haiku = report.results[&ArtifactId::from("haiku:r1")]
        .outcome
        .results()
        .unwrap();
    assert!(haiku.vulnerabilities.is_empty());
    assert_eq!(haiku.packages.len(), 1);
}

#[tokio::test]
async fn cluster_workloads_use_image_inventory() {
    let runner = runner(ScanOptions::default());
    let source = ClusterSource::new(StaticLister {
        cluster: "prod".to_string(),
        workloads: vec![Workload {
            namespace: "payments".to_string(),
            kind: "Deployment".to_string(),
            name: "api".to_string(),
            images: vec!["debian:11".to_string(), "debian:11".to_string()],
        }],
    });

    let report = runner.run(&source).await.unwrap();
    assert_eq!(report.context, "prod");
    assert!(report.is_complete());
    assert_eq!(report.results.len(), 1);
    assert!(report.results[&ArtifactId::from("payments/Deployment/api@debian:11")]
        .outcome
        .results()
        .is_some());
    assert_eq!(report.vulnerability_count(), 2);
}

/// Fails every match, standing in for a broken vulnerability database.
struct FailingDriver;

#[async_trait]
impl Driver for FailingDriver {
    fn is_supported_version(&self, _family: &str, _os_name: &str, _at: DateTime<Utc>) -> bool {
        true
    }

    async fn detect(
        &self,
        _os_name: &str,
        _repo: Option<&Repository>,
        _packages: &[Package],
    ) -> anyhow::Result<Vec<DetectedVulnerability>> {
        anyhow::bail!("advisory database is corrupt")
    }
}

#[tokio::test]
async fn detection_failure_is_isolated_from_siblings() {
    let mut inventory = inventory();
    inventory.artifacts.push(InventoryEntry {
        artifact: Artifact::image("alpine:3.19"),
        architecture: Some("amd64".to_string()),
        layers: vec![Layer {
            os: Some(OsIdentity::new("alpine", "3.19.1")),
            packages: vec![Package::new("musl", "1.2.4_git20230717-r4")],
            ..Default::default()
        }],
    });

    let registry = DriverRegistry::with_advisories(common::advisory_store())
        .register("alpine", Arc::new(FailingDriver))
        .build();
    let cache = Arc::new(MemoryCache::new());
    let runner = Runner::new(
        Arc::new(InventoryInspector::new(cache.clone(), inventory)),
        Arc::new(LocalScanner::new(cache, Detector::new(registry)).with_scan_time(scan_time())),
        ScanOptions::default(),
    );

    let report = runner
        .run(&images(&["alpine:3.19", "debian:11"]))
        .await
        .unwrap();

    assert_eq!(report.status, ReportStatus::Partial);
    assert_eq!(report.results.len(), 2);
    match &report.results[&ArtifactId::from("alpine:3.19")].outcome {
        ArtifactOutcome::Failed { kind, message } => {
            assert_eq!(*kind, FailureKind::DetectionFailure);
            assert!(message.contains("advisory database is corrupt"));
        }
        other => panic!("expected a detection failure, got {:?}", other),
    }

    let debian = report.results[&ArtifactId::from("debian:11")]
        .outcome
        .results()
        .unwrap();
    let ids: Vec<&str> = debian
        .vulnerabilities
        .iter()
        .map(|v| v.vulnerability_id.as_str())
        .collect();
    assert_eq!(ids, vec!["CVE-2021-3711", "CVE-2022-0778"]);
    assert!(!debian.eosl());
}
