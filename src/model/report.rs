use super::{Artifact, ArtifactId, DetectedVulnerability, OsIdentity, Package, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Detection output for one artifact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanResults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<OsIdentity>,
    #[serde(default)]
    pub vulnerabilities: Vec<DetectedVulnerability>,
    /// Full inventory, populated only when all packages were requested.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub packages: Vec<Package>,
}

impl ScanResults {
    pub fn eosl(&self) -> bool {
        self.os.as_ref().map(|os| os.eosl).unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    UnsupportedOs,
    DetectionFailure,
    CacheMiss,
    Inspection,
    Remote,
    Timeout,
    Cancelled,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureKind::UnsupportedOs => "unsupported os",
            FailureKind::DetectionFailure => "detection failure",
            FailureKind::CacheMiss => "cache miss",
            FailureKind::Inspection => "inspection failure",
            FailureKind::Remote => "remote scan failure",
            FailureKind::Timeout => "timeout",
            FailureKind::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ArtifactOutcome {
    Scanned(ScanResults),
    Failed { kind: FailureKind, message: String },
}

impl ArtifactOutcome {
    pub fn failed(kind: FailureKind, message: impl Into<String>) -> Self {
        ArtifactOutcome::Failed {
            kind,
            message: message.into(),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ArtifactOutcome::Failed { .. })
    }

    pub fn results(&self) -> Option<&ScanResults> {
        match self {
            ArtifactOutcome::Scanned(results) => Some(results),
            ArtifactOutcome::Failed { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactResult {
    pub artifact: Artifact,
    #[serde(flatten)]
    pub outcome: ArtifactOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Complete,
    Partial,
}

/// Aggregated results of one run, keyed by artifact identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub context: String,
    pub created_at: DateTime<Utc>,
    pub status: ReportStatus,
    pub results: BTreeMap<ArtifactId, ArtifactResult>,
}

impl Report {
    pub fn new(context: impl Into<String>, results: BTreeMap<ArtifactId, ArtifactResult>) -> Self {
        let status = if results.values().any(|r| r.outcome.is_failed()) {
            ReportStatus::Partial
        } else {
            ReportStatus::Complete
        };

        Self {
            context: context.into(),
            created_at: Utc::now(),
            status,
            results,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status == ReportStatus::Complete
    }

    pub fn failed(&self) -> impl Iterator<Item = &ArtifactResult> {
        self.results.values().filter(|r| r.outcome.is_failed())
    }

    pub fn vulnerabilities(&self) -> impl Iterator<Item = &DetectedVulnerability> {
        self.results
            .values()
            .filter_map(|r| r.outcome.results())
            .flat_map(|r| r.vulnerabilities.iter())
    }

    pub fn vulnerability_count(&self) -> usize {
        self.vulnerabilities().count()
    }

    pub fn max_severity(&self) -> Option<Severity> {
        self.vulnerabilities().map(|v| v.severity).max()
    }

    pub fn eosl_count(&self) -> usize {
        self.results
            .values()
            .filter_map(|r| r.outcome.results())
            .filter(|r| r.eosl())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scanned(id: &str, severity: Severity) -> ArtifactResult {
        ArtifactResult {
            artifact: Artifact::image(id),
            outcome: ArtifactOutcome::Scanned(ScanResults {
                os: Some(OsIdentity::new("alpine", "3.19.1")),
                vulnerabilities: vec![DetectedVulnerability {
                    vulnerability_id: "CVE-2024-0001".to_string(),
                    pkg_name: "musl".to_string(),
                    installed_version: "1.2.4-r2".to_string(),
                    fixed_version: Some("1.2.4-r3".to_string()),
                    severity,
                    title: None,
                    layer: None,
                    data_source: "alpine".to_string(),
                }],
                packages: vec![],
            }),
        }
    }

    #[test]
    fn test_report_complete() {
        let mut results = BTreeMap::new();
        results.insert(ArtifactId::from("a"), scanned("a", Severity::High));
        results.insert(ArtifactId::from("b"), scanned("b", Severity::Low));

        let report = Report::new("ctx", results);
        assert!(report.is_complete());
        assert_eq!(report.vulnerability_count(), 2);
        assert_eq!(report.max_severity(), Some(Severity::High));
    }

    #[test]
    fn test_report_partial() {
        let mut results = BTreeMap::new();
        results.insert(ArtifactId::from("a"), scanned("a", Severity::Medium));
        results.insert(
            ArtifactId::from("b"),
            ArtifactResult {
                artifact: Artifact::image("b"),
                outcome: ArtifactOutcome::failed(FailureKind::UnsupportedOs, "unsupported os"),
            },
        );

        let report = Report::new("ctx", results);
        assert_eq!(report.status, ReportStatus::Partial);
        assert_eq!(report.failed().count(), 1);
        assert_eq!(report.vulnerability_count(), 1);
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = ArtifactOutcome::failed(FailureKind::CacheMiss, "blob sha256:aa missing");
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["kind"], "cache_miss");
    }
}
