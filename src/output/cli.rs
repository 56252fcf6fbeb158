use crate::model::{ArtifactOutcome, ArtifactResult, Report, ReportStatus, Severity};
use anyhow::Result;
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
struct ArtifactRow {
    #[tabled(rename = "Artifact")]
    artifact: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "OS")]
    os: String,
    #[tabled(rename = "Vulns")]
    vulnerabilities: String,
    #[tabled(rename = "Status")]
    status: String,
}

#[derive(Tabled)]
struct VulnRow {
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Package")]
    package: String,
    #[tabled(rename = "Installed")]
    installed: String,
    #[tabled(rename = "Vulnerability")]
    id: String,
    #[tabled(rename = "Fixed In")]
    fixed_in: String,
    #[tabled(rename = "Title")]
    title: String,
}

pub fn print_cli_table(report: &Report) -> Result<()> {
    println!();
    println!(
        "Scan of {} completed at: {}",
        report.context,
        report.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!();

    if report.results.is_empty() {
        println!("No artifacts found.");
        return Ok(());
    }

    let rows: Vec<ArtifactRow> = report.results.values().map(artifact_row).collect();
    println!("Scanned {} artifacts:", rows.len());
    println!();
    println!("{}", Table::new(rows).with(Style::rounded()));

    for result in report.results.values() {
        let Some(results) = result.outcome.results() else {
            continue;
        };
        if results.vulnerabilities.is_empty() {
            continue;
        }

        let mut vulns = results.vulnerabilities.clone();
        vulns.sort_by(|a, b| b.severity.cmp(&a.severity));

        println!();
        println!("{} ({} vulnerabilities):", result.artifact.id, vulns.len());
        println!();

        let rows: Vec<VulnRow> = vulns
            .iter()
            .map(|v| VulnRow {
                severity: format_severity(&v.severity),
                package: truncate(&v.pkg_name, 30),
                installed: truncate(&v.installed_version, 30),
                id: v.vulnerability_id.clone(),
                fixed_in: v.fixed_version.clone().unwrap_or_else(|| "-".to_string()),
                title: truncate(v.title.as_deref().unwrap_or(""), 50),
            })
            .collect();
        println!("{}", Table::new(rows).with(Style::rounded()));
    }

    let failed: Vec<&ArtifactResult> = report.failed().collect();
    if !failed.is_empty() {
        println!();
        println!("Failed to scan {} artifacts:", failed.len());
        for result in failed {
            if let ArtifactOutcome::Failed { kind, message } = &result.outcome {
                println!("  {} [{}]: {}", result.artifact.id, kind, message);
            }
        }
    }

    println!();
    print_summary(report);
    Ok(())
}

fn artifact_row(result: &ArtifactResult) -> ArtifactRow {
    let (os, vulnerabilities, status) = match &result.outcome {
        ArtifactOutcome::Scanned(results) => {
            let os = match &results.os {
                Some(os) if os.eosl => format!("{} (EOSL)", os),
                Some(os) => os.to_string(),
                None => "-".to_string(),
            };
            (os, results.vulnerabilities.len().to_string(), "ok".to_string())
        }
        ArtifactOutcome::Failed { kind, .. } => {
            ("-".to_string(), "-".to_string(), format!("\x1b[31m{}\x1b[0m", kind))
        }
    };

    ArtifactRow {
        artifact: truncate(result.artifact.id.as_str(), 60),
        kind: result.artifact.kind.label().to_string(),
        os,
        vulnerabilities,
        status,
    }
}

fn format_severity(severity: &Severity) -> String {
    match severity {
        Severity::Critical => "\x1b[31mCRITICAL\x1b[0m".to_string(),
        Severity::High => "\x1b[91mHIGH\x1b[0m".to_string(),
        Severity::Medium => "\x1b[33mMEDIUM\x1b[0m".to_string(),
        Severity::Low => "\x1b[32mLOW\x1b[0m".to_string(),
        Severity::Unknown => "UNKNOWN".to_string(),
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

fn severity_counts(report: &Report) -> [usize; 4] {
    let mut counts = [0; 4];
    for vuln in report.vulnerabilities() {
        match vuln.severity {
            Severity::Critical => counts[0] += 1,
            Severity::High => counts[1] += 1,
            Severity::Medium => counts[2] += 1,
            Severity::Low => counts[3] += 1,
            Severity::Unknown => {}
        }
    }
    counts
}

fn print_summary(report: &Report) {
    let [critical, high, medium, low] = severity_counts(report);

    println!("Summary:");
    println!("  Artifacts: {}", report.results.len());
    if report.status == ReportStatus::Partial {
        println!("  Failed: {}", report.failed().count());
    }
    println!(
        "  Vulnerabilities: {} ({} critical, {} high, {} medium, {} low)",
        report.vulnerability_count(),
        critical,
        high,
        medium,
        low
    );
    let eosl = report.eosl_count();
    if eosl > 0 {
        println!("  End-of-support OS releases: {}", eosl);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        Artifact, ArtifactId, DetectedVulnerability, FailureKind, OsIdentity, ScanResults,
    };
    use std::collections::BTreeMap;

    fn report() -> Report {
        let mut os = OsIdentity::new("centos", "6.10");
        os.eosl = true;
        let scanned = ArtifactResult {
            artifact: Artifact::image("centos:6"),
            outcome: ArtifactOutcome::Scanned(ScanResults {
                os: Some(os),
                vulnerabilities: vec![DetectedVulnerability {
                    vulnerability_id: "CVE-2021-3156".to_string(),
                    pkg_name: "sudo".to_string(),
                    installed_version: "1.8.6p3-29.el6_10.3".to_string(),
                    fixed_version: None,
                    severity: Severity::High,
                    title: Some("heap-based buffer overflow".to_string()),
                    layer: None,
                    data_source: "redhat".to_string(),
                }],
                packages: vec![],
            }),
        };
        let failed = ArtifactResult {
            artifact: Artifact::image("plan9:4"),
            outcome: ArtifactOutcome::failed(FailureKind::UnsupportedOs, "unsupported os: plan9"),
        };

        let mut results = BTreeMap::new();
        results.insert(ArtifactId::from("centos:6"), scanned);
        results.insert(ArtifactId::from("plan9:4"), failed);
        Report::new("test", results)
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("openssl", 10), "openssl");
        assert_eq!(truncate("a-very-long-package-name", 10), "a-very-...");
        assert_eq!(truncate("ünïcödé-pàckâgé", 8), "ünïcö...");
    }

    #[test]
    fn test_artifact_rows() {
        let report = report();
        let rows: Vec<ArtifactRow> = report.results.values().map(artifact_row).collect();

        assert_eq!(rows[0].os, "centos 6.10 (EOSL)");
        assert_eq!(rows[0].vulnerabilities, "1");
        assert_eq!(rows[0].status, "ok");
        assert_eq!(rows[1].os, "-");
        assert!(rows[1].status.contains("unsupported os"));
    }

    #[test]
    fn test_severity_counts() {
        assert_eq!(severity_counts(&report()), [0, 1, 0, 0]);
    }

    #[test]
    fn test_print_does_not_fail() {
        assert!(print_cli_table(&report()).is_ok());
    }
}
