use super::version::is_lower;
use super::{Driver, OsFamily, SupportWindow};
use crate::model::{DetectedVulnerability, Package, Repository, Severity};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// One advisory entry for a package on a platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advisory {
    pub vulnerability_id: String,
    /// `None` means the vendor has not shipped a fix yet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_version: Option<String>,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Read access to a vulnerability data snapshot.
///
/// `platform` is `"<family> <release>"`, e.g. `"debian 11"` or `"alpine 3.19"`.
#[async_trait]
pub trait AdvisoryStore: Send + Sync {
    async fn advisories(&self, platform: &str, package: &str) -> Result<Vec<Advisory>>;
}

/// Serialized form of a snapshot: platform -> package -> advisories.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdvisorySnapshot {
    #[serde(default)]
    pub platforms: HashMap<String, HashMap<String, Vec<Advisory>>>,
}

/// In-memory advisory snapshot.
#[derive(Debug, Default)]
pub struct MemoryAdvisoryStore {
    entries: HashMap<String, HashMap<String, Vec<Advisory>>>,
}

impl MemoryAdvisoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: AdvisorySnapshot) -> Self {
        Self {
            entries: snapshot.platforms,
        }
    }

    /// Loads a JSON snapshot from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read advisory snapshot {}", path.display()))?;
        let snapshot: AdvisorySnapshot = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse advisory snapshot {}", path.display()))?;
        Ok(Self::from_snapshot(snapshot))
    }

    pub fn insert(&mut self, platform: &str, package: &str, advisory: Advisory) {
        self.entries
            .entry(platform.to_string())
            .or_default()
            .entry(package.to_string())
            .or_default()
            .push(advisory);
    }

    pub fn with(mut self, platform: &str, package: &str, advisory: Advisory) -> Self {
        self.insert(platform, package, advisory);
        self
    }
}

#[async_trait]
impl AdvisoryStore for MemoryAdvisoryStore {
    async fn advisories(&self, platform: &str, package: &str) -> Result<Vec<Advisory>> {
        Ok(self
            .entries
            .get(platform)
            .and_then(|packages| packages.get(package))
            .cloned()
            .unwrap_or_default())
    }
}

/// Driver backed by an [`AdvisoryStore`] and the family's support calendar.
pub struct AdvisoryDriver {
    family: OsFamily,
    store: Arc<dyn AdvisoryStore>,
}

impl AdvisoryDriver {
    pub fn new(family: OsFamily, store: Arc<dyn AdvisoryStore>) -> Self {
        Self { family, store }
    }

    pub fn family(&self) -> OsFamily {
        self.family
    }

    /// Resolves the advisory platform for a release.
    ///
    /// Alpine images frequently pin a newer repository than the base
    /// release, so an Alpine repository hint takes precedence.
    fn platform(&self, os_name: &str, repo: Option<&Repository>) -> Option<String> {
        let window = SupportWindow::for_family(self.family);
        let release = match repo {
            Some(repo) if self.family == OsFamily::Alpine && !repo.release.is_empty() => {
                window.release_key(&repo.release)
            }
            _ => None,
        }
        .or_else(|| window.release_key(os_name))?;

        Some(format!("{} {}", self.family.as_str(), release))
    }
}

#[async_trait]
impl Driver for AdvisoryDriver {
    fn is_supported_version(&self, family: &str, os_name: &str, at: DateTime<Utc>) -> bool {
        // A shared driver classifies against the calendar of the family asked about.
        let family = family.parse::<OsFamily>().unwrap_or(self.family);
        SupportWindow::for_family(family).is_supported_at(os_name, at)
    }

    async fn detect(
        &self,
        os_name: &str,
        repo: Option<&Repository>,
        packages: &[Package],
    ) -> Result<Vec<DetectedVulnerability>> {
        let Some(platform) = self.platform(os_name, repo) else {
            tracing::debug!(family = %self.family, os = %os_name, "No advisory platform for release");
            return Ok(Vec::new());
        };

        let mut detected = Vec::new();
        for package in packages {
            let advisories = self
                .store
                .advisories(&platform, package.advisory_name())
                .await
                .with_context(|| {
                    format!("failed to get advisories for {} on {}", package.name, platform)
                })?;

            let installed = package.full_version();
            let compared = package.advisory_version();
            for advisory in advisories {
                let affected = match &advisory.fixed_version {
                    Some(fixed) => is_lower(&compared, fixed),
                    None => true,
                };
                if !affected {
                    continue;
                }

                detected.push(DetectedVulnerability {
                    vulnerability_id: advisory.vulnerability_id,
                    pkg_name: package.name.clone(),
                    installed_version: installed.clone(),
                    fixed_version: advisory.fixed_version,
                    severity: advisory.severity,
                    title: advisory.title,
                    layer: package.layer.clone(),
                    data_source: self.family.as_str().to_string(),
                });
            }
        }

        detected.sort_by(|a, b| {
            (&a.pkg_name, &a.installed_version, &a.vulnerability_id).cmp(&(
                &b.pkg_name,
                &b.installed_version,
                &b.vulnerability_id,
            ))
        });
        detected.dedup_by(|a, b| {
            a.pkg_name == b.pkg_name
                && a.installed_version == b.installed_version
                && a.vulnerability_id == b.vulnerability_id
        });

        Ok(detected)
    }
}
