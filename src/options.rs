//! Scan options consulted by the runner and detector.

use crate::error::ScanError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const VULN_TYPE_OS: &str = "os";
pub const VULN_TYPE_LIBRARY: &str = "library";

pub const CHECK_VULN: &str = "vuln";
pub const CHECK_CONFIG: &str = "config";
pub const CHECK_SECRET: &str = "secret";
pub const CHECK_LICENSE: &str = "license";

const VULN_TYPES: &[&str] = &[VULN_TYPE_OS, VULN_TYPE_LIBRARY];
const SECURITY_CHECKS: &[&str] = &[CHECK_VULN, CHECK_CONFIG, CHECK_SECRET, CHECK_LICENSE];
const LICENSE_CATEGORIES: &[&str] = &[
    "forbidden",
    "restricted",
    "reciprocal",
    "notice",
    "permissive",
    "unencumbered",
    "unknown",
];

/// Options for one scan run. Validated once, then passed by value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanOptions {
    /// Vulnerability types to report: `os`, `library`.
    pub vuln_type: Vec<String>,
    /// Check categories to run: `vuln`, `config`, `secret`, `license`.
    pub security_checks: Vec<String>,
    /// Keep packages the image removed in a later layer.
    pub scan_removed_packages: bool,
    /// Target platform override in `os/arch[/variant]` form.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    /// Include the full package inventory in results.
    pub list_all_packages: bool,
    /// License category -> license name patterns.
    pub license_categories: BTreeMap<String, Vec<String>>,
    /// Manifest discovery overrides in `analyzer:regex` form.
    pub file_patterns: Vec<String>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            vuln_type: vec![VULN_TYPE_OS.to_string(), VULN_TYPE_LIBRARY.to_string()],
            security_checks: vec![CHECK_VULN.to_string()],
            scan_removed_packages: false,
            platform: None,
            list_all_packages: false,
            license_categories: BTreeMap::new(),
            file_patterns: Vec::new(),
        }
    }
}

impl ScanOptions {
    pub fn has_check(&self, check: &str) -> bool {
        self.security_checks.iter().any(|c| c == check)
    }

    pub fn has_vuln_type(&self, vuln_type: &str) -> bool {
        self.vuln_type.iter().any(|t| t == vuln_type)
    }

    /// Whether OS package detection runs at all.
    pub fn scans_os_packages(&self) -> bool {
        self.has_check(CHECK_VULN) && self.has_vuln_type(VULN_TYPE_OS)
    }

    /// Rejects inconsistent combinations before any artifact is touched.
    pub fn validate(&self) -> Result<(), ScanError> {
        if self.security_checks.is_empty() {
            return Err(invalid("at least one security check is required"));
        }
        if let Some(unknown) = first_unknown(&self.security_checks, SECURITY_CHECKS) {
            return Err(invalid(format!(
                "unknown security check '{}' (expected one of: {})",
                unknown,
                SECURITY_CHECKS.join(", ")
            )));
        }
        if let Some(unknown) = first_unknown(&self.vuln_type, VULN_TYPES) {
            return Err(invalid(format!(
                "unknown vulnerability type '{}' (expected one of: {})",
                unknown,
                VULN_TYPES.join(", ")
            )));
        }
        if self.has_check(CHECK_VULN) && self.vuln_type.is_empty() {
            return Err(invalid(
                "the vuln check requires at least one vulnerability type",
            ));
        }

        if !self.license_categories.is_empty() && !self.has_check(CHECK_LICENSE) {
            return Err(invalid(
                "license categories are set but the license check is not enabled",
            ));
        }
        for category in self.license_categories.keys() {
            if !LICENSE_CATEGORIES.contains(&category.as_str()) {
                return Err(invalid(format!("unknown license category '{}'", category)));
            }
        }

        for pattern in &self.file_patterns {
            validate_file_pattern(pattern)?;
        }

        if let Some(platform) = &self.platform {
            validate_platform(platform)?;
        }

        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> ScanError {
    ScanError::Validation(message.into())
}

fn first_unknown<'a>(values: &'a [String], known: &[&str]) -> Option<&'a str> {
    values
        .iter()
        .map(String::as_str)
        .find(|v| !known.contains(v))
}

fn validate_file_pattern(pattern: &str) -> Result<(), ScanError> {
    let (analyzer, expr) = pattern.split_once(':').ok_or_else(|| {
        invalid(format!(
            "file pattern '{}' must be in analyzer:regex form",
            pattern
        ))
    })?;
    if analyzer.is_empty() || expr.is_empty() {
        return Err(invalid(format!(
            "file pattern '{}' must be in analyzer:regex form",
            pattern
        )));
    }
    regex::Regex::new(expr)
        .map_err(|e| invalid(format!("file pattern '{}' has an invalid regex: {}", pattern, e)))?;
    Ok(())
}

fn validate_platform(platform: &str) -> Result<(), ScanError> {
    let parts: Vec<&str> = platform.split('/').collect();
    if !(2..=3).contains(&parts.len()) || parts.iter().any(|p| p.is_empty()) {
        return Err(invalid(format!(
            "platform '{}' must be in os/arch[/variant] form",
            platform
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_invalid(options: ScanOptions, needle: &str) {
        match options.validate() {
            Err(ScanError::Validation(msg)) => {
                assert!(msg.contains(needle), "'{}' does not mention '{}'", msg, needle)
            }
            other => panic!("expected validation failure, got {:?}", other),
        }
    }

    #[test]
    fn test_default_is_valid() {
        let options = ScanOptions::default();
        assert!(options.validate().is_ok());
        assert!(options.scans_os_packages());
    }

    #[test]
    fn test_rejects_empty_and_unknown_checks() {
        assert_invalid(
            ScanOptions {
                security_checks: vec![],
                ..Default::default()
            },
            "at least one security check",
        );
        assert_invalid(
            ScanOptions {
                security_checks: vec!["vuln".into(), "rootkit".into()],
                ..Default::default()
            },
            "rootkit",
        );
    }

    #[test]
    fn test_vuln_check_needs_types() {
        assert_invalid(
            ScanOptions {
                vuln_type: vec![],
                ..Default::default()
            },
            "vulnerability type",
        );
        assert_invalid(
            ScanOptions {
                vuln_type: vec!["kernel".into()],
                ..Default::default()
            },
            "kernel",
        );

        let secrets_only = ScanOptions {
            vuln_type: vec![],
            security_checks: vec!["secret".into()],
            ..Default::default()
        };
        assert!(secrets_only.validate().is_ok());
        assert!(!secrets_only.scans_os_packages());
    }

    #[test]
    fn test_license_categories_need_license_check() {
        let mut categories = BTreeMap::new();
        categories.insert("forbidden".to_string(), vec!["AGPL-3.0".to_string()]);

        assert_invalid(
            ScanOptions {
                license_categories: categories.clone(),
                ..Default::default()
            },
            "license check",
        );

        let ok = ScanOptions {
            security_checks: vec!["vuln".into(), "license".into()],
            license_categories: categories.clone(),
            ..Default::default()
        };
        assert!(ok.validate().is_ok());

        categories.insert("spicy".to_string(), vec![]);
        assert_invalid(
            ScanOptions {
                security_checks: vec!["license".into()],
                license_categories: categories,
                ..Default::default()
            },
            "spicy",
        );
    }

    #[test]
    fn test_file_patterns() {
        let ok = ScanOptions {
            file_patterns: vec![r"dpkg:var/lib/dpkg/status\.d/.*".into()],
            ..Default::default()
        };
        assert!(ok.validate().is_ok());

        assert_invalid(
            ScanOptions {
                file_patterns: vec!["no-separator".into()],
                ..Default::default()
            },
            "analyzer:regex",
        );
        assert_invalid(
            ScanOptions {
                file_patterns: vec!["apk:lib/apk/(db".into()],
                ..Default::default()
            },
            "invalid regex",
        );
    }

    #[test]
    fn test_platform() {
        for ok in ["linux/amd64", "linux/arm64/v8"] {
            let options = ScanOptions {
                platform: Some(ok.into()),
                ..Default::default()
            };
            assert!(options.validate().is_ok(), "{}", ok);
        }
        for bad in ["linux", "linux/", "a/b/c/d"] {
            assert_invalid(
                ScanOptions {
                    platform: Some(bad.into()),
                    ..Default::default()
                },
                "os/arch",
            );
        }
    }

    #[test]
    fn test_toml_defaults() {
        let options: ScanOptions = toml::from_str("list_all_packages = true").unwrap();
        assert!(options.list_all_packages);
        assert_eq!(options.security_checks, vec!["vuln".to_string()]);
    }
}
