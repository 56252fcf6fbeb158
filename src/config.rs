//! Configuration file handling.
//!
//! This module provides loading and saving of fleetscan configuration
//! from a TOML file.
//!
//! # Configuration Location
//!
//! The configuration file is stored at:
//! - Linux: `~/.config/fleetscan/config.toml`
//! - macOS: `~/Library/Application Support/fleetscan/config.toml`
//! - Windows: `%APPDATA%\fleetscan\config.toml`
//!
//! # Example Configuration
//!
//! ```toml
//! concurrency = 8
//! artifact_timeout_secs = 300
//!
//! [server]
//! listen = "127.0.0.1:4954"
//! token_header = "Fleetscan-Token"
//!
//! [remote]
//! url = "http://scanner.internal:4954"
//!
//! [options]
//! vuln_type = ["os"]
//! security_checks = ["vuln"]
//!
//! [ignore]
//! packages = ["linux-libc-dev", "kernel-*"]
//! vulnerabilities = ["CVE-2021-12345"]
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::model::DetectedVulnerability;
use crate::options::ScanOptions;

/// Application configuration.
///
/// Loaded from a TOML file, or created with default values when the file
/// does not exist.
///
/// # Example
///
/// ```no_run
/// use fleetscan::Config;
///
/// let config = Config::load().unwrap();
///
/// println!("Workers: {}", config.concurrency);
/// println!("Timeout: {}s", config.artifact_timeout_secs);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Number of artifacts scanned in parallel.
    ///
    /// Default: 5
    pub concurrency: usize,

    /// Per-artifact timeout, in seconds. Zero disables the timeout.
    ///
    /// Default: 300
    pub artifact_timeout_secs: u64,

    /// Directory of the filesystem artifact cache.
    ///
    /// Default: the platform cache directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,

    pub server: ServerConfig,

    pub remote: RemoteConfig,

    /// Default scan options.
    pub options: ScanOptions,

    /// Ignore list configuration for suppressing known issues.
    pub ignore: IgnoreConfig,
}

/// Settings for `fleetscan server`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the scan service binds to.
    pub listen: String,

    /// Shared token clients must present. Unset means no check.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Header carrying the token.
    pub token_header: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:4954".to_string(),
            token: None,
            token_header: crate::rpc::DEFAULT_TOKEN_HEADER.to_string(),
        }
    }
}

/// Settings for scanning through a remote service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Base URL of the scan service. Unset means scan locally.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Configuration for ignoring specific packages or vulnerabilities.
///
/// Use this to suppress known false positives or accepted risks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IgnoreConfig {
    /// Package names whose findings are dropped.
    ///
    /// Supports glob patterns (e.g., "kernel-*", "*-doc").
    pub packages: Vec<String>,

    /// Vulnerability IDs to ignore (e.g., "CVE-2021-12345").
    pub vulnerabilities: Vec<String>,
}

impl IgnoreConfig {
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty() && self.vulnerabilities.is_empty()
    }

    /// Check if a package should be ignored.
    pub fn should_ignore_package(&self, name: &str) -> bool {
        self.packages.iter().any(|pattern| {
            if pattern.contains('*') {
                glob_match(pattern, name)
            } else {
                pattern == name
            }
        })
    }

    /// Check if a vulnerability should be ignored.
    pub fn should_ignore_vulnerability(&self, vuln_id: &str) -> bool {
        self.vulnerabilities.iter().any(|id| id == vuln_id)
    }

    /// Check if a finding should be dropped from the report.
    pub fn should_ignore(&self, vuln: &DetectedVulnerability) -> bool {
        self.should_ignore_vulnerability(&vuln.vulnerability_id)
            || self.should_ignore_package(&vuln.pkg_name)
    }
}

/// Simple glob matching (supports * as wildcard).
fn glob_match(pattern: &str, text: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();

    if parts.len() == 1 {
        return pattern == text;
    }

    let mut remaining = text;

    // Check prefix (before first *)
    if !parts[0].is_empty() {
        if !remaining.starts_with(parts[0]) {
            return false;
        }
        remaining = &remaining[parts[0].len()..];
    }

    // Check suffix (after last *)
    let last_part = parts[parts.len() - 1];
    if !last_part.is_empty() {
        if !remaining.ends_with(last_part) {
            return false;
        }
        remaining = &remaining[..remaining.len() - last_part.len()];
    }

    for part in &parts[1..parts.len() - 1] {
        if part.is_empty() {
            continue;
        }
        if let Some(pos) = remaining.find(part) {
            remaining = &remaining[pos + part.len()..];
        } else {
            return false;
        }
    }

    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            concurrency: 5,
            artifact_timeout_secs: 300,
            cache_dir: None,
            server: ServerConfig::default(),
            remote: RemoteConfig::default(),
            options: ScanOptions::default(),
            ignore: IgnoreConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the config file.
    ///
    /// If the config file doesn't exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Loads configuration from an explicit path, with the same fallback.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        Ok(config)
    }

    /// Like [`Config::load`], but a file that cannot be read or parsed is
    /// logged and replaced by the defaults.
    pub fn load_or_default() -> Self {
        Self::load_or_default_from(&Self::config_path())
    }

    pub fn load_or_default_from(path: &Path) -> Self {
        Self::load_from(path).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), "Ignoring unreadable config: {:#}", e);
            Self::default()
        })
    }

    /// Saves the configuration to the config file.
    ///
    /// Creates the parent directory if it doesn't exist.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Returns the path to the configuration file.
    ///
    /// # Example
    ///
    /// ```
    /// use fleetscan::Config;
    ///
    /// let path = Config::config_path();
    /// println!("Config file: {}", path.display());
    /// ```
    pub fn config_path() -> PathBuf {
        crate::platform::config_dir().join("config.toml")
    }

    /// Cache directory, configured or the platform default.
    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(crate::platform::cache_dir)
    }

    /// Generates a string containing the default configuration.
    pub fn generate_default_config() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}
