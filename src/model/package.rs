use serde::{Deserialize, Serialize};

/// One installed OS package as produced by the analysis layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub release: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epoch: Option<u32>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub arch: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub src_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub src_version: String,
    /// Content identity of the layer that installed this package.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer: Option<String>,
}

impl Package {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            release: String::new(),
            epoch: None,
            arch: String::new(),
            src_name: String::new(),
            src_version: String::new(),
            layer: None,
        }
    }

    pub fn with_source(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.src_name = name.into();
        self.src_version = version.into();
        self
    }

    pub fn with_release(mut self, release: impl Into<String>) -> Self {
        self.release = release.into();
        self
    }

    pub fn with_arch(mut self, arch: impl Into<String>) -> Self {
        self.arch = arch.into();
        self
    }

    pub fn with_layer(mut self, layer: impl Into<String>) -> Self {
        self.layer = Some(layer.into());
        self
    }

    /// Name used for advisory lookups: the source package when known.
    pub fn advisory_name(&self) -> &str {
        if self.src_name.is_empty() {
            &self.name
        } else {
            &self.src_name
        }
    }

    /// Version compared against advisories. Pairs with [`advisory_name`]:
    /// the source version when matching by source package, since binary
    /// and source versions can differ (epochs, binNMU suffixes).
    ///
    /// [`advisory_name`]: Package::advisory_name
    pub fn advisory_version(&self) -> String {
        if self.src_name.is_empty() || self.src_version.is_empty() {
            self.full_version()
        } else {
            self.src_version.clone()
        }
    }

    /// Full installed version in `epoch:version-release` form.
    pub fn full_version(&self) -> String {
        let mut out = String::new();
        if let Some(epoch) = self.epoch.filter(|e| *e > 0) {
            out.push_str(&format!("{}:", epoch));
        }
        out.push_str(&self.version);
        if !self.release.is_empty() {
            out.push('-');
            out.push_str(&self.release);
        }
        out
    }
}

/// Distribution release hosting a package set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OsIdentity {
    pub family: String,
    pub name: String,
    /// Set when the release is past its vendor support window.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub eosl: bool,
}

impl OsIdentity {
    pub fn new(family: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            family: family.into(),
            name: name.into(),
            eosl: false,
        }
    }

    pub fn is_detected(&self) -> bool {
        !self.family.is_empty()
    }
}

impl std::fmt::Display for OsIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.family, self.name)
    }
}

/// Repository/channel hints refining matching for some families.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub family: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub release: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advisory_name_prefers_source() {
        let pkg = Package::new("libssl1.1", "1.1.1k-1").with_source("openssl", "1.1.1k-1");
        assert_eq!(pkg.advisory_name(), "openssl");

        let pkg = Package::new("openssl", "1.1.1k-1");
        assert_eq!(pkg.advisory_name(), "openssl");
    }

    #[test]
    fn test_advisory_version_follows_advisory_name() {
        let pkg = Package::new("libgcc-s1", "1:10.2.1-6").with_source("gcc-10", "10.2.1-6");
        assert_eq!(pkg.advisory_version(), "10.2.1-6");

        let pkg = Package::new("libgcc-s1", "1:10.2.1-6").with_source("gcc-10", "");
        assert_eq!(pkg.advisory_version(), "1:10.2.1-6");

        let pkg = Package::new("zlib1g", "1.2.11").with_release("2");
        assert_eq!(pkg.advisory_version(), "1.2.11-2");
    }

    #[test]
    fn test_full_version() {
        let mut pkg = Package::new("bash", "4.2.46").with_release("34.el7");
        assert_eq!(pkg.full_version(), "4.2.46-34.el7");

        pkg.epoch = Some(1);
        assert_eq!(pkg.full_version(), "1:4.2.46-34.el7");

        pkg.epoch = Some(0);
        assert_eq!(pkg.full_version(), "4.2.46-34.el7");
    }

    #[test]
    fn test_package_deserialize_minimal() {
        let pkg: Package = serde_json::from_str(r#"{"name":"zlib","version":"1.2.11"}"#).unwrap();
        assert_eq!(pkg, Package::new("zlib", "1.2.11"));
    }
}
