use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Distribution families with a built-in driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OsFamily {
    #[serde(rename = "alpine")]
    Alpine,
    #[serde(rename = "alma")]
    Alma,
    #[serde(rename = "amazon")]
    Amazon,
    #[serde(rename = "cbl-mariner")]
    CblMariner,
    #[serde(rename = "debian")]
    Debian,
    #[serde(rename = "ubuntu")]
    Ubuntu,
    #[serde(rename = "redhat")]
    RedHat,
    #[serde(rename = "centos")]
    CentOS,
    #[serde(rename = "rocky")]
    Rocky,
    #[serde(rename = "oracle")]
    Oracle,
    #[serde(rename = "opensuse.leap")]
    OpenSuseLeap,
    #[serde(rename = "suse linux enterprise server")]
    Sles,
    #[serde(rename = "photon")]
    Photon,
}

impl OsFamily {
    pub const ALL: [OsFamily; 13] = [
        OsFamily::Alpine,
        OsFamily::Alma,
        OsFamily::Amazon,
        OsFamily::CblMariner,
        OsFamily::Debian,
        OsFamily::Ubuntu,
        OsFamily::RedHat,
        OsFamily::CentOS,
        OsFamily::Rocky,
        OsFamily::Oracle,
        OsFamily::OpenSuseLeap,
        OsFamily::Sles,
        OsFamily::Photon,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OsFamily::Alpine => "alpine",
            OsFamily::Alma => "alma",
            OsFamily::Amazon => "amazon",
            OsFamily::CblMariner => "cbl-mariner",
            OsFamily::Debian => "debian",
            OsFamily::Ubuntu => "ubuntu",
            OsFamily::RedHat => "redhat",
            OsFamily::CentOS => "centos",
            OsFamily::Rocky => "rocky",
            OsFamily::Oracle => "oracle",
            OsFamily::OpenSuseLeap => "opensuse.leap",
            OsFamily::Sles => "suse linux enterprise server",
            OsFamily::Photon => "photon",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            OsFamily::Alpine => "Alpine Linux",
            OsFamily::Alma => "AlmaLinux",
            OsFamily::Amazon => "Amazon Linux",
            OsFamily::CblMariner => "CBL-Mariner",
            OsFamily::Debian => "Debian",
            OsFamily::Ubuntu => "Ubuntu",
            OsFamily::RedHat => "Red Hat Enterprise Linux",
            OsFamily::CentOS => "CentOS",
            OsFamily::Rocky => "Rocky Linux",
            OsFamily::Oracle => "Oracle Linux",
            OsFamily::OpenSuseLeap => "openSUSE Leap",
            OsFamily::Sles => "SUSE Linux Enterprise Server",
            OsFamily::Photon => "Photon OS",
        }
    }

    /// Family whose advisories apply to this one. CentOS reuses Red Hat data.
    pub fn advisory_family(&self) -> OsFamily {
        match self {
            OsFamily::CentOS => OsFamily::RedHat,
            other => *other,
        }
    }
}

impl std::fmt::Display for OsFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OsFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        OsFamily::ALL
            .iter()
            .copied()
            .find(|f| f.as_str() == normalized)
            .or(match normalized.as_str() {
                "sles" => Some(OsFamily::Sles),
                "mariner" => Some(OsFamily::CblMariner),
                "rhel" => Some(OsFamily::RedHat),
                _ => None,
            })
            .ok_or_else(|| format!("Unknown OS family: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trips_every_family() {
        for family in OsFamily::ALL {
            assert_eq!(family.as_str().parse::<OsFamily>(), Ok(family));
        }
    }

    #[test]
    fn test_parse_case_insensitive_and_aliases() {
        assert_eq!("Debian".parse::<OsFamily>(), Ok(OsFamily::Debian));
        assert_eq!("SLES".parse::<OsFamily>(), Ok(OsFamily::Sles));
        assert_eq!("rhel".parse::<OsFamily>(), Ok(OsFamily::RedHat));
        assert!("debain".parse::<OsFamily>().is_err());
    }

    #[test]
    fn test_centos_uses_redhat_advisories() {
        assert_eq!(OsFamily::CentOS.advisory_family(), OsFamily::RedHat);
        assert_eq!(OsFamily::Rocky.advisory_family(), OsFamily::Rocky);
    }
}
