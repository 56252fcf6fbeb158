//! End-of-support calendars per OS family.
//!
//! Every family has a table mapping a release key to the last day the
//! vendor ships security updates for it. A release is supported when it is
//! listed and the scan time falls on or before that day. Anything that
//! cannot be keyed (empty, malformed, or a release newer than the table)
//! is reported as unsupported.

use super::OsFamily;
use chrono::{DateTime, NaiveDate, Utc};

type Calendar = &'static [(&'static str, (i32, u32, u32))];

const ALPINE: Calendar = &[
    ("2.0", (2012, 4, 1)),
    ("3.0", (2016, 5, 1)),
    ("3.1", (2016, 11, 1)),
    ("3.2", (2017, 5, 1)),
    ("3.3", (2017, 11, 1)),
    ("3.4", (2018, 5, 1)),
    ("3.5", (2018, 11, 1)),
    ("3.6", (2019, 5, 1)),
    ("3.7", (2019, 11, 1)),
    ("3.8", (2020, 5, 1)),
    ("3.9", (2020, 11, 1)),
    ("3.10", (2021, 5, 1)),
    ("3.11", (2021, 11, 1)),
    ("3.12", (2022, 5, 1)),
    ("3.13", (2022, 11, 1)),
    ("3.14", (2023, 5, 1)),
    ("3.15", (2023, 11, 1)),
    ("3.16", (2024, 5, 23)),
    ("3.17", (2024, 11, 22)),
    ("3.18", (2025, 5, 9)),
    ("3.19", (2025, 11, 1)),
    ("3.20", (2026, 4, 1)),
    ("3.21", (2026, 11, 1)),
    ("3.22", (2027, 5, 1)),
];

const DEBIAN: Calendar = &[
    ("7", (2018, 5, 31)),
    ("8", (2020, 6, 30)),
    ("9", (2022, 6, 30)),
    ("10", (2024, 6, 30)),
    ("11", (2026, 8, 31)),
    ("12", (2028, 6, 10)),
    ("13", (2030, 6, 10)),
];

const UBUNTU: Calendar = &[
    ("12.04", (2019, 4, 26)),
    ("14.04", (2024, 4, 25)),
    ("16.04", (2026, 4, 23)),
    ("18.04", (2028, 5, 31)),
    ("20.04", (2030, 4, 23)),
    ("21.10", (2022, 7, 14)),
    ("22.04", (2032, 4, 23)),
    ("22.10", (2023, 7, 20)),
    ("23.04", (2024, 1, 20)),
    ("23.10", (2024, 7, 12)),
    ("24.04", (2034, 4, 25)),
    ("24.10", (2025, 7, 10)),
    ("25.04", (2026, 1, 15)),
];

const REDHAT: Calendar = &[
    ("4", (2017, 5, 31)),
    ("5", (2020, 11, 30)),
    ("6", (2024, 6, 30)),
    ("7", (2026, 6, 30)),
    ("8", (2029, 5, 31)),
    ("9", (2032, 5, 31)),
];

const CENTOS: Calendar = &[
    ("3", (2010, 10, 31)),
    ("4", (2012, 2, 29)),
    ("5", (2017, 3, 31)),
    ("6", (2020, 11, 30)),
    ("7", (2024, 6, 30)),
    ("8", (2021, 12, 31)),
];

const ROCKY: Calendar = &[("8", (2029, 5, 31)), ("9", (2032, 5, 31))];

const ALMA: Calendar = &[("8", (2029, 3, 1)), ("9", (2032, 5, 31))];

const ORACLE: Calendar = &[
    ("5", (2017, 6, 30)),
    ("6", (2021, 3, 1)),
    ("7", (2024, 12, 31)),
    ("8", (2029, 7, 31)),
    ("9", (2032, 6, 30)),
];

const AMAZON: Calendar = &[
    ("1", (2023, 12, 31)),
    ("2", (2026, 6, 30)),
    ("2022", (2022, 11, 30)),
    ("2023", (2029, 6, 30)),
];

const CBL_MARINER: Calendar = &[("1.0", (2023, 7, 31)), ("2.0", (2025, 7, 31))];

const PHOTON: Calendar = &[
    ("1.0", (2022, 2, 28)),
    ("2.0", (2022, 12, 31)),
    ("3.0", (2024, 3, 1)),
    ("4.0", (2026, 3, 1)),
    ("5.0", (2028, 3, 1)),
];

const OPENSUSE_LEAP: Calendar = &[
    ("15.0", (2019, 12, 3)),
    ("15.1", (2021, 1, 31)),
    ("15.2", (2021, 12, 31)),
    ("15.3", (2022, 12, 31)),
    ("15.4", (2023, 12, 31)),
    ("15.5", (2024, 12, 31)),
    ("15.6", (2025, 12, 31)),
];

const SLES: Calendar = &[
    ("11.4", (2019, 3, 31)),
    ("12.3", (2019, 6, 30)),
    ("12.4", (2020, 6, 30)),
    ("12.5", (2024, 10, 31)),
    ("15.0", (2019, 12, 31)),
    ("15.1", (2021, 1, 31)),
    ("15.2", (2021, 12, 31)),
    ("15.3", (2022, 12, 31)),
    ("15.4", (2023, 12, 31)),
    ("15.5", (2024, 12, 31)),
    ("15.6", (2031, 7, 31)),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Granularity {
    Major,
    MajorMinor,
    Amazon,
}

/// Vendor support calendar for one family.
#[derive(Debug, Clone, Copy)]
pub struct SupportWindow {
    family: OsFamily,
    granularity: Granularity,
    calendar: Calendar,
}

impl SupportWindow {
    pub fn for_family(family: OsFamily) -> Self {
        let (granularity, calendar) = match family {
            OsFamily::Alpine => (Granularity::MajorMinor, ALPINE),
            OsFamily::Debian => (Granularity::Major, DEBIAN),
            OsFamily::Ubuntu => (Granularity::MajorMinor, UBUNTU),
            OsFamily::RedHat => (Granularity::Major, REDHAT),
            OsFamily::CentOS => (Granularity::Major, CENTOS),
            OsFamily::Rocky => (Granularity::Major, ROCKY),
            OsFamily::Alma => (Granularity::Major, ALMA),
            OsFamily::Oracle => (Granularity::Major, ORACLE),
            OsFamily::Amazon => (Granularity::Amazon, AMAZON),
            OsFamily::CblMariner => (Granularity::MajorMinor, CBL_MARINER),
            OsFamily::Photon => (Granularity::MajorMinor, PHOTON),
            OsFamily::OpenSuseLeap => (Granularity::MajorMinor, OPENSUSE_LEAP),
            OsFamily::Sles => (Granularity::MajorMinor, SLES),
        };

        Self {
            family,
            granularity,
            calendar,
        }
    }

    pub fn family(&self) -> OsFamily {
        self.family
    }

    /// Reduces a release string to the key used by the calendar.
    ///
    /// Returns `None` for strings that do not start with a numeric release.
    pub fn release_key(&self, version: &str) -> Option<String> {
        let token = version.split_whitespace().next()?;
        let mut parts = token.split('.');
        let major = parts.next().filter(|p| is_numeric(p))?;

        match self.granularity {
            Granularity::Major => Some(major.to_string()),
            Granularity::MajorMinor => {
                let minor = parts.next().filter(|p| is_numeric(p))?;
                Some(format!("{}.{}", major, minor))
            }
            Granularity::Amazon => match major {
                "2022" | "2023" => Some(major.to_string()),
                // Amazon Linux 1 releases are dated, e.g. "2018.03"
                m if m.len() == 4 => Some("1".to_string()),
                m => Some(m.to_string()),
            },
        }
    }

    pub fn eol_date(&self, version: &str) -> Option<NaiveDate> {
        let key = self.release_key(version)?;
        self.calendar
            .iter()
            .find(|(release, _)| *release == key)
            .and_then(|(_, (y, m, d))| NaiveDate::from_ymd_opt(*y, *m, *d))
    }

    /// Releases of the calendar still supported at `at`.
    pub fn supported_releases(&self, at: DateTime<Utc>) -> Vec<&'static str> {
        self.calendar
            .iter()
            .filter(|(release, _)| self.is_supported_at(release, at))
            .map(|(release, _)| *release)
            .collect()
    }

    /// Whether `version` still receives vendor updates at `at`. Total: never fails.
    pub fn is_supported_at(&self, version: &str, at: DateTime<Utc>) -> bool {
        match self.eol_date(version) {
            Some(eol) => at.date_naive() <= eol,
            None => false,
        }
    }
}

fn is_numeric(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_release_keys() {
        let debian = SupportWindow::for_family(OsFamily::Debian);
        assert_eq!(debian.release_key("11.7").as_deref(), Some("11"));
        assert_eq!(debian.release_key("bookworm/sid"), None);

        let alpine = SupportWindow::for_family(OsFamily::Alpine);
        assert_eq!(alpine.release_key("3.19.1").as_deref(), Some("3.19"));
        assert_eq!(alpine.release_key("3"), None);
        assert_eq!(alpine.release_key("edge"), None);

        let amazon = SupportWindow::for_family(OsFamily::Amazon);
        assert_eq!(amazon.release_key("2 (Karoo)").as_deref(), Some("2"));
        assert_eq!(amazon.release_key("2018.03").as_deref(), Some("1"));
        assert_eq!(amazon.release_key("2023.3.20240117").as_deref(), Some("2023"));
    }

    #[test]
    fn test_supported_windows() {
        let debian = SupportWindow::for_family(OsFamily::Debian);
        assert!(debian.is_supported_at("11", at(2025, 1, 1)));
        assert!(debian.is_supported_at("11", at(2026, 8, 31)));
        assert!(!debian.is_supported_at("11", at(2026, 9, 1)));
        assert!(!debian.is_supported_at("9", at(2025, 1, 1)));

        let centos = SupportWindow::for_family(OsFamily::CentOS);
        assert!(!centos.is_supported_at("6", at(2025, 1, 1)));
        assert!(!centos.is_supported_at("6.10", at(2025, 1, 1)));
        assert!(centos.is_supported_at("7.9.2009", at(2024, 1, 1)));
        assert!(centos.supported_releases(at(2025, 1, 1)).is_empty());
        assert_eq!(debian.supported_releases(at(2025, 1, 1)), vec!["11", "12", "13"]);
    }

    #[test]
    fn test_unknown_and_malformed_versions_are_unsupported() {
        let now = at(2025, 1, 1);
        for family in OsFamily::ALL {
            let window = SupportWindow::for_family(family);
            for version in ["", " ", "not-a-version", "99", "99.99", "..", "3.x"] {
                assert!(
                    !window.is_supported_at(version, now),
                    "{} {:?} should be unsupported",
                    family,
                    version
                );
            }
        }
    }

    #[test]
    fn test_every_calendar_date_is_valid() {
        for family in OsFamily::ALL {
            let window = SupportWindow::for_family(family);
            for (release, _) in window.calendar {
                assert!(
                    window.eol_date(release).is_some(),
                    "{} {} has an invalid date",
                    family,
                    release
                );
            }
        }
    }
}
