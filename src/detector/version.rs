use std::cmp::Ordering;

/// Compares two package versions.
///
/// Plain `major.minor.patch` versions are compared with `semver`. Everything
/// else is compared the way dpkg does: an optional numeric epoch, then
/// alternating runs of non-digits and digits, with `~` sorting before
/// anything. The same ordering holds for apk and rpm version strings in
/// practice. Semver pre-release rules are never applied, since `-1` is a
/// package revision here rather than a pre-release.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    if let (Some(left), Some(right)) = (plain_semver(a), plain_semver(b)) {
        return left.cmp(&right);
    }

    let (epoch_a, rest_a) = split_epoch(a);
    let (epoch_b, rest_b) = split_epoch(b);

    epoch_a
        .cmp(&epoch_b)
        .then_with(|| verrevcmp(rest_a.as_bytes(), rest_b.as_bytes()))
}

/// True when `installed` sorts strictly before `fixed`.
pub fn is_lower(installed: &str, fixed: &str) -> bool {
    compare_versions(installed, fixed) == Ordering::Less
}

fn plain_semver(version: &str) -> Option<semver::Version> {
    semver::Version::parse(version.trim_start_matches('v'))
        .ok()
        .filter(|v| v.pre.is_empty() && v.build.is_empty())
}

fn split_epoch(version: &str) -> (u64, &str) {
    match version.split_once(':') {
        Some((epoch, rest)) if !epoch.is_empty() && epoch.bytes().all(|b| b.is_ascii_digit()) => {
            (epoch.parse().unwrap_or(0), rest)
        }
        _ => (0, version),
    }
}

fn order(c: Option<u8>) -> i32 {
    match c {
        None => 0,
        Some(c) if c.is_ascii_digit() => 0,
        Some(c) if c.is_ascii_alphabetic() => c as i32,
        Some(b'~') => -1,
        Some(c) => c as i32 + 256,
    }
}

fn verrevcmp(a: &[u8], b: &[u8]) -> Ordering {
    let (mut i, mut j) = (0, 0);
    let is_digit = |s: &[u8], k: usize| s.get(k).map(|c| c.is_ascii_digit()).unwrap_or(false);

    while i < a.len() || j < b.len() {
        while (i < a.len() && !is_digit(a, i)) || (j < b.len() && !is_digit(b, j)) {
            let ac = order(a.get(i).copied());
            let bc = order(b.get(j).copied());
            if ac != bc {
                return ac.cmp(&bc);
            }
            i += 1;
            j += 1;
        }

        while a.get(i) == Some(&b'0') {
            i += 1;
        }
        while b.get(j) == Some(&b'0') {
            j += 1;
        }

        let mut first_diff = Ordering::Equal;
        while is_digit(a, i) && is_digit(b, j) {
            if first_diff == Ordering::Equal {
                first_diff = a[i].cmp(&b[j]);
            }
            i += 1;
            j += 1;
        }

        if is_digit(a, i) {
            return Ordering::Greater;
        }
        if is_digit(b, j) {
            return Ordering::Less;
        }
        if first_diff != Ordering::Equal {
            return first_diff;
        }
    }

    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_semver_fast_path() {
        assert_eq!(compare_versions("1.2.3", "1.2.10"), Ordering::Less);
        assert_eq!(compare_versions("v2.0.0", "1.9.9"), Ordering::Greater);
    }

    #[test]
    fn test_debian_versions() {
        assert!(is_lower("1.1.1k-1", "1.1.1n-0+deb11u1"));
        assert!(!is_lower("1.1.1n-0+deb11u1", "1.1.1n-0+deb11u1"));
        assert!(is_lower("1.0~rc1-1", "1.0-1"));
        assert!(is_lower("2.36-9+deb12u3", "2.36-9+deb12u4"));
        assert!(!is_lower("1:0.9", "2.0"));
        assert_eq!(compare_versions("1.2.3-1", "1.2.3"), Ordering::Greater);
    }

    #[test]
    fn test_alpine_and_rpm_versions() {
        assert!(is_lower("1.2.4-r2", "1.2.4-r3"));
        assert!(is_lower("3.0.8-r0", "3.0.10-r0"));
        assert!(is_lower("4.2.46-34.el7", "4.2.46-35.el7_9"));
    }

    #[test]
    fn test_leading_zeros_and_equality() {
        assert_eq!(compare_versions("1.01", "1.1"), Ordering::Equal);
        assert_eq!(compare_versions("", ""), Ordering::Equal);
        assert_eq!(compare_versions("1.0", "1.0a"), Ordering::Less);
    }
}
