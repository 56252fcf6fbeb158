use crate::cache::BlobInfo;
use crate::model::{OsIdentity, Package, Repository};
use std::collections::BTreeMap;

/// Merged view of an artifact after applying all of its layers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArtifactDetail {
    pub os: Option<OsIdentity>,
    pub repository: Option<Repository>,
    pub packages: Vec<Package>,
}

/// Applies layers in order.
///
/// Later layers override the OS identity and repository hint. A package
/// installed again by a later layer replaces the earlier record. Packages
/// listed as removed are dropped unless `keep_removed` is set. The output is
/// sorted by name, version and architecture.
pub fn apply_layers<'a>(
    layers: impl IntoIterator<Item = (&'a str, &'a BlobInfo)>,
    keep_removed: bool,
) -> ArtifactDetail {
    let mut detail = ArtifactDetail::default();
    let mut packages: BTreeMap<(String, String), Package> = BTreeMap::new();

    for (key, blob) in layers {
        if let Some(os) = blob.os.as_ref().filter(|os| os.is_detected()) {
            detail.os = Some(os.clone());
        }
        if let Some(repo) = &blob.repository {
            detail.repository = Some(repo.clone());
        }

        if !keep_removed {
            for name in &blob.removed_packages {
                packages.retain(|(pkg_name, _), _| pkg_name != name);
            }
        }

        for package in &blob.packages {
            let mut package = package.clone();
            if package.layer.is_none() {
                package.layer = Some(blob.digest.clone().unwrap_or_else(|| key.to_string()));
            }
            packages.insert((package.name.clone(), package.arch.clone()), package);
        }
    }

    detail.packages = packages.into_values().collect();
    detail
        .packages
        .sort_by(|a, b| (&a.name, &a.version, &a.arch).cmp(&(&b.name, &b.version, &b.arch)));
    detail
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_later_layers_win() {
        let base = BlobInfo::new(vec![
            Package::new("openssl", "1.1.1k-1"),
            Package::new("curl", "7.74.0-1.3"),
        ])
        .with_os(OsIdentity::new("debian", "11.0"));
        let update = BlobInfo::new(vec![Package::new("openssl", "1.1.1w-0+deb11u1")])
            .with_os(OsIdentity::new("debian", "11.8"));

        let detail = apply_layers([("sha256:base", &base), ("sha256:update", &update)], false);

        assert_eq!(detail.os, Some(OsIdentity::new("debian", "11.8")));
        assert_eq!(detail.packages.len(), 2);
        let openssl = detail.packages.iter().find(|p| p.name == "openssl").unwrap();
        assert_eq!(openssl.version, "1.1.1w-0+deb11u1");
        assert_eq!(openssl.layer.as_deref(), Some("sha256:update"));
    }

    #[test]
    fn test_multiarch_packages_are_kept_apart() {
        let mut amd64 = Package::new("libc6", "2.31-13");
        amd64.arch = "amd64".to_string();
        let mut i386 = Package::new("libc6", "2.31-13");
        i386.arch = "i386".to_string();
        let blob = BlobInfo::new(vec![amd64, i386]);

        let detail = apply_layers([("sha256:base", &blob)], false);
        let arches: Vec<&str> = detail.packages.iter().map(|p| p.arch.as_str()).collect();
        assert_eq!(arches, vec!["amd64", "i386"]);
    }

    #[test]
    fn test_removed_packages() {
        let base = BlobInfo::new(vec![Package::new("wget", "1.21-1"), Package::new("bash", "5.1-2")])
            .with_os(OsIdentity::new("debian", "11"));
        let purge = BlobInfo::new(vec![]).with_removed(vec!["wget".to_string()]);
        let layers = [("a", &base), ("b", &purge)];

        let detail = apply_layers(layers, false);
        let names: Vec<&str> = detail.packages.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["bash"]);

        let detail = apply_layers(layers, true);
        assert_eq!(detail.packages.len(), 2);
    }

    #[test]
    fn test_empty_os_does_not_override() {
        let base = BlobInfo::new(vec![]).with_os(OsIdentity::new("alpine", "3.19.1"));
        let app = BlobInfo::new(vec![]).with_os(OsIdentity::new("", ""));

        let detail = apply_layers([("a", &base), ("b", &app)], false);
        assert_eq!(detail.os.unwrap().family, "alpine");
    }
}
