use serde::{Deserialize, Serialize};

/// Stable identity of a scannable artifact within one run.
///
/// Results are keyed by this value, never by position, so ordering of the
/// input sequence does not affect the aggregated report.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactId(String);

impl ArtifactId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ArtifactId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ArtifactKind {
    ContainerImage {
        image: String,
    },
    Filesystem {
        path: String,
    },
    ClusterResource {
        namespace: String,
        kind: String,
        name: String,
        image: String,
    },
}

impl ArtifactKind {
    pub fn label(&self) -> &'static str {
        match self {
            ArtifactKind::ContainerImage { .. } => "image",
            ArtifactKind::Filesystem { .. } => "filesystem",
            ArtifactKind::ClusterResource { .. } => "resource",
        }
    }
}

/// An artifact reference yielded by a source adapter. Carries no package data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: ArtifactId,
    #[serde(flatten)]
    pub kind: ArtifactKind,
}

impl Artifact {
    pub fn image(image: impl Into<String>) -> Self {
        let image = image.into();
        Self {
            id: ArtifactId::new(image.clone()),
            kind: ArtifactKind::ContainerImage { image },
        }
    }

    pub fn filesystem(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            id: ArtifactId::new(format!("fs:{}", path)),
            kind: ArtifactKind::Filesystem { path },
        }
    }

    pub fn cluster_resource(
        namespace: impl Into<String>,
        kind: impl Into<String>,
        name: impl Into<String>,
        image: impl Into<String>,
    ) -> Self {
        let (namespace, kind, name, image) =
            (namespace.into(), kind.into(), name.into(), image.into());
        Self {
            id: ArtifactId::new(format!("{}/{}/{}@{}", namespace, kind, name, image)),
            kind: ArtifactKind::ClusterResource {
                namespace,
                kind,
                name,
                image,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_resource_id() {
        let artifact = Artifact::cluster_resource("default", "Deployment", "web", "nginx:1.25");
        assert_eq!(artifact.id.as_str(), "default/Deployment/web@nginx:1.25");
        assert_eq!(artifact.kind.label(), "resource");
    }

    #[test]
    fn test_artifact_json_shape() {
        let artifact = Artifact::image("alpine:3.19");
        let json = serde_json::to_value(&artifact).unwrap();
        assert_eq!(json["id"], "alpine:3.19");
        assert_eq!(json["type"], "container_image");
        assert_eq!(json["image"], "alpine:3.19");

        let back: Artifact = serde_json::from_value(json).unwrap();
        assert_eq!(back, artifact);
    }
}
