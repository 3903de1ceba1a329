use crate::manifest::ManifestError;
use crate::version::MavenVersion;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a tracked component: every coordinate field except the version.
///
/// A manifest holds at most one stream per key; only the version may change
/// between revisions.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ArtifactKey {
    pub group_id: String,
    pub artifact_id: String,
    #[serde(default)]
    pub classifier: String,
    pub extension: String,
}

impl ArtifactKey {
    pub fn new(group_id: &str, artifact_id: &str, classifier: &str, extension: &str) -> Self {
        Self {
            group_id: group_id.to_owned(),
            artifact_id: artifact_id.to_owned(),
            classifier: classifier.to_owned(),
            extension: extension.to_owned(),
        }
    }

    /// `group:artifact`, the name curation policies and change reports use.
    pub fn name(&self) -> String {
        format!("{}:{}", self.group_id, self.artifact_id)
    }

    pub fn with_version(&self, version: &str) -> ArtifactCoordinate {
        ArtifactCoordinate {
            group_id: self.group_id.clone(),
            artifact_id: self.artifact_id.clone(),
            classifier: self.classifier.clone(),
            extension: self.extension.clone(),
            version: version.to_owned(),
        }
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.group_id, self.artifact_id, self.classifier, self.extension
        )
    }
}

/// A fully pinned Maven artifact.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ArtifactCoordinate {
    pub group_id: String,
    pub artifact_id: String,
    #[serde(default)]
    pub classifier: String,
    pub extension: String,
    pub version: String,
}

impl ArtifactCoordinate {
    pub fn new(
        group_id: &str,
        artifact_id: &str,
        classifier: &str,
        extension: &str,
        version: &str,
    ) -> Self {
        ArtifactKey::new(group_id, artifact_id, classifier, extension).with_version(version)
    }

    /// Shorthand for an unclassified `jar`.
    pub fn jar(group_id: &str, artifact_id: &str, version: &str) -> Self {
        Self::new(group_id, artifact_id, "", "jar", version)
    }

    pub fn key(&self) -> ArtifactKey {
        ArtifactKey::new(
            &self.group_id,
            &self.artifact_id,
            &self.classifier,
            &self.extension,
        )
    }

    pub fn name(&self) -> String {
        format!("{}:{}", self.group_id, self.artifact_id)
    }

    pub fn maven_version(&self) -> MavenVersion {
        MavenVersion::new(self.version.as_str())
    }

    #[must_use]
    pub fn with_version(&self, version: &str) -> Self {
        Self {
            version: version.to_owned(),
            ..self.clone()
        }
    }

    /// Parse a manifest record line: `group:artifact:classifier:extension:version`.
    pub fn parse_record(record: &str) -> Result<Self, ManifestError> {
        let fields: Vec<&str> = record.trim().split(':').collect();
        let [group_id, artifact_id, classifier, extension, version] = fields.as_slice() else {
            return Err(ManifestError::InvalidCoordinate(format!(
                "'{record}': expected group:artifact:classifier:extension:version"
            )));
        };
        for (label, value) in [
            ("group", group_id),
            ("artifact", artifact_id),
            ("extension", extension),
            ("version", version),
        ] {
            if value.is_empty() || value.chars().any(char::is_whitespace) {
                return Err(ManifestError::InvalidCoordinate(format!(
                    "'{record}': {label} must be non-empty and contain no whitespace"
                )));
            }
        }
        if classifier.chars().any(char::is_whitespace) {
            return Err(ManifestError::InvalidCoordinate(format!(
                "'{record}': classifier must not contain whitespace"
            )));
        }
        Ok(Self::new(
            group_id,
            artifact_id,
            classifier,
            extension,
            version,
        ))
    }

    /// The manifest record form; inverse of [`parse_record`](Self::parse_record).
    pub fn to_record(&self) -> String {
        format!("{}:{}", self.key(), self.version)
    }

    /// Relative path of this artifact in a Maven repository layout.
    pub fn repository_path(&self) -> String {
        let file_name = if self.classifier.is_empty() {
            format!("{}-{}.{}", self.artifact_id, self.version, self.extension)
        } else {
            format!(
                "{}-{}-{}.{}",
                self.artifact_id, self.version, self.classifier, self.extension
            )
        };
        format!(
            "{}/{}/{}/{file_name}",
            self.group_id.replace('.', "/"),
            self.artifact_id,
            self.version
        )
    }
}

impl fmt::Display for ArtifactCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_record())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_roundtrip_with_classifier() {
        let c = ArtifactCoordinate::new("org.example", "core", "tests", "jar", "1.2.3");
        assert_eq!(c.to_record(), "org.example:core:tests:jar:1.2.3");
        assert_eq!(ArtifactCoordinate::parse_record(&c.to_record()).unwrap(), c);
    }

    #[test]
    fn record_roundtrip_without_classifier() {
        let c = ArtifactCoordinate::jar("org.example", "core", "1.0");
        assert_eq!(c.to_record(), "org.example:core::jar:1.0");
        assert_eq!(ArtifactCoordinate::parse_record("org.example:core::jar:1.0").unwrap(), c);
    }

    #[test]
    fn parse_rejects_wrong_field_count() {
        assert!(ArtifactCoordinate::parse_record("org.example:core:1.0").is_err());
        assert!(ArtifactCoordinate::parse_record("a:b:c:d:e:f").is_err());
    }

    #[test]
    fn parse_rejects_empty_required_fields() {
        assert!(ArtifactCoordinate::parse_record(":core::jar:1.0").is_err());
        assert!(ArtifactCoordinate::parse_record("g:core::jar:").is_err());
        assert!(ArtifactCoordinate::parse_record("g:core:::1.0").is_err());
    }

    #[test]
    fn key_excludes_version() {
        let a = ArtifactCoordinate::jar("g", "a", "1.0");
        let b = ArtifactCoordinate::jar("g", "a", "2.0");
        assert_eq!(a.key(), b.key());
        assert_eq!(a.key().to_string(), "g:a::jar");
        assert_eq!(a.name(), "g:a");
    }

    #[test]
    fn classifier_distinguishes_keys() {
        let a = ArtifactCoordinate::new("g", "a", "", "jar", "1.0");
        let b = ArtifactCoordinate::new("g", "a", "sources", "jar", "1.0");
        assert_ne!(a.key(), b.key());
        assert_eq!(a.key().name(), b.key().name());
    }

    #[test]
    fn repository_path_follows_maven_layout() {
        let c = ArtifactCoordinate::jar("org.example.tools", "core", "1.0");
        assert_eq!(c.repository_path(), "org/example/tools/core/1.0/core-1.0.jar");
        let c = ArtifactCoordinate::new("g", "a", "linux", "zip", "2.1");
        assert_eq!(c.repository_path(), "g/a/2.1/a-2.1-linux.zip");
    }
}
