use crate::coordinate::ArtifactCoordinate;
use crate::types::RepositoryId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

/// Extension under which channel manifests are published.
pub const MANIFEST_EXTENSION: &str = "manifest";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChannelError {
    #[error("invalid manifest location '{0}': expected group:artifact or a URL")]
    InvalidManifestLocation(String),
    #[error("channel '{0}' declares no repositories")]
    NoRepositories(String),
    #[error("channel '{channel}' declares repository '{id}' more than once")]
    DuplicateRepository { channel: String, id: String },
    #[error("duplicate channel name '{0}'")]
    DuplicateChannel(String),
    #[error("channel name must not be empty")]
    EmptyName,
}

/// Where a channel's manifest comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ManifestLocation {
    /// Published as an artifact (`group:artifact`) in the channel's repositories.
    Artifact {
        group_id: String,
        artifact_id: String,
    },
    /// Fetched from a fixed URL; no version discovery is possible.
    Url(String),
}

impl ManifestLocation {
    pub fn parse(s: &str) -> Result<Self, ChannelError> {
        let s = s.trim();
        if s.contains("://") || s.starts_with('/') {
            return Ok(ManifestLocation::Url(s.to_owned()));
        }
        match s.split_once(':') {
            Some((group, artifact))
                if !group.is_empty() && !artifact.is_empty() && !artifact.contains(':') =>
            {
                Ok(ManifestLocation::Artifact {
                    group_id: group.to_owned(),
                    artifact_id: artifact.to_owned(),
                })
            }
            _ => Err(ChannelError::InvalidManifestLocation(s.to_owned())),
        }
    }

    /// Coordinate of the manifest at `version`, or `None` for URL locations.
    pub fn coordinate(&self, version: &str) -> Option<ArtifactCoordinate> {
        match self {
            ManifestLocation::Artifact {
                group_id,
                artifact_id,
            } => Some(ArtifactCoordinate::new(
                group_id,
                artifact_id,
                "",
                MANIFEST_EXTENSION,
                version,
            )),
            ManifestLocation::Url(_) => None,
        }
    }
}

impl fmt::Display for ManifestLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManifestLocation::Artifact {
                group_id,
                artifact_id,
            } => write!(f, "{group_id}:{artifact_id}"),
            ManifestLocation::Url(url) => f.write_str(url),
        }
    }
}

impl TryFrom<String> for ManifestLocation {
    type Error = ChannelError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<ManifestLocation> for String {
    fn from(location: ManifestLocation) -> Self {
        location.to_string()
    }
}

/// A backing repository. Position in its channel's list is the resolution order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryReference {
    pub id: RepositoryId,
    pub url: String,
    /// Bearer token for HTTP repositories. Never written into history snapshots.
    #[serde(default, skip_serializing)]
    pub auth_token: Option<String>,
}

impl RepositoryReference {
    pub fn new(id: &str, url: &str) -> Self {
        Self {
            id: RepositoryId::from(id),
            url: url.to_owned(),
            auth_token: None,
        }
    }
}

/// A named source of curated artifacts: a manifest plus the repositories serving it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub name: String,
    pub manifest: ManifestLocation,
    #[serde(default)]
    pub repositories: Vec<RepositoryReference>,
}

impl Channel {
    pub fn validate(&self) -> Result<(), ChannelError> {
        if self.name.trim().is_empty() {
            return Err(ChannelError::EmptyName);
        }
        if self.repositories.is_empty() {
            return Err(ChannelError::NoRepositories(self.name.clone()));
        }
        let mut seen = BTreeSet::new();
        for repo in &self.repositories {
            if !seen.insert(repo.id.as_str()) {
                return Err(ChannelError::DuplicateRepository {
                    channel: self.name.clone(),
                    id: repo.id.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Validate every channel and reject duplicate channel names.
pub fn validate_channels(channels: &[Channel]) -> Result<(), ChannelError> {
    let mut names = BTreeSet::new();
    for channel in channels {
        channel.validate()?;
        if !names.insert(channel.name.as_str()) {
            return Err(ChannelError::DuplicateChannel(channel.name.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(name: &str) -> Channel {
        Channel {
            name: name.to_owned(),
            manifest: ManifestLocation::parse("org.example:server-manifest").unwrap(),
            repositories: vec![RepositoryReference::new("central", "file:///srv/repo")],
        }
    }

    #[test]
    fn location_parses_artifact_and_url() {
        assert_eq!(
            ManifestLocation::parse("org.example:server-manifest").unwrap(),
            ManifestLocation::Artifact {
                group_id: "org.example".to_owned(),
                artifact_id: "server-manifest".to_owned(),
            }
        );
        assert!(matches!(
            ManifestLocation::parse("https://example.org/manifest.txt").unwrap(),
            ManifestLocation::Url(_)
        ));
        assert!(ManifestLocation::parse("no-colon").is_err());
        assert!(ManifestLocation::parse("a:b:c").is_err());
    }

    #[test]
    fn artifact_location_builds_manifest_coordinate() {
        let location = ManifestLocation::parse("org.example:server-manifest").unwrap();
        let c = location.coordinate("26.0.1").unwrap();
        assert_eq!(c.to_record(), "org.example:server-manifest::manifest:26.0.1");
        let url = ManifestLocation::Url("https://example.org/m.txt".to_owned());
        assert!(url.coordinate("1").is_none());
    }

    #[test]
    fn channel_toml_roundtrip_hides_token() {
        let input = r#"
name = "base"
manifest = "org.example:server-manifest"

[[repositories]]
id = "central"
url = "https://repo.example.org/maven2"
auth_token = "secret"
"#;
        let parsed: Channel = toml::from_str(input).unwrap();
        assert_eq!(parsed.repositories[0].auth_token.as_deref(), Some("secret"));
        let json = serde_json::to_string(&parsed).unwrap();
        assert!(!json.contains("secret"));
        assert!(json.contains("\"manifest\":\"org.example:server-manifest\""));
    }

    #[test]
    fn validation_rejects_duplicates_and_empty() {
        assert!(validate_channels(&[channel("a"), channel("b")]).is_ok());
        assert_eq!(
            validate_channels(&[channel("a"), channel("a")]).unwrap_err(),
            ChannelError::DuplicateChannel("a".to_owned())
        );

        let mut empty = channel("c");
        empty.repositories.clear();
        assert!(matches!(
            empty.validate(),
            Err(ChannelError::NoRepositories(_))
        ));

        let mut dup = channel("d");
        dup.repositories.push(RepositoryReference::new("central", "file:///x"));
        assert!(matches!(
            dup.validate(),
            Err(ChannelError::DuplicateRepository { .. })
        ));
    }
}
