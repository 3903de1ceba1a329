use crate::batch::DEFAULT_WORKERS;
use crate::ResolveError;
use quarry_schema::{validate_channels, Channel, CurationPolicies};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the configuration file looked up at the installation root.
pub const CONFIG_FILE: &str = "quarry.toml";

fn default_workers() -> usize {
    DEFAULT_WORKERS
}

/// Resolution settings: channels, curation policies and the local cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuarryConfig {
    /// Where HTTP downloads are cached. Defaults to the installation's cache dir.
    #[serde(default)]
    pub local_cache: Option<PathBuf>,
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Only consider the exact base version when looking for "latest".
    #[serde(default)]
    pub strict: bool,
    #[serde(default)]
    pub channels: Vec<Channel>,
    #[serde(default)]
    pub policies: CurationPolicies,
}

impl Default for QuarryConfig {
    fn default() -> Self {
        Self {
            local_cache: None,
            workers: DEFAULT_WORKERS,
            strict: false,
            channels: Vec::new(),
            policies: CurationPolicies::new(),
        }
    }
}

impl QuarryConfig {
    pub fn load(path: &Path) -> Result<Self, ResolveError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ResolveError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
            .map_err(|e| ResolveError::Config(format!("{}: {e}", path.display())))
    }

    /// Parse and validate.
    pub fn from_toml_str(content: &str) -> Result<Self, ResolveError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ResolveError::Config(format!("invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ResolveError> {
        if self.workers == 0 {
            return Err(ResolveError::Config("workers must be at least 1".to_owned()));
        }
        validate_channels(&self.channels).map_err(|e| ResolveError::Config(e.to_string()))
    }

    pub fn channel(&self, name: &str) -> Option<&Channel> {
        self.channels.iter().find(|c| c.name == name)
    }

    /// The configured cache, or `default` when none is set.
    pub fn cache_dir(&self, default: &Path) -> PathBuf {
        self.local_cache
            .clone()
            .unwrap_or_else(|| default.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_schema::{ManifestLocation, VersionPolicy};

    const SAMPLE: &str = r#"
local_cache = "/var/cache/quarry"
workers = 4

[[channels]]
name = "base"
manifest = "org.example:server-manifest"

[[channels.repositories]]
id = "central"
url = "https://repo.example.org/maven2"
auth_token = "t0k"

[[channels.repositories]]
id = "mirror"
url = "file:///srv/mirror"

[[channels]]
name = "extras"
manifest = "https://example.org/extras.manifest"

[[channels.repositories]]
id = "extras"
url = "/srv/extras"

[policies]
"org.example:core" = "micro"
"org.example:pinned" = { exact = "1.0.0" }
"#;

    #[test]
    fn parses_full_config() {
        let config = QuarryConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.workers, 4);
        assert!(!config.strict);
        assert_eq!(config.channels.len(), 2);

        let base = config.channel("base").unwrap();
        assert_eq!(
            base.manifest,
            ManifestLocation::Artifact {
                group_id: "org.example".to_owned(),
                artifact_id: "server-manifest".to_owned(),
            }
        );
        assert_eq!(base.repositories[0].id, "central");
        assert_eq!(base.repositories[0].auth_token.as_deref(), Some("t0k"));
        assert_eq!(base.repositories[1].id, "mirror");
        assert!(matches!(
            config.channel("extras").unwrap().manifest,
            ManifestLocation::Url(_)
        ));

        assert_eq!(
            config.policies.policy_for("org.example:core"),
            &VersionPolicy::Micro
        );
        assert_eq!(
            config.policies.policy_for("org.example:pinned"),
            &VersionPolicy::Exact("1.0.0".to_owned())
        );
        assert_eq!(
            config.cache_dir(Path::new("/default")),
            PathBuf::from("/var/cache/quarry")
        );
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config = QuarryConfig::from_toml_str("").unwrap();
        assert_eq!(config, QuarryConfig::default());
        assert_eq!(config.workers, DEFAULT_WORKERS);
        assert_eq!(
            config.cache_dir(Path::new("/default")),
            PathBuf::from("/default")
        );
    }

    #[test]
    fn zero_workers_rejected() {
        let err = QuarryConfig::from_toml_str("workers = 0").unwrap_err();
        assert_eq!(err.kind(), "config");
    }

    #[test]
    fn channel_without_repositories_rejected() {
        let err = QuarryConfig::from_toml_str(
            "[[channels]]\nname = \"base\"\nmanifest = \"g:m\"\n",
        )
        .unwrap_err();
        assert_eq!(err.kind(), "config");
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = QuarryConfig::load(&dir.path().join(CONFIG_FILE)).unwrap_err();
        assert!(err.to_string().contains(CONFIG_FILE));
    }

    #[test]
    fn load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, SAMPLE).unwrap();
        assert_eq!(QuarryConfig::load(&path).unwrap().channels.len(), 2);
    }
}
