//! Building resolution chains from configuration.

use crate::config::QuarryConfig;
use crate::http::HttpRepository;
use crate::repository::{CombinedRepository, DirectRepository, MavenRepository};
use crate::transport::{ArtifactTransport, LocalRepository};
use crate::ResolveError;
use quarry_schema::{Channel, CurationPolicies, RepositoryReference};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Pick a transport by URL scheme: `file://` or a bare path is local,
/// `http(s)://` is remote.
pub fn transport_for(
    reference: &RepositoryReference,
    cache_dir: &Path,
) -> Result<Box<dyn ArtifactTransport>, ResolveError> {
    let url = reference.url.as_str();
    if let Some(path) = url.strip_prefix("file://") {
        return Ok(Box::new(LocalRepository::new(&reference.id, path)));
    }
    if url.starts_with("http://") || url.starts_with("https://") {
        return Ok(Box::new(
            HttpRepository::new(&reference.id, url, cache_dir)
                .with_token(reference.auth_token.as_deref()),
        ));
    }
    if url.contains("://") {
        return Err(ResolveError::Config(format!(
            "repository '{}': unsupported URL scheme in '{url}'",
            reference.id
        )));
    }
    Ok(Box::new(LocalRepository::new(&reference.id, url)))
}

/// Combined resolver over a channel's repositories, in declaration order.
pub fn build_channel_repository(
    channel: &Channel,
    policies: &Arc<CurationPolicies>,
    cache_dir: &Path,
    strict: bool,
) -> Result<CombinedRepository, ResolveError> {
    let mut members: Vec<Box<dyn MavenRepository>> = Vec::with_capacity(channel.repositories.len());
    for reference in &channel.repositories {
        let transport = transport_for(reference, cache_dir)?;
        members.push(Box::new(
            DirectRepository::new(transport, Arc::clone(policies)).strict(strict),
        ));
    }
    debug!(
        "channel {}: {} repositories",
        channel.name,
        members.len()
    );
    Ok(CombinedRepository::new(members))
}

/// Resolver spanning every configured channel, in declaration order.
pub fn build_repository(
    config: &QuarryConfig,
    default_cache: &Path,
) -> Result<Arc<dyn MavenRepository>, ResolveError> {
    let cache_dir = config.cache_dir(default_cache);
    let policies = Arc::new(config.policies.clone());
    let mut channels: Vec<Box<dyn MavenRepository>> = Vec::with_capacity(config.channels.len());
    for channel in &config.channels {
        channels.push(Box::new(build_channel_repository(
            channel,
            &policies,
            &cache_dir,
            config.strict,
        )?));
    }
    Ok(Arc::new(CombinedRepository::new(channels)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_schema::{ArtifactCoordinate, ManifestLocation};

    fn channel(name: &str, repos: Vec<RepositoryReference>) -> Channel {
        Channel {
            name: name.to_owned(),
            manifest: ManifestLocation::parse("g:manifest").unwrap(),
            repositories: repos,
        }
    }

    #[test]
    fn scheme_selects_transport() {
        let cache = tempfile::tempdir().unwrap();
        for url in ["file:///srv/repo", "/srv/repo", "relative/repo", "https://repo.example.org"] {
            let t = transport_for(&RepositoryReference::new("r", url), cache.path()).unwrap();
            assert_eq!(t.id(), "r");
        }
        let err = transport_for(&RepositoryReference::new("r", "ftp://x"), cache.path())
            .err()
            .unwrap();
        assert_eq!(err.kind(), "config");
    }

    #[test]
    fn file_url_resolves_locally() {
        let dir = tempfile::tempdir().unwrap();
        let repo_root = dir.path().join("repo");
        let local = LocalRepository::new("seed", &repo_root);
        let c = ArtifactCoordinate::jar("g", "a", "1.0");
        local.deploy(&c, b"jar").unwrap();

        let url = format!("file://{}", repo_root.display());
        let t = transport_for(&RepositoryReference::new("r", &url), dir.path()).unwrap();
        assert_eq!(std::fs::read(t.fetch(&c).unwrap()).unwrap(), b"jar");
    }

    #[test]
    fn channels_combine_in_declaration_order() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first");
        let second = dir.path().join("second");
        let c = ArtifactCoordinate::jar("g", "a", "1.0");
        LocalRepository::new("first", &first).deploy(&c, b"first").unwrap();
        LocalRepository::new("second", &second).deploy(&c, b"second").unwrap();
        LocalRepository::new("second", &second)
            .deploy(&c.with_version("2.0"), b"second")
            .unwrap();

        let config = QuarryConfig {
            channels: vec![
                channel(
                    "one",
                    vec![RepositoryReference::new("first", first.to_str().unwrap())],
                ),
                channel(
                    "two",
                    vec![RepositoryReference::new("second", second.to_str().unwrap())],
                ),
            ],
            ..QuarryConfig::default()
        };
        let repo = build_repository(&config, &dir.path().join("cache")).unwrap();

        assert_eq!(repo.resolve(&c).unwrap().repository, "first");
        let latest = repo.resolve_latest_version_of(&c).unwrap();
        assert_eq!(latest.coordinate.version, "2.0");
        assert_eq!(latest.repository, "second");
    }

    #[test]
    fn no_channels_means_nothing_resolves() {
        let dir = tempfile::tempdir().unwrap();
        let repo = build_repository(&QuarryConfig::default(), dir.path()).unwrap();
        assert!(repo
            .resolve(&ArtifactCoordinate::jar("g", "a", "1.0"))
            .unwrap_err()
            .is_not_found());
    }
}
