//! Structural differences between two manifest or channel snapshots.
//!
//! Manifests are compared as maps from identity key to pinned coordinate, so
//! the result does not depend on line order or formatting: a record that
//! moves without changing its version produces no change.

use quarry_schema::{ArtifactCoordinate, ArtifactKey, Channel, Manifest, RepositoryReference};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Difference for one identity key. Derived on demand, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactChange {
    /// `group:artifact`
    pub artifact_name: String,
    pub old_version: Option<String>,
    pub new_version: Option<String>,
    pub old_coordinate: Option<ArtifactCoordinate>,
    pub new_coordinate: Option<ArtifactCoordinate>,
}

impl ArtifactChange {
    fn between(old: Option<&ArtifactCoordinate>, new: Option<&ArtifactCoordinate>) -> Option<Self> {
        let artifact_name = old.or(new)?.name();
        Some(Self {
            artifact_name,
            old_version: old.map(|c| c.version.clone()),
            new_version: new.map(|c| c.version.clone()),
            old_coordinate: old.cloned(),
            new_coordinate: new.cloned(),
        })
    }

    pub fn is_install(&self) -> bool {
        self.old_version.is_none() && self.new_version.is_some()
    }

    pub fn is_removed(&self) -> bool {
        self.old_version.is_some() && self.new_version.is_none()
    }

    pub fn is_updated(&self) -> bool {
        matches!((&self.old_version, &self.new_version), (Some(a), Some(b)) if a != b)
    }

    /// Identity key of the affected stream.
    pub fn key(&self) -> Option<ArtifactKey> {
        self.new_coordinate
            .as_ref()
            .or(self.old_coordinate.as_ref())
            .map(ArtifactCoordinate::key)
    }
}

/// Changes that turn `old` into `new`, ordered by identity key.
pub fn diff_manifests(old: &Manifest, new: &Manifest) -> Vec<ArtifactChange> {
    let keys: BTreeSet<&ArtifactKey> = old.keys().chain(new.keys()).collect();
    keys.into_iter()
        .filter_map(|key| {
            let before = old.get(key);
            let after = new.get(key);
            match (before, after) {
                (Some(a), Some(b)) if a.version == b.version => None,
                _ => ArtifactChange::between(before, after),
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelChangeKind {
    Added,
    Removed,
    Modified,
}

/// Difference for one channel, matched by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelChange {
    pub name: String,
    pub kind: ChannelChangeKind,
    pub old_manifest: Option<String>,
    pub new_manifest: Option<String>,
    pub added_repositories: Vec<RepositoryReference>,
    pub removed_repositories: Vec<RepositoryReference>,
    /// Same repositories, different resolution order.
    pub reordered: bool,
}

fn repo_key(r: &RepositoryReference) -> (&str, &str) {
    (r.id.as_str(), r.url.as_str())
}

fn compare_channel(old: &Channel, new: &Channel) -> Option<ChannelChange> {
    let old_repos: BTreeSet<_> = old.repositories.iter().map(repo_key).collect();
    let new_repos: BTreeSet<_> = new.repositories.iter().map(repo_key).collect();

    let added: Vec<RepositoryReference> = new
        .repositories
        .iter()
        .filter(|r| !old_repos.contains(&repo_key(r)))
        .cloned()
        .collect();
    let removed: Vec<RepositoryReference> = old
        .repositories
        .iter()
        .filter(|r| !new_repos.contains(&repo_key(r)))
        .cloned()
        .collect();
    let reordered = added.is_empty()
        && removed.is_empty()
        && !old
            .repositories
            .iter()
            .map(repo_key)
            .eq(new.repositories.iter().map(repo_key));
    let manifest_changed = old.manifest != new.manifest;

    if !manifest_changed && added.is_empty() && removed.is_empty() && !reordered {
        return None;
    }
    Some(ChannelChange {
        name: new.name.clone(),
        kind: ChannelChangeKind::Modified,
        old_manifest: Some(old.manifest.to_string()),
        new_manifest: Some(new.manifest.to_string()),
        added_repositories: added,
        removed_repositories: removed,
        reordered,
    })
}

/// Channel changes that turn `old` into `new`, ordered by channel name.
pub fn diff_channels(old: &[Channel], new: &[Channel]) -> Vec<ChannelChange> {
    let before: BTreeMap<&str, &Channel> = old.iter().map(|c| (c.name.as_str(), c)).collect();
    let after: BTreeMap<&str, &Channel> = new.iter().map(|c| (c.name.as_str(), c)).collect();
    let names: BTreeSet<&str> = before.keys().chain(after.keys()).copied().collect();

    names
        .into_iter()
        .filter_map(|name| match (before.get(name), after.get(name)) {
            (Some(a), Some(b)) => compare_channel(a, b),
            (None, Some(b)) => Some(ChannelChange {
                name: name.to_owned(),
                kind: ChannelChangeKind::Added,
                old_manifest: None,
                new_manifest: Some(b.manifest.to_string()),
                added_repositories: b.repositories.clone(),
                removed_repositories: Vec::new(),
                reordered: false,
            }),
            (Some(a), None) => Some(ChannelChange {
                name: name.to_owned(),
                kind: ChannelChangeKind::Removed,
                old_manifest: Some(a.manifest.to_string()),
                new_manifest: None,
                added_repositories: Vec::new(),
                removed_repositories: a.repositories.clone(),
                reordered: false,
            }),
            (None, None) => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_schema::ManifestLocation;

    fn manifest(records: &[&str]) -> Manifest {
        let text = records.join("\n");
        Manifest::parse_str(&text).unwrap()
    }

    fn channel(name: &str, repos: &[(&str, &str)]) -> Channel {
        Channel {
            name: name.to_owned(),
            manifest: ManifestLocation::parse("org.example:manifest").unwrap(),
            repositories: repos
                .iter()
                .map(|(id, url)| RepositoryReference::new(id, url))
                .collect(),
        }
    }

    #[test]
    fn version_change_is_single_update() {
        let old = manifest(&["foo:bar::jar:1.1.1", "foo:baz::jar:2.0"]);
        let new = manifest(&["foo:bar::jar:1.1.2", "foo:baz::jar:2.0"]);
        let changes = diff_manifests(&old, &new);
        assert_eq!(changes.len(), 1);
        let change = &changes[0];
        assert_eq!(change.artifact_name, "foo:bar");
        assert_eq!(change.old_version.as_deref(), Some("1.1.1"));
        assert_eq!(change.new_version.as_deref(), Some("1.1.2"));
        assert!(change.is_updated());
        assert!(!change.is_install());
        assert!(!change.is_removed());
    }

    #[test]
    fn install_and_removal_are_classified() {
        let old = manifest(&["g:old::jar:1.0"]);
        let new = manifest(&["g:new::jar:1.0"]);
        let changes = diff_manifests(&old, &new);
        assert_eq!(changes.len(), 2);

        let install = changes.iter().find(|c| c.artifact_name == "g:new").unwrap();
        assert!(install.is_install());
        assert!(install.old_version.is_none());

        let removal = changes.iter().find(|c| c.artifact_name == "g:old").unwrap();
        assert!(removal.is_removed());
        assert!(removal.new_version.is_none());
    }

    #[test]
    fn classifier_streams_are_distinct_keys() {
        let old = manifest(&["g:a::jar:1.0", "g:a:tests:jar:1.0"]);
        let new = manifest(&["g:a::jar:1.0", "g:a:tests:jar:1.1"]);
        let changes = diff_manifests(&old, &new);
        assert_eq!(changes.len(), 1);
        assert_eq!(
            changes[0].new_coordinate.as_ref().unwrap().classifier,
            "tests"
        );
    }

    #[test]
    fn moved_line_without_change_is_not_reported() {
        let old = manifest(&["g:b::jar:1.0", "g:a::jar:1.0"]);
        let new = manifest(&["g:a::jar:1.0", "g:b::jar:1.0"]);
        assert!(diff_manifests(&old, &new).is_empty());
    }

    #[test]
    fn identical_manifests_have_no_changes() {
        let m = manifest(&["g:a::jar:1.0"]);
        assert!(diff_manifests(&m, &m).is_empty());
    }

    #[test]
    fn channel_added_removed_modified() {
        let old = vec![
            channel("base", &[("central", "https://a")]),
            channel("legacy", &[("old", "https://old")]),
        ];
        let new = vec![
            channel("base", &[("central", "https://a"), ("mirror", "https://m")]),
            channel("extra", &[("x", "file:///x")]),
        ];
        let changes = diff_channels(&old, &new);
        assert_eq!(changes.len(), 3);

        assert_eq!(changes[0].name, "base");
        assert_eq!(changes[0].kind, ChannelChangeKind::Modified);
        assert_eq!(changes[0].added_repositories.len(), 1);
        assert_eq!(changes[0].added_repositories[0].id, "mirror");

        assert_eq!(changes[1].name, "extra");
        assert_eq!(changes[1].kind, ChannelChangeKind::Added);

        assert_eq!(changes[2].name, "legacy");
        assert_eq!(changes[2].kind, ChannelChangeKind::Removed);
    }

    #[test]
    fn reordered_repositories_are_a_change() {
        let old = vec![channel("base", &[("a", "https://a"), ("b", "https://b")])];
        let new = vec![channel("base", &[("b", "https://b"), ("a", "https://a")])];
        let changes = diff_channels(&old, &new);
        assert_eq!(changes.len(), 1);
        assert!(changes[0].reordered);
        assert!(diff_channels(&old, &old).is_empty());
    }
}
