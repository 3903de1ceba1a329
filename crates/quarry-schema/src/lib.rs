//! Artifact coordinates, version ordering, manifests, and curation policies for Quarry.
//!
//! This crate is the pure data layer: Maven coordinates and identity keys
//! (`ArtifactCoordinate`, `ArtifactKey`), Maven `ComparableVersion` ordering
//! (`MavenVersion`, `VersionRange`), the line-oriented manifest format
//! (`Manifest`), per-artifact curation rules (`CurationPolicies`), and channel
//! definitions (`Channel`). Nothing here touches the network or the
//! installation directory.

pub mod channel;
pub mod coordinate;
pub mod manifest;
pub mod policy;
pub mod types;
pub mod version;

pub use channel::{
    validate_channels, Channel, ChannelError, ManifestLocation, RepositoryReference,
    MANIFEST_EXTENSION,
};
pub use coordinate::{ArtifactCoordinate, ArtifactKey};
pub use manifest::{Manifest, ManifestError, MANIFEST_FORMAT_VERSION};
pub use policy::{CurationPolicies, PolicyError, VersionPolicy};
pub use types::{ObjectHash, RepositoryId, RevisionId};
pub use version::{MavenVersion, VersionRange};
