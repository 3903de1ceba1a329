//! Curation policies: which candidate versions of an artifact are acceptable
//! upgrade targets.

use crate::version::MavenVersion;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("malformed version '{version}': {reason}")]
    MalformedVersion { version: String, reason: String },
    #[error(
        "no version of {artifact} satisfies policy '{policy}' (base {base}, {candidates} candidate(s))"
    )]
    NoAcceptableVersion {
        artifact: String,
        policy: String,
        base: String,
        candidates: usize,
    },
}

/// Rule limiting the acceptable versions of one artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionPolicy {
    /// Every candidate is acceptable.
    #[default]
    Any,
    /// Only candidates sharing the first two numeric tokens with the base.
    Micro,
    /// Only the pinned version.
    Exact(String),
}

impl VersionPolicy {
    /// Keep the candidates this policy accepts relative to `base`, preserving order.
    ///
    /// A version that cannot be interpreted by the policy is an error, not a
    /// reason to skip the candidate.
    pub fn filter(
        &self,
        base: &str,
        candidates: &[MavenVersion],
    ) -> Result<Vec<MavenVersion>, PolicyError> {
        match self {
            VersionPolicy::Any => Ok(candidates.to_vec()),
            VersionPolicy::Micro => {
                let base_prefix = micro_prefix(base)?;
                let mut accepted = Vec::new();
                for candidate in candidates {
                    if micro_prefix(candidate.as_str())? == base_prefix {
                        accepted.push(candidate.clone());
                    }
                }
                Ok(accepted)
            }
            VersionPolicy::Exact(pinned) => {
                let pinned = MavenVersion::new(pinned.as_str());
                Ok(candidates
                    .iter()
                    .filter(|c| **c == pinned)
                    .cloned()
                    .collect())
            }
        }
    }
}

impl fmt::Display for VersionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionPolicy::Any => write!(f, "any"),
            VersionPolicy::Micro => write!(f, "micro"),
            VersionPolicy::Exact(v) => write!(f, "exact({v})"),
        }
    }
}

/// First two tokens of `version` split on `.`, `-` and `_`, as integers.
fn micro_prefix(version: &str) -> Result<(u64, u64), PolicyError> {
    let mut tokens = version.split(['.', '-', '_']);
    let mut next = |position: &str| -> Result<u64, PolicyError> {
        let token = tokens.next().unwrap_or("");
        token.parse::<u64>().map_err(|_| PolicyError::MalformedVersion {
            version: version.to_owned(),
            reason: format!("{position} token '{token}' is not an integer"),
        })
    };
    let major = next("first")?;
    let minor = next("second")?;
    Ok((major, minor))
}

static DEFAULT_POLICY: VersionPolicy = VersionPolicy::Any;

/// Per-artifact curation rules keyed by `group:artifact`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CurationPolicies {
    policies: BTreeMap<String, VersionPolicy>,
}

impl CurationPolicies {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, artifact: &str, policy: VersionPolicy) -> Self {
        self.set(artifact, policy);
        self
    }

    pub fn set(&mut self, artifact: &str, policy: VersionPolicy) {
        self.policies.insert(artifact.to_owned(), policy);
    }

    /// Policy registered for `artifact` (`group:artifact`); [`VersionPolicy::Any`] when unset.
    pub fn policy_for(&self, artifact: &str) -> &VersionPolicy {
        self.policies.get(artifact).unwrap_or(&DEFAULT_POLICY)
    }

    pub fn acceptable_versions(
        &self,
        artifact: &str,
        base: &str,
        candidates: &[MavenVersion],
    ) -> Result<Vec<MavenVersion>, PolicyError> {
        self.policy_for(artifact).filter(base, candidates)
    }

    /// Highest acceptable candidate by Maven ordering.
    ///
    /// Fails with [`PolicyError::NoAcceptableVersion`] when candidates exist
    /// but none is acceptable (and when there are no candidates at all;
    /// callers that need to tell "nothing exists" apart check emptiness first).
    pub fn select_best(
        &self,
        artifact: &str,
        base: &str,
        candidates: &[MavenVersion],
    ) -> Result<MavenVersion, PolicyError> {
        let accepted = self.acceptable_versions(artifact, base, candidates)?;
        accepted
            .into_iter()
            .max()
            .ok_or_else(|| PolicyError::NoAcceptableVersion {
                artifact: artifact.to_owned(),
                policy: self.policy_for(artifact).to_string(),
                base: base.to_owned(),
                candidates: candidates.len(),
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &VersionPolicy)> {
        self.policies.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}
