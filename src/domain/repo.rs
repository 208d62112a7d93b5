use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::InvalidRepoId;

/// Identifier of a managed repository, always `owner/name`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepoId(String);

impl RepoId {
    /// Validate and wrap an `owner/name` identifier.
    ///
    /// The owner may not contain `_`: mirror directories are named by
    /// replacing `/` with `_`, so an underscore in the owner would let two
    /// identifiers share one directory.
    pub fn parse(raw: &str) -> Result<Self, InvalidRepoId> {
        let raw = raw.trim();
        let invalid = |reason: &str| InvalidRepoId {
            id: raw.to_string(),
            reason: reason.to_string(),
        };

        let (owner, name) = raw
            .split_once('/')
            .ok_or_else(|| invalid("expected owner/name"))?;
        if owner.is_empty() || name.is_empty() {
            return Err(invalid("owner and name must both be non-empty"));
        }
        if name.contains('/') {
            return Err(invalid("expected exactly one '/'"));
        }
        if owner.contains('_') {
            return Err(invalid("owner may not contain '_'"));
        }
        if raw.chars().any(char::is_whitespace) {
            return Err(invalid("whitespace is not allowed"));
        }

        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn owner(&self) -> &str {
        self.0.split_once('/').map(|(owner, _)| owner).unwrap_or(&self.0)
    }

    pub fn name(&self) -> &str {
        self.0.split_once('/').map(|(_, name)| name).unwrap_or(&self.0)
    }

    /// Directory name of the local mirror
    pub fn dir_name(&self) -> String {
        self.0.replace('/', "_")
    }

    /// Expand a remote URL template, replacing every `{id}` with this identifier
    pub fn remote_url(&self, template: &str) -> String {
        template.replace("{id}", &self.0)
    }
}

impl std::fmt::Display for RepoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(&self.0)
    }
}

impl FromStr for RepoId {
    type Err = InvalidRepoId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RepoId {
    type Error = InvalidRepoId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RepoId> for String {
    fn from(id: RepoId) -> Self {
        id.0
    }
}

/// HEAD of a local mirror
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadState {
    pub hash: String,
    /// `None` when HEAD is detached
    pub branch: Option<String>,
}

/// Derived on demand from the filesystem and Git metadata, never stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalMirrorState {
    Absent,
    Present(HeadState),
}
