use crate::domain::{Commit, HeadState};
use crate::error::VcsError;
use std::path::Path;

/// Which commits a [`VcsPort::log`] call walks, and how many it keeps
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogQuery {
    /// Walk `from..to` instead of everything reachable from HEAD
    pub range: Option<CommitRange>,
    /// Stop after this many matching commits
    pub limit: Option<usize>,
    /// Keep only commits whose author matches (case-insensitive substring of `Name <email>`)
    pub author: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommitRange {
    pub from: String,
    pub to: String,
}

impl LogQuery {
    pub fn head() -> Self {
        Self::default()
    }

    /// Commits reachable from `to` but not from `from`
    pub fn range(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            range: Some(CommitRange {
                from: from.into(),
                to: to.into(),
            }),
            ..Self::default()
        }
    }

    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_author(mut self, author: Option<String>) -> Self {
        self.author = author.filter(|a| !a.trim().is_empty());
        self
    }
}

/// Primitive operations of the version-control collaborator.
///
/// Every call is blocking; callers decide how to sequence, retry, and
/// escalate between them.
pub trait VcsPort: Send + Sync {
    /// Clone `url` into `dest`; `dest` must not exist
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<(), VcsError>;

    /// Write a repository-local configuration value
    fn set_config(&self, path: &Path, key: &str, value: &str) -> Result<(), VcsError>;

    /// Current HEAD commit and active branch
    fn head(&self, path: &Path) -> Result<HeadState, VcsError>;

    /// Fetch `origin` and fast-forward the active branch to its remote counterpart.
    /// Fails rather than overwrite local modifications.
    fn pull(&self, path: &Path) -> Result<(), VcsError>;

    /// Fetch `origin` without touching the working tree
    fn fetch(&self, path: &Path) -> Result<(), VcsError>;

    /// Hard-reset the active branch, index, and working tree to `origin/<branch>`
    fn reset_to_remote(&self, path: &Path, branch: &str) -> Result<(), VcsError>;

    /// Commits most recent first, collected into a `Vec`.
    ///
    /// The walk stops as soon as `query.limit` commits have been gathered.
    fn log(&self, path: &Path, query: &LogQuery) -> Result<Vec<Commit>, VcsError>;

    /// Number of commits reachable from HEAD
    fn count_commits(&self, path: &Path) -> Result<usize, VcsError>;
}
