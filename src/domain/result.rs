use serde::{Deserialize, Serialize};

use super::{commit::Commit, repo::RepoId};

/// Terminal outcome of one clone / update / reclone against one repository
#[derive(Debug, Clone, PartialEq)]
pub struct SyncResult {
    pub repo: RepoId,
    pub outcome: SyncOutcome,
}

impl SyncResult {
    pub fn new(repo: RepoId, outcome: SyncOutcome) -> Self {
        Self { repo, outcome }
    }

    pub fn error(repo: RepoId, message: impl Into<String>) -> Self {
        Self::new(
            repo,
            SyncOutcome::Error {
                message: message.into(),
            },
        )
    }

    pub fn status(&self) -> SyncStatus {
        self.outcome.status()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    Cloned,
    AlreadyCloned,
    NotCloned,
    NoChanges,
    /// Fast-forward pull moved HEAD
    Updated(Advance),
    /// Pull failed and a hard reset to the remote tip moved HEAD
    UpdatedForced(Advance),
    Recloned,
    Error { message: String },
}

impl SyncOutcome {
    pub fn status(&self) -> SyncStatus {
        match self {
            SyncOutcome::Cloned => SyncStatus::Cloned,
            SyncOutcome::AlreadyCloned => SyncStatus::AlreadyCloned,
            SyncOutcome::NotCloned => SyncStatus::NotCloned,
            SyncOutcome::NoChanges => SyncStatus::NoChanges,
            SyncOutcome::Updated(_) => SyncStatus::Updated,
            SyncOutcome::UpdatedForced(_) => SyncStatus::UpdatedForced,
            SyncOutcome::Recloned => SyncStatus::Recloned,
            SyncOutcome::Error { .. } => SyncStatus::Error,
        }
    }

    pub fn advance(&self) -> Option<&Advance> {
        match self {
            SyncOutcome::Updated(advance) | SyncOutcome::UpdatedForced(advance) => Some(advance),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, SyncOutcome::Error { .. })
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            SyncOutcome::Error { message } => Some(message),
            _ => None,
        }
    }

    pub fn new_commit_count(&self) -> usize {
        self.advance().map_or(0, |advance| advance.commits.len())
    }
}

/// HEAD movement produced by an update.
///
/// `old_hash != new_hash`; `commits` holds the range `old_hash..new_hash`,
/// most recent first. It is empty when the range could not be walked.
#[derive(Debug, Clone, PartialEq)]
pub struct Advance {
    pub old_hash: String,
    pub new_hash: String,
    pub commits: Vec<Commit>,
}

/// Wire tag of a [`SyncOutcome`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Cloned,
    AlreadyCloned,
    NotCloned,
    NoChanges,
    Updated,
    UpdatedForced,
    Recloned,
    Error,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Cloned => "cloned",
            SyncStatus::AlreadyCloned => "already_cloned",
            SyncStatus::NotCloned => "not_cloned",
            SyncStatus::NoChanges => "no_changes",
            SyncStatus::Updated => "updated",
            SyncStatus::UpdatedForced => "updated_forced",
            SyncStatus::Recloned => "recloned",
            SyncStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Most recent commit of one mirror
#[derive(Debug, Clone, PartialEq)]
pub enum CommitSummary {
    Present { repo: RepoId, commit: Commit },
    NotCloned { repo: RepoId },
    Error { repo: RepoId, message: String },
}

impl CommitSummary {
    pub fn repo(&self) -> &RepoId {
        match self {
            CommitSummary::Present { repo, .. }
            | CommitSummary::NotCloned { repo }
            | CommitSummary::Error { repo, .. } => repo,
        }
    }
}

/// One commit whose message matched a search query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchMatch {
    /// Abbreviated to 7 characters
    pub hash: String,
    /// ISO-8601 authored date
    pub date: String,
    pub author: String,
    /// Trimmed and cut to 100 characters
    pub message: String,
}

/// All matches found in one repository; never constructed with zero matches
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepoSearchHits {
    pub repo: RepoId,
    pub matches: Vec<SearchMatch>,
    pub count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> RepoId {
        RepoId::parse("octocat/hello").unwrap()
    }

    #[test]
    fn test_status_tags() {
        assert_eq!(SyncOutcome::NoChanges.status().as_str(), "no_changes");
        assert_eq!(
            serde_json::to_string(&SyncStatus::UpdatedForced).unwrap(),
            "\"updated_forced\""
        );
    }

    #[test]
    fn test_new_commit_count_only_for_updates() {
        let advance = Advance {
            old_hash: "a".into(),
            new_hash: "b".into(),
            commits: Vec::new(),
        };
        assert_eq!(SyncOutcome::Cloned.new_commit_count(), 0);
        assert_eq!(SyncOutcome::Updated(advance.clone()).new_commit_count(), 0);
        assert!(SyncOutcome::UpdatedForced(advance).advance().is_some());
    }

    #[test]
    fn test_error_constructor() {
        let result = SyncResult::error(id(), "boom");
        assert!(result.outcome.is_error());
        assert_eq!(result.outcome.error_message(), Some("boom"));
        assert_eq!(result.status(), SyncStatus::Error);
    }
}
