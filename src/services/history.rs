//! Commit history, last-commit summaries, and commit message search.

use crate::domain::{Commit, CommitSummary, RepoId, RepoSearchHits, SearchMatch};
use crate::error::HistoryError;
use crate::ports::{LogQuery, VcsPort};
use crate::store::MirrorStore;
use std::sync::Arc;
use tracing::{debug, info};

/// How many recent commits a message search inspects per repository
pub const DEFAULT_SEARCH_DEPTH: usize = 100;

const MATCH_MESSAGE_LIMIT: usize = 100;

/// Optional bounds for a history listing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
    /// Case-insensitive substring of the author's `Name <email>`
    pub author: Option<String>,
}

pub struct HistoryService {
    vcs: Arc<dyn VcsPort>,
    store: MirrorStore,
    search_depth: usize,
}

impl HistoryService {
    pub fn new(vcs: Arc<dyn VcsPort>, store: MirrorStore) -> Self {
        Self {
            vcs,
            store,
            search_depth: DEFAULT_SEARCH_DEPTH,
        }
    }

    pub fn with_search_depth(mut self, depth: usize) -> Self {
        self.search_depth = depth;
        self
    }

    /// Commits of the active branch, most recent first
    pub fn history(&self, id: &RepoId, query: &HistoryQuery) -> Result<Vec<Commit>, HistoryError> {
        if !self.store.exists(id) {
            return Err(HistoryError::NotCloned {
                repo: id.to_string(),
            });
        }

        let log_query = LogQuery::head()
            .with_limit(query.limit)
            .with_author(query.author.clone());
        self.vcs
            .log(&self.store.path_for(id), &log_query)
            .map_err(|source| HistoryError::Vcs {
                repo: id.to_string(),
                source,
            })
    }

    pub fn last_commit(&self, id: &RepoId) -> CommitSummary {
        match self.history(id, &HistoryQuery {
            limit: Some(1),
            author: None,
        }) {
            Ok(mut commits) if !commits.is_empty() => CommitSummary::Present {
                repo: id.clone(),
                commit: commits.swap_remove(0),
            },
            Ok(_) => CommitSummary::Error {
                repo: id.clone(),
                message: "Repository has no commits".to_string(),
            },
            Err(HistoryError::NotCloned { .. }) => CommitSummary::NotCloned { repo: id.clone() },
            Err(err) => CommitSummary::Error {
                repo: id.clone(),
                message: err.to_string(),
            },
        }
    }

    /// Last commit of every identifier, in input order
    pub fn last_commit_summaries(&self, ids: &[RepoId]) -> Vec<CommitSummary> {
        ids.iter().map(|id| self.last_commit(id)).collect()
    }

    /// Case-insensitive search of recent commit messages.
    ///
    /// Only the `search_depth` most recent commits of each mirror are
    /// inspected. Repositories without matches, absent mirrors, and
    /// unreadable mirrors are left out of the result.
    pub fn search_messages(&self, query: &str, ids: &[RepoId]) -> Vec<RepoSearchHits> {
        if query.trim().is_empty() {
            return Vec::new();
        }
        let needle = query.to_lowercase();

        let log_query = LogQuery::head().with_limit(Some(self.search_depth));
        let mut results = Vec::new();

        for id in ids {
            if !self.store.exists(id) {
                continue;
            }

            let commits = match self.vcs.log(&self.store.path_for(id), &log_query) {
                Ok(commits) => commits,
                Err(err) => {
                    debug!("Error searching in {}: {}", id, err);
                    continue;
                }
            };

            let matches: Vec<SearchMatch> = commits
                .iter()
                .filter(|commit| commit.message.to_lowercase().contains(&needle))
                .map(to_search_match)
                .collect();

            if !matches.is_empty() {
                results.push(RepoSearchHits {
                    repo: id.clone(),
                    count: matches.len(),
                    matches,
                });
            }
        }

        info!(
            "Search for '{}' matched commits in {} repositories",
            query,
            results.len()
        );
        results
    }
}

fn to_search_match(commit: &Commit) -> SearchMatch {
    SearchMatch {
        hash: commit.short_hash().to_string(),
        date: commit.timestamp.to_rfc3339(),
        author: commit.author.name.clone(),
        message: commit.message.trim().chars().take(MATCH_MESSAGE_LIMIT).collect(),
    }
}
