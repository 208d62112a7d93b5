use crate::domain::{SyncResult, SyncStatus};
use serde::Serialize;

/// Counts derived from a finished batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    /// Every result that is not an error
    pub succeeded: usize,
    pub errored: usize,
    /// `updated` + `updated_forced`
    pub updated: usize,
    pub new_commits: usize,
}

impl BatchSummary {
    pub fn from_results(results: &[SyncResult]) -> Self {
        results.iter().fold(Self::default(), |mut acc, result| {
            acc.total += 1;
            match result.status() {
                SyncStatus::Error => acc.errored += 1,
                SyncStatus::Updated | SyncStatus::UpdatedForced => {
                    acc.succeeded += 1;
                    acc.updated += 1;
                    acc.new_commits += result.outcome.new_commit_count();
                }
                _ => acc.succeeded += 1,
            }
            acc
        })
    }
}
