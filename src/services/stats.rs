use crate::domain::RepoId;
use crate::ports::VcsPort;
use crate::store::MirrorStore;
use serde::Serialize;
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

/// Disk and history totals over a set of mirrors
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RepoStats {
    pub listed: usize,
    pub cloned: usize,
    pub not_cloned: usize,
    pub total_size_bytes: u64,
    pub total_commits: usize,
}

impl RepoStats {
    pub fn average_commits(&self) -> Option<f64> {
        (self.cloned > 0).then(|| self.total_commits as f64 / self.cloned as f64)
    }

    pub fn total_size_mb(&self) -> f64 {
        self.total_size_bytes as f64 / (1024.0 * 1024.0)
    }
}

/// Mirrors that fail to read still count as cloned but add nothing to the totals
pub fn collect_stats(store: &MirrorStore, vcs: &dyn VcsPort, ids: &[RepoId]) -> RepoStats {
    let mut stats = RepoStats {
        listed: ids.len(),
        ..RepoStats::default()
    };

    for id in ids {
        if !store.exists(id) {
            stats.not_cloned += 1;
            continue;
        }
        stats.cloned += 1;

        let path = store.path_for(id);
        match vcs.count_commits(&path) {
            Ok(count) => {
                stats.total_commits += count;
                stats.total_size_bytes += dir_size(&path);
            }
            Err(err) => debug!("Skipping statistics for {}: {}", id, err),
        }
    }

    stats
}

/// Sum of file sizes below `path`, ignoring unreadable entries
pub fn dir_size(path: &Path) -> u64 {
    WalkDir::new(path)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .map(|meta| meta.len())
        .sum()
}
