use super::repo::RepoId;

/// Progress events emitted by the batch orchestrator
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// A repository is about to be processed (sequential mode only)
    Started {
        repo: RepoId,
        position: usize,
        total: usize,
    },

    /// A repository finished; `completed` counts finished units so far
    Finished {
        repo: RepoId,
        label: String,
        ok: bool,
        completed: usize,
        total: usize,
    },

    /// Every dispatched unit of work has finished
    BatchCompleted { total: usize },
}
