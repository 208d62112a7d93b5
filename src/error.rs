use thiserror::Error;

/// Classification of a failure reported by the VCS collaborator.
///
/// Drives the recovery path chosen by the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VcsErrorKind {
    /// Network, transport, TLS or authentication failure
    Network,
    /// Local modifications would be overwritten, or the index/working tree is locked
    WorkingTreeConflict,
    /// A path in the tree is rejected by the local filesystem
    InvalidPath,
    /// Local history is not an ancestor of the remote history
    NotFastForward,
    /// A reference, remote, or object the operation relies on does not exist
    MissingReference,
    /// Anything else, reported verbatim
    Other,
}

impl VcsErrorKind {
    /// Whether a fresh attempt of the same operation may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, VcsErrorKind::Network | VcsErrorKind::Other)
    }
}

/// A failure from the VCS collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct VcsError {
    pub kind: VcsErrorKind,
    pub message: String,
}

impl VcsError {
    pub fn new(kind: VcsErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Errors from history queries
#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("Repository {repo} is not cloned")]
    NotCloned { repo: String },

    #[error("Failed to read history of {repo}: {source}")]
    Vcs {
        repo: String,
        #[source]
        source: VcsError,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid repository identifier '{id}': {reason}")]
pub struct InvalidRepoId {
    pub id: String,
    pub reason: String,
}
