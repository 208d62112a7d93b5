//! Clone / update / reclone of a single repository.
//!
//! `update` is an escalation state machine: a fast-forward pull is tried
//! first; any pull failure escalates to a forced synchronization (fetch +
//! hard reset to the remote tip); a forced-sync failure is terminal unless
//! the policy opts into recloning on invalid paths.

use crate::domain::{Advance, HeadState, LocalMirrorState, RepoId, SyncOutcome, SyncResult};
use crate::error::{VcsError, VcsErrorKind};
use crate::ports::{LogQuery, Sleeper, ThreadSleeper, VcsPort};
use crate::store::MirrorStore;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Settings applied to every fresh mirror
pub const POST_CLONE_SETTINGS: [(&str, &str); 2] =
    [("core.longpaths", "true"), ("core.quotepath", "false")];

/// Retry and escalation settings for the sync engine
#[derive(Debug, Clone, PartialEq)]
pub struct SyncPolicy {
    /// Extra clone attempts after the first one fails
    pub max_retries: u32,
    pub retry_delay: Duration,
    /// Total attempts at deleting a mirror directory before reclone gives up
    pub delete_attempts: u32,
    pub delete_delay: Duration,
    /// Remote URL template; `{id}` is replaced by `owner/name`
    pub remote_template: String,
    /// Reclone when forced synchronization fails on an invalid path
    pub reclone_on_invalid_path: bool,
}

impl Default for SyncPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_secs(2),
            delete_attempts: 5,
            delete_delay: Duration::from_secs(2),
            remote_template: "https://github.com/{id}.git".to_string(),
            reclone_on_invalid_path: false,
        }
    }
}

/// Stage of `update` that just failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Pull,
    ForcedSync,
}

/// Where `update` goes after a failed stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escalation {
    ForcedSync,
    Reclone,
    Fail,
}

/// Pure transition function of the update state machine
pub fn escalate(stage: Stage, kind: VcsErrorKind, policy: &SyncPolicy) -> Escalation {
    match (stage, kind) {
        (Stage::Pull, _) => Escalation::ForcedSync,
        (Stage::ForcedSync, VcsErrorKind::InvalidPath) if policy.reclone_on_invalid_path => {
            Escalation::Reclone
        }
        (Stage::ForcedSync, _) => Escalation::Fail,
    }
}

enum UpdateStep {
    Pull,
    ForcedSync,
    Reclone,
    Done(SyncOutcome),
}

pub struct SyncEngine {
    vcs: Arc<dyn VcsPort>,
    store: MirrorStore,
    sleeper: Arc<dyn Sleeper>,
    policy: SyncPolicy,
}

impl SyncEngine {
    pub fn new(vcs: Arc<dyn VcsPort>, store: MirrorStore, policy: SyncPolicy) -> Self {
        Self::with_sleeper(vcs, store, policy, Arc::new(ThreadSleeper))
    }

    pub fn with_sleeper(
        vcs: Arc<dyn VcsPort>,
        store: MirrorStore,
        policy: SyncPolicy,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self {
            vcs,
            store,
            sleeper,
            policy,
        }
    }

    pub fn store(&self) -> &MirrorStore {
        &self.store
    }

    /// Clone the mirror unless it already exists
    pub fn clone_repo(&self, id: &RepoId) -> SyncResult {
        if self.store.exists(id) {
            debug!("Repository {} already cloned", id);
            return SyncResult::new(id.clone(), SyncOutcome::AlreadyCloned);
        }

        let path = self.store.path_for(id);
        let url = id.remote_url(&self.policy.remote_template);
        info!("Cloning repository {}", id);

        match self.clone_with_retry(id, &url, &path) {
            Ok(()) => {
                self.configure_mirror(id, &path);
                info!("Successfully cloned {}", id);
                SyncResult::new(id.clone(), SyncOutcome::Cloned)
            }
            Err(err) => {
                error!("Failed to clone {}: {}", id, err);
                SyncResult::error(id.clone(), err.to_string())
            }
        }
    }

    /// Bring an existing mirror up to date with its remote
    pub fn update_repo(&self, id: &RepoId) -> SyncResult {
        let old = match self.store.state(id, self.vcs.as_ref()) {
            Ok(LocalMirrorState::Present(head)) => head,
            Ok(LocalMirrorState::Absent) => {
                return SyncResult::new(id.clone(), SyncOutcome::NotCloned);
            }
            Err(err) => {
                return SyncResult::error(id.clone(), format!("Failed to read HEAD: {err}"));
            }
        };

        let path = self.store.path_for(id);
        let mut step = UpdateStep::Pull;
        loop {
            step = match step {
                UpdateStep::Pull => match self.vcs.pull(&path) {
                    Ok(()) => UpdateStep::Done(self.advance_outcome(id, &path, &old, false)),
                    Err(err) => {
                        warn!("Pull failed for {} ({:?}): {}", id, err.kind, err);
                        self.next_step(Stage::Pull, &err)
                    }
                },
                UpdateStep::ForcedSync => match self.force_sync(&path, &old) {
                    Ok(()) => UpdateStep::Done(self.advance_outcome(id, &path, &old, true)),
                    Err(err) => {
                        error!("Forced sync failed for {} ({:?}): {}", id, err.kind, err);
                        self.next_step(Stage::ForcedSync, &err)
                    }
                },
                UpdateStep::Reclone => {
                    warn!("Recloning {} after an invalid path", id);
                    return self.reclone_repo(id);
                }
                UpdateStep::Done(outcome) => return SyncResult::new(id.clone(), outcome),
            };
        }
    }

    /// Delete the mirror (if any) and clone it again
    pub fn reclone_repo(&self, id: &RepoId) -> SyncResult {
        let path = self.store.path_for(id);

        if self.store.exists(id) {
            if let Err(err) = self.remove_with_retry(id) {
                error!("Giving up deleting {}: {}", path.display(), err);
                return SyncResult::error(id.clone(), describe_delete_failure(&path, &err));
            }
        }

        let url = id.remote_url(&self.policy.remote_template);
        info!("Recloning repository {}", id);
        match self.vcs.clone_repo(&url, &path) {
            Ok(()) => {
                self.configure_mirror(id, &path);
                SyncResult::new(id.clone(), SyncOutcome::Recloned)
            }
            Err(err) => {
                error!("Failed to reclone {}: {}", id, err);
                SyncResult::error(id.clone(), err.to_string())
            }
        }
    }

    fn next_step(&self, stage: Stage, err: &VcsError) -> UpdateStep {
        match escalate(stage, err.kind, &self.policy) {
            Escalation::ForcedSync => UpdateStep::ForcedSync,
            Escalation::Reclone => UpdateStep::Reclone,
            Escalation::Fail => UpdateStep::Done(SyncOutcome::Error {
                message: format!("Failed to update: {err}"),
            }),
        }
    }

    fn clone_with_retry(&self, id: &RepoId, url: &str, path: &Path) -> Result<(), VcsError> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let err = match self.vcs.clone_repo(url, path) {
                Ok(()) => return Ok(()),
                Err(err) => err,
            };
            warn!("Error cloning {} (attempt {}): {}", id, attempt, err);

            if !err.kind.is_transient() || attempt > self.policy.max_retries {
                return Err(err);
            }

            // A failed clone may leave a partial directory behind
            if self.store.exists(id) {
                if let Err(cleanup) = self.store.remove(id) {
                    debug!("Could not remove partial clone of {}: {}", id, cleanup);
                }
            }
            self.sleeper.sleep(self.policy.retry_delay);
        }
    }

    fn configure_mirror(&self, id: &RepoId, path: &Path) {
        for (key, value) in POST_CLONE_SETTINGS {
            if let Err(err) = self.vcs.set_config(path, key, value) {
                warn!("Failed to set {} for {}: {}", key, id, err);
            }
        }
    }

    fn force_sync(&self, path: &Path, old: &HeadState) -> Result<(), VcsError> {
        self.vcs.fetch(path)?;
        let branch = match &old.branch {
            Some(branch) => branch.clone(),
            None => self.vcs.head(path)?.branch.ok_or_else(|| {
                VcsError::new(
                    VcsErrorKind::MissingReference,
                    "HEAD is detached; there is no branch to reset",
                )
            })?,
        };
        self.vcs.reset_to_remote(path, &branch)
    }

    fn advance_outcome(
        &self,
        id: &RepoId,
        path: &Path,
        old: &HeadState,
        forced: bool,
    ) -> SyncOutcome {
        let new_hash = match self.vcs.head(path) {
            Ok(head) => head.hash,
            Err(err) => {
                return SyncOutcome::Error {
                    message: format!("Failed to read HEAD after update: {err}"),
                };
            }
        };

        if new_hash == old.hash {
            debug!("{} has no changes", id);
            return SyncOutcome::NoChanges;
        }

        let commits = self
            .vcs
            .log(path, &LogQuery::range(old.hash.as_str(), new_hash.as_str()))
            .unwrap_or_else(|err| {
                warn!("Could not list new commits of {}: {}", id, err);
                Vec::new()
            });
        info!("{} advanced by {} commits", id, commits.len());

        let advance = Advance {
            old_hash: old.hash.clone(),
            new_hash,
            commits,
        };
        if forced {
            SyncOutcome::UpdatedForced(advance)
        } else {
            SyncOutcome::Updated(advance)
        }
    }

    fn remove_with_retry(&self, id: &RepoId) -> io::Result<()> {
        let attempts = self.policy.delete_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.store.remove(id) {
                Ok(()) => return Ok(()),
                Err(err) if attempt < attempts => {
                    warn!(
                        "Deleting {} failed (attempt {}/{}): {}",
                        id, attempt, attempts, err
                    );
                    self.sleeper.sleep(self.policy.delete_delay);
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Permission and sharing failures usually mean another process holds files open
pub fn is_lock_failure(err: &io::Error) -> bool {
    if matches!(
        err.kind(),
        io::ErrorKind::PermissionDenied | io::ErrorKind::ResourceBusy
    ) {
        return true;
    }
    // ERROR_ACCESS_DENIED, ERROR_SHARING_VIOLATION
    cfg!(windows) && matches!(err.raw_os_error(), Some(5) | Some(32))
}

fn describe_delete_failure(path: &Path, err: &io::Error) -> String {
    if is_lock_failure(err) {
        format!(
            "Access denied while deleting repository directory. Close any program using files \
             in it (Git GUI, file explorer, editor, antivirus) or delete '{}' manually, then \
             try again. Original error: {}",
            path.display(),
            err
        )
    } else {
        format!("Failed to delete '{}': {}", path.display(), err)
    }
}
