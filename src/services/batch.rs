//! Runs a single-repository operation over many identifiers.
//!
//! Parallel mode uses a fixed-size rayon pool. The only state shared between
//! workers is the completion counter and the result list, both behind one
//! mutex; progress events are sent while that lock is held so consumers see
//! `completed` strictly increasing.

use crate::domain::{CommitSummary, ProgressEvent, RepoId, SyncResult, SyncStatus};
use crate::services::summary::BatchSummary;
use crossbeam_channel::Sender;
use rayon::prelude::*;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, PoisonError};
use tracing::{error, info, warn};

pub const DEFAULT_MAX_WORKERS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Sequential,
    Parallel,
}

impl ExecutionMode {
    pub fn from_parallel(parallel: bool) -> Self {
        if parallel {
            ExecutionMode::Parallel
        } else {
            ExecutionMode::Sequential
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchPolicy {
    pub max_workers: usize,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
        }
    }
}

/// A per-repository result the orchestrator can report on
pub trait BatchOutcome: Send {
    fn repo(&self) -> &RepoId;

    /// Short label for progress output, e.g. `updated (3 new)`
    fn label(&self) -> String;

    fn is_ok(&self) -> bool;

    /// Result standing in for a unit of work that panicked
    fn from_failure(repo: RepoId, message: String) -> Self;
}

impl BatchOutcome for SyncResult {
    fn repo(&self) -> &RepoId {
        &self.repo
    }

    fn label(&self) -> String {
        match self.outcome.new_commit_count() {
            0 => self.status().to_string(),
            n => format!("{} ({} new)", self.status(), n),
        }
    }

    fn is_ok(&self) -> bool {
        self.status() != SyncStatus::Error
    }

    fn from_failure(repo: RepoId, message: String) -> Self {
        SyncResult::error(repo, message)
    }
}

impl BatchOutcome for CommitSummary {
    fn repo(&self) -> &RepoId {
        CommitSummary::repo(self)
    }

    fn label(&self) -> String {
        match self {
            CommitSummary::Present { .. } => "fetched".to_string(),
            CommitSummary::NotCloned { .. } => "not_cloned".to_string(),
            CommitSummary::Error { .. } => "error".to_string(),
        }
    }

    fn is_ok(&self) -> bool {
        !matches!(self, CommitSummary::Error { .. })
    }

    fn from_failure(repo: RepoId, message: String) -> Self {
        CommitSummary::Error { repo, message }
    }
}

/// Results of one batch of sync operations
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    /// Input order when sequential, completion order when parallel
    pub results: Vec<SyncResult>,
}

impl BatchResult {
    pub fn summary(&self) -> BatchSummary {
        BatchSummary::from_results(&self.results)
    }

    pub fn errors(&self) -> impl Iterator<Item = &SyncResult> {
        self.results.iter().filter(|r| r.outcome.is_error())
    }

    /// Reorder by identifier for stable output
    pub fn sort_by_repo(&mut self) {
        self.results.sort_by(|a, b| a.repo.cmp(&b.repo));
    }
}

struct Completion<T> {
    completed: usize,
    results: Vec<T>,
}

pub struct BatchRunner {
    policy: BatchPolicy,
    progress: Option<Sender<ProgressEvent>>,
}

impl BatchRunner {
    pub fn new(policy: BatchPolicy) -> Self {
        Self {
            policy,
            progress: None,
        }
    }

    pub fn with_progress(mut self, sender: Sender<ProgressEvent>) -> Self {
        self.progress = Some(sender);
        self
    }

    /// Apply a sync operation to every identifier
    pub fn run_sync<F>(&self, ids: &[RepoId], mode: ExecutionMode, op: F) -> BatchResult
    where
        F: Fn(&RepoId) -> SyncResult + Sync,
    {
        BatchResult {
            results: self.run(ids, mode, op),
        }
    }

    /// Apply `op` to every identifier and wait for all of them.
    ///
    /// Never fails: a panicking unit of work becomes a failure result for
    /// that identifier and the others carry on.
    pub fn run<T, F>(&self, ids: &[RepoId], mode: ExecutionMode, op: F) -> Vec<T>
    where
        T: BatchOutcome,
        F: Fn(&RepoId) -> T + Sync,
    {
        info!("Processing {} repositories ({:?})", ids.len(), mode);
        let results = match mode {
            ExecutionMode::Sequential => self.run_sequential(ids, &op),
            ExecutionMode::Parallel => self.run_parallel(ids, &op),
        };
        self.emit(ProgressEvent::BatchCompleted { total: ids.len() });
        results
    }

    fn run_sequential<T, F>(&self, ids: &[RepoId], op: &F) -> Vec<T>
    where
        T: BatchOutcome,
        F: Fn(&RepoId) -> T + Sync,
    {
        let total = ids.len();
        let mut results = Vec::with_capacity(total);

        for (index, id) in ids.iter().enumerate() {
            self.emit(ProgressEvent::Started {
                repo: id.clone(),
                position: index + 1,
                total,
            });
            let result = guarded(id, op);
            self.emit(finished_event(&result, index + 1, total));
            results.push(result);
        }

        results
    }

    fn run_parallel<T, F>(&self, ids: &[RepoId], op: &F) -> Vec<T>
    where
        T: BatchOutcome,
        F: Fn(&RepoId) -> T + Sync,
    {
        let workers = self.policy.max_workers.max(1);
        let pool = match rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("mirrorsync-worker-{i}"))
            .build()
        {
            Ok(pool) => pool,
            Err(err) => {
                warn!("Could not start worker pool, running sequentially: {}", err);
                return self.run_sequential(ids, op);
            }
        };

        let total = ids.len();
        let shared = Mutex::new(Completion {
            completed: 0,
            results: Vec::with_capacity(total),
        });

        pool.install(|| {
            ids.par_iter().for_each(|id| {
                let result = guarded(id, op);
                let mut state = shared.lock().unwrap_or_else(PoisonError::into_inner);
                state.completed += 1;
                self.emit(finished_event(&result, state.completed, total));
                state.results.push(result);
            });
        });

        shared
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .results
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(sender) = &self.progress {
            // A vanished progress consumer must not stop the batch
            let _ = sender.send(event);
        }
    }
}

fn guarded<T, F>(id: &RepoId, op: &F) -> T
where
    T: BatchOutcome,
    F: Fn(&RepoId) -> T,
{
    panic::catch_unwind(AssertUnwindSafe(|| op(id))).unwrap_or_else(|payload| {
        let message = format!("Unexpected error: {}", panic_message(payload.as_ref()));
        error!("Worker for {} panicked: {}", id, message);
        T::from_failure(id.clone(), message)
    })
}

fn finished_event<T: BatchOutcome>(result: &T, completed: usize, total: usize) -> ProgressEvent {
    ProgressEvent::Finished {
        repo: result.repo().clone(),
        label: result.label(),
        ok: result.is_ok(),
        completed,
        total,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SyncOutcome;
    use crossbeam_channel::unbounded;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ids(n: usize) -> Vec<RepoId> {
        (0..n)
            .map(|i| RepoId::parse(&format!("owner/repo-{i:02}")).unwrap())
            .collect()
    }

    fn flaky(id: &RepoId) -> SyncResult {
        if id.name().ends_with('3') {
            SyncResult::error(id.clone(), "remote unavailable")
        } else {
            SyncResult::new(id.clone(), SyncOutcome::NoChanges)
        }
    }

    #[test]
    fn test_sequential_keeps_input_order_and_reports_progress() {
        let (tx, rx) = unbounded();
        let runner = BatchRunner::new(BatchPolicy::default()).with_progress(tx);
        let input = ids(3);

        let batch = runner.run_sync(&input, ExecutionMode::Sequential, flaky);
        let order: Vec<_> = batch.results.iter().map(|r| r.repo.clone()).collect();
        assert_eq!(order, input);

        drop(runner);
        let events: Vec<_> = rx.iter().collect();
        assert_eq!(events.len(), 3 * 2 + 1);
        assert!(matches!(
            &events[0],
            ProgressEvent::Started { position: 1, total: 3, .. }
        ));
        assert!(matches!(
            &events[1],
            ProgressEvent::Finished { completed: 1, ok: true, .. }
        ));
        assert_eq!(events[6], ProgressEvent::BatchCompleted { total: 3 });
    }

    #[test]
    fn test_parallel_processes_everything_despite_errors() {
        let runner = BatchRunner::new(BatchPolicy { max_workers: 3 });
        let input = ids(25);

        let batch = runner.run_sync(&input, ExecutionMode::Parallel, flaky);
        assert_eq!(batch.results.len(), 25);

        let seen: HashSet<_> = batch.results.iter().map(|r| r.repo.clone()).collect();
        assert_eq!(seen.len(), 25);

        let summary = batch.summary();
        assert_eq!(summary.total, 25);
        assert_eq!(summary.errored, 3); // repo-03, repo-13, repo-23
    }

    #[test]
    fn test_parallel_total_independent_of_worker_count() {
        for workers in [1, 2, 4, 16] {
            let runner = BatchRunner::new(BatchPolicy {
                max_workers: workers,
            });
            let batch = runner.run_sync(&ids(10), ExecutionMode::Parallel, flaky);
            assert_eq!(batch.summary().total, 10, "workers = {workers}");
        }
    }

    #[test]
    fn test_parallel_progress_counter_is_monotonic() {
        let (tx, rx) = unbounded();
        let runner = BatchRunner::new(BatchPolicy { max_workers: 4 }).with_progress(tx);
        runner.run_sync(&ids(20), ExecutionMode::Parallel, flaky);
        drop(runner);

        let completed: Vec<usize> = rx
            .iter()
            .filter_map(|event| match event {
                ProgressEvent::Finished { completed, .. } => Some(completed),
                _ => None,
            })
            .collect();
        assert_eq!(completed, (1..=20).collect::<Vec<_>>());
    }

    #[test]
    fn test_panicking_worker_becomes_error_result() {
        let runner = BatchRunner::new(BatchPolicy { max_workers: 2 });
        let batch = runner.run_sync(&ids(4), ExecutionMode::Parallel, |id| {
            if id.name() == "repo-01" {
                panic!("corrupt packfile");
            }
            SyncResult::new(id.clone(), SyncOutcome::Cloned)
        });

        assert_eq!(batch.results.len(), 4);
        let failed: Vec<_> = batch.errors().collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(
            failed[0].outcome.error_message(),
            Some("Unexpected error: corrupt packfile")
        );
    }

    #[test]
    fn test_only_given_identifiers_are_touched() {
        let touched = Mutex::new(Vec::new());
        let all = ids(6);
        let subset: Vec<_> = all.iter().filter(|id| id.name() < "repo-02").cloned().collect();

        let runner = BatchRunner::new(BatchPolicy::default());
        runner.run_sync(&subset, ExecutionMode::Parallel, |id| {
            touched.lock().unwrap().push(id.clone());
            SyncResult::new(id.clone(), SyncOutcome::NoChanges)
        });

        let mut touched = touched.into_inner().unwrap();
        touched.sort();
        assert_eq!(touched, subset);
    }

    #[test]
    fn test_each_identifier_runs_once() {
        let calls = AtomicUsize::new(0);
        let runner = BatchRunner::new(BatchPolicy { max_workers: 8 });
        runner.run_sync(&ids(40), ExecutionMode::Parallel, |id| {
            calls.fetch_add(1, Ordering::SeqCst);
            SyncResult::new(id.clone(), SyncOutcome::NoChanges)
        });
        assert_eq!(calls.load(Ordering::SeqCst), 40);
    }

    #[test]
    fn test_labels() {
        let id = RepoId::parse("owner/repo").unwrap();
        let result = SyncResult::new(id.clone(), SyncOutcome::AlreadyCloned);
        assert_eq!(result.label(), "already_cloned");
        let summary = CommitSummary::NotCloned { repo: id };
        assert_eq!(summary.label(), "not_cloned");
        assert!(summary.is_ok());
    }
}
