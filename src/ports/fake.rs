//! Scripted port implementations for unit tests

use super::{FileSystem, LogQuery, Sleeper, VcsPort};
use crate::domain::{Author, Commit, HeadState, Timestamp};
use crate::error::VcsError;
use std::collections::{HashSet, VecDeque};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn commit(hash: &str, message: &str, author: &str) -> Commit {
    Commit {
        hash: hash.to_string(),
        author: Author {
            name: author.to_string(),
            email: format!("{}@example.com", author.to_lowercase()),
        },
        message: message.to_string(),
        timestamp: Timestamp::new(1_700_000_000, 0),
    }
}

pub fn head(hash: &str) -> HeadState {
    HeadState {
        hash: hash.to_string(),
        branch: Some("main".to_string()),
    }
}

#[derive(Default)]
pub struct FakeFs {
    dirs: Mutex<HashSet<PathBuf>>,
    remove_failures: Mutex<VecDeque<io::ErrorKind>>,
    remove_calls: Mutex<usize>,
}

impl FakeFs {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_dir(&self, path: impl Into<PathBuf>) {
        self.dirs.lock().unwrap().insert(path.into());
    }

    /// Make the next `times` removals fail with `kind`
    pub fn fail_removes(&self, times: usize, kind: io::ErrorKind) {
        let mut failures = self.remove_failures.lock().unwrap();
        failures.extend(std::iter::repeat_n(kind, times));
    }

    pub fn remove_calls(&self) -> usize {
        *self.remove_calls.lock().unwrap()
    }
}

impl FileSystem for FakeFs {
    fn exists(&self, path: &Path) -> bool {
        self.dirs.lock().unwrap().contains(path)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        self.add_dir(path);
        Ok(())
    }

    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        *self.remove_calls.lock().unwrap() += 1;
        if let Some(kind) = self.remove_failures.lock().unwrap().pop_front() {
            return Err(io::Error::new(kind, "directory is in use"));
        }
        self.dirs.lock().unwrap().remove(path);
        Ok(())
    }
}

/// Scripted VCS: every primitive pops its next programmed outcome
pub struct FakeVcs {
    fs: Arc<FakeFs>,
    script: Mutex<Script>,
}

#[derive(Default)]
struct Script {
    clone_failures: VecDeque<VcsError>,
    heads: VecDeque<HeadState>,
    pull_failure: Option<VcsError>,
    fetch_failure: Option<VcsError>,
    reset_failure: Option<VcsError>,
    log: Option<Result<Vec<Commit>, VcsError>>,
    calls: Vec<String>,
}

impl FakeVcs {
    pub fn new(fs: Arc<FakeFs>) -> Self {
        Self {
            fs,
            script: Mutex::new(Script::default()),
        }
    }

    pub fn fail_clones(self, errors: impl IntoIterator<Item = VcsError>) -> Self {
        self.script.lock().unwrap().clone_failures.extend(errors);
        self
    }

    /// Successive `head()` results; the last one repeats
    pub fn heads(self, heads: impl IntoIterator<Item = HeadState>) -> Self {
        self.script.lock().unwrap().heads.extend(heads);
        self
    }

    pub fn fail_pull(self, error: VcsError) -> Self {
        self.script.lock().unwrap().pull_failure = Some(error);
        self
    }

    pub fn fail_fetch(self, error: VcsError) -> Self {
        self.script.lock().unwrap().fetch_failure = Some(error);
        self
    }

    pub fn fail_reset(self, error: VcsError) -> Self {
        self.script.lock().unwrap().reset_failure = Some(error);
        self
    }

    pub fn log_result(self, log: Result<Vec<Commit>, VcsError>) -> Self {
        self.script.lock().unwrap().log = Some(log);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.script.lock().unwrap().calls.clone()
    }

    fn record(&self, call: String) {
        self.script.lock().unwrap().calls.push(call);
    }
}

impl VcsPort for FakeVcs {
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<(), VcsError> {
        self.record(format!("clone {url}"));
        if let Some(err) = self.script.lock().unwrap().clone_failures.pop_front() {
            return Err(err);
        }
        self.fs.add_dir(dest);
        Ok(())
    }

    fn set_config(&self, _path: &Path, key: &str, value: &str) -> Result<(), VcsError> {
        self.record(format!("config {key}={value}"));
        Ok(())
    }

    fn head(&self, _path: &Path) -> Result<HeadState, VcsError> {
        self.record("head".to_string());
        let mut script = self.script.lock().unwrap();
        let next = if script.heads.len() > 1 {
            script.heads.pop_front()
        } else {
            script.heads.front().cloned()
        };
        next.ok_or_else(|| VcsError::new(crate::error::VcsErrorKind::MissingReference, "no HEAD"))
    }

    fn pull(&self, _path: &Path) -> Result<(), VcsError> {
        self.record("pull".to_string());
        match self.script.lock().unwrap().pull_failure.clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn fetch(&self, _path: &Path) -> Result<(), VcsError> {
        self.record("fetch".to_string());
        match self.script.lock().unwrap().fetch_failure.clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn reset_to_remote(&self, _path: &Path, branch: &str) -> Result<(), VcsError> {
        self.record(format!("reset origin/{branch}"));
        match self.script.lock().unwrap().reset_failure.clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn log(&self, _path: &Path, query: &LogQuery) -> Result<Vec<Commit>, VcsError> {
        self.record(match &query.range {
            Some(range) => format!("log {}..{}", range.from, range.to),
            None => "log".to_string(),
        });
        let log = self
            .script
            .lock()
            .unwrap()
            .log
            .clone()
            .unwrap_or_else(|| Ok(Vec::new()))?;
        let needle = query.author.as_ref().map(|a| a.to_lowercase());
        Ok(log
            .into_iter()
            .filter(|c| needle.as_ref().is_none_or(|n| c.author.matches(n)))
            .take(query.limit.unwrap_or(usize::MAX))
            .collect())
    }

    fn count_commits(&self, path: &Path) -> Result<usize, VcsError> {
        self.log(path, &LogQuery::head()).map(|commits| commits.len())
    }
}

#[derive(Default)]
pub struct RecordingSleeper {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}
