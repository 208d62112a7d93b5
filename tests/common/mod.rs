#![allow(dead_code)]

use anyhow::Result;
use git2::{Repository, RepositoryInitOptions, Signature};
use mirrorsync::adapters::GitAdapter;
use mirrorsync::domain::RepoId;
use mirrorsync::ports::Sleeper;
use mirrorsync::services::{HistoryService, SyncEngine, SyncPolicy};
use mirrorsync::store::MirrorStore;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub struct NoSleep;

impl Sleeper for NoSleep {
    fn sleep(&self, _duration: Duration) {}
}

/// Upstream repositories under `<tmp>/upstream/<owner>/<name>` and mirrors under `<tmp>/mirrors`
pub struct Fixture {
    pub temp_dir: TempDir,
}

impl Fixture {
    pub fn new() -> Result<Self> {
        Ok(Self {
            temp_dir: TempDir::new()?,
        })
    }

    pub fn upstream_root(&self) -> PathBuf {
        self.temp_dir.path().join("upstream")
    }

    pub fn mirrors_root(&self) -> PathBuf {
        self.temp_dir.path().join("mirrors")
    }

    pub fn upstream_path(&self, id: &RepoId) -> PathBuf {
        self.upstream_root().join(id.owner()).join(id.name())
    }

    pub fn mirror_path(&self, id: &RepoId) -> PathBuf {
        self.mirrors_root().join(id.dir_name())
    }

    /// Create an upstream repository with one commit on `main`
    pub fn create_upstream(&self, raw: &str) -> Result<RepoId> {
        let id = RepoId::parse(raw)?;
        let path = self.upstream_path(&id);
        fs::create_dir_all(&path)?;
        let mut opts = RepositoryInitOptions::new();
        opts.initial_head("main");
        Repository::init_opts(&path, &opts)?;
        commit_file(&path, "README.md", "hello\n", "Initial commit", "Test User")?;
        Ok(id)
    }

    pub fn policy(&self) -> SyncPolicy {
        SyncPolicy {
            remote_template: format!("{}/{{id}}", self.upstream_root().display()),
            retry_delay: Duration::ZERO,
            delete_delay: Duration::ZERO,
            ..SyncPolicy::default()
        }
    }

    pub fn store(&self) -> MirrorStore {
        MirrorStore::on_disk(self.mirrors_root())
    }

    pub fn engine(&self) -> SyncEngine {
        self.engine_with(self.policy())
    }

    pub fn engine_with(&self, policy: SyncPolicy) -> SyncEngine {
        let store = self.store();
        store.ensure_root().expect("create mirrors root");
        SyncEngine::with_sleeper(Arc::new(GitAdapter::new()), store, policy, Arc::new(NoSleep))
    }

    pub fn history(&self) -> HistoryService {
        HistoryService::new(Arc::new(GitAdapter::new()), self.store())
    }
}

/// Write `file` and commit it on top of HEAD (if any); returns the new commit id
pub fn commit_file(
    repo_path: &Path,
    file: &str,
    contents: &str,
    message: &str,
    author: &str,
) -> Result<String> {
    let repo = Repository::open(repo_path)?;
    fs::write(repo_path.join(file), contents)?;

    let mut index = repo.index()?;
    index.add_path(Path::new(file))?;
    index.write()?;
    let tree = repo.find_tree(index.write_tree()?)?;

    let local_part = author.split_whitespace().next().unwrap_or("user");
    let email = format!("{}@example.com", local_part.to_lowercase());
    let signature = Signature::now(author, &email)?;
    let parent = match repo.head() {
        Ok(head) => Some(head.peel_to_commit()?),
        Err(_) => None,
    };
    let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();

    let oid = repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)?;
    Ok(oid.to_string())
}

pub fn head_of(repo_path: &Path) -> Result<String> {
    let repo = Repository::open(repo_path)?;
    Ok(repo.head()?.peel_to_commit()?.id().to_string())
}
