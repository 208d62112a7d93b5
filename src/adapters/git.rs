use crate::domain::{Author, Commit, HeadState, Timestamp};
use crate::error::{VcsError, VcsErrorKind};
use crate::ports::{LogQuery, VcsPort};
use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::{ErrorClass, ErrorCode, FetchOptions, Repository as GitRepository, ResetType, Sort};
use std::path::Path;
use tracing::debug;

const REMOTE: &str = "origin";

/// `VcsPort` implementation on top of libgit2
#[derive(Debug, Default)]
pub struct GitAdapter;

impl GitAdapter {
    pub fn new() -> Self {
        Self
    }

    fn open(path: &Path) -> Result<GitRepository, VcsError> {
        GitRepository::open(path).map_err(|e| {
            VcsError::new(
                classify(&e),
                format!("Failed to open git repository at {}: {}", path.display(), e.message()),
            )
        })
    }

    fn fetch_origin(repo: &GitRepository) -> Result<(), VcsError> {
        let mut remote = repo.find_remote(REMOTE)?;
        let mut fetch_options = FetchOptions::new();
        remote.fetch(&[] as &[&str], Some(&mut fetch_options), None)?;
        Ok(())
    }

    fn active_branch(repo: &GitRepository) -> Result<String, VcsError> {
        let head = repo.head()?;
        if !head.is_branch() {
            return Err(VcsError::new(
                VcsErrorKind::MissingReference,
                "HEAD is detached; there is no active branch",
            ));
        }
        head.shorthand()
            .map(str::to_string)
            .ok_or_else(|| VcsError::new(VcsErrorKind::Other, "Branch name is not valid UTF-8"))
    }
}

impl VcsPort for GitAdapter {
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<(), VcsError> {
        debug!("git clone {} {}", url, dest.display());
        RepoBuilder::new().clone(url, dest)?;
        Ok(())
    }

    fn set_config(&self, path: &Path, key: &str, value: &str) -> Result<(), VcsError> {
        let repo = Self::open(path)?;
        let mut config = repo.config()?.open_level(git2::ConfigLevel::Local)?;
        config.set_str(key, value)?;
        Ok(())
    }

    fn head(&self, path: &Path) -> Result<HeadState, VcsError> {
        let repo = Self::open(path)?;
        let head = repo.head()?;
        let commit = head.peel_to_commit()?;
        let branch = if head.is_branch() {
            head.shorthand().map(str::to_string)
        } else {
            None
        };
        Ok(HeadState {
            hash: commit.id().to_string(),
            branch,
        })
    }

    fn pull(&self, path: &Path) -> Result<(), VcsError> {
        let repo = Self::open(path)?;
        Self::fetch_origin(&repo)?;

        let branch = Self::active_branch(&repo)?;
        let upstream = repo.find_reference(&format!("refs/remotes/{REMOTE}/{branch}"))?;
        let incoming = repo.reference_to_annotated_commit(&upstream)?;
        let (analysis, _) = repo.merge_analysis(&[&incoming])?;

        if analysis.is_up_to_date() {
            return Ok(());
        }
        if !analysis.is_fast_forward() {
            return Err(VcsError::new(
                VcsErrorKind::NotFastForward,
                format!("{branch} cannot be fast-forwarded to {REMOTE}/{branch}"),
            ));
        }

        // Safe checkout refuses to overwrite local modifications
        let target = repo.find_object(incoming.id(), None)?;
        let mut checkout = CheckoutBuilder::new();
        checkout.safe();
        repo.checkout_tree(&target, Some(&mut checkout))?;

        let mut local = repo.find_reference(&format!("refs/heads/{branch}"))?;
        local.set_target(incoming.id(), "pull: fast-forward")?;
        Ok(())
    }

    fn fetch(&self, path: &Path) -> Result<(), VcsError> {
        let repo = Self::open(path)?;
        Self::fetch_origin(&repo)
    }

    fn reset_to_remote(&self, path: &Path, branch: &str) -> Result<(), VcsError> {
        let repo = Self::open(path)?;
        let target = repo.revparse_single(&format!("refs/remotes/{REMOTE}/{branch}"))?;
        let mut checkout = CheckoutBuilder::new();
        checkout.force();
        repo.reset(&target, ResetType::Hard, Some(&mut checkout))?;
        Ok(())
    }

    fn log(&self, path: &Path, query: &LogQuery) -> Result<Vec<Commit>, VcsError> {
        let repo = Self::open(path)?;
        let mut revwalk = repo.revwalk()?;
        revwalk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME)?;

        match &query.range {
            Some(range) => {
                revwalk.push(repo.revparse_single(&range.to)?.id())?;
                revwalk.hide(repo.revparse_single(&range.from)?.id())?;
            }
            None => revwalk.push_head()?,
        }

        let limit = query.limit.unwrap_or(usize::MAX);
        let author = query.author.as_ref().map(|a| a.to_lowercase());
        let mut commits = Vec::new();
        if limit == 0 {
            return Ok(commits);
        }

        for oid in revwalk {
            let commit = to_commit(&repo.find_commit(oid?)?);
            if let Some(needle) = &author {
                if !commit.author.matches(needle) {
                    continue;
                }
            }
            commits.push(commit);
            if commits.len() >= limit {
                break;
            }
        }

        Ok(commits)
    }

    fn count_commits(&self, path: &Path) -> Result<usize, VcsError> {
        let repo = Self::open(path)?;
        let mut revwalk = repo.revwalk()?;
        revwalk.push_head()?;
        let mut count = 0;
        for oid in revwalk {
            oid?;
            count += 1;
        }
        Ok(count)
    }
}

fn to_commit(commit: &git2::Commit<'_>) -> Commit {
    let author = commit.author();
    let when = author.when();
    Commit {
        hash: commit.id().to_string(),
        author: Author {
            name: author.name().unwrap_or("").to_string(),
            email: author.email().unwrap_or("").to_string(),
        },
        message: String::from_utf8_lossy(commit.message_bytes()).trim().to_string(),
        timestamp: Timestamp::new(when.seconds(), when.offset_minutes()),
    }
}

/// Map a libgit2 error onto the recovery taxonomy using its code and class
pub fn classify(err: &git2::Error) -> VcsErrorKind {
    match err.code() {
        ErrorCode::Conflict
        | ErrorCode::MergeConflict
        | ErrorCode::Uncommitted
        | ErrorCode::Modified
        | ErrorCode::IndexDirty
        | ErrorCode::Locked => return VcsErrorKind::WorkingTreeConflict,
        ErrorCode::NotFastForward => return VcsErrorKind::NotFastForward,
        ErrorCode::NotFound | ErrorCode::UnbornBranch => return VcsErrorKind::MissingReference,
        ErrorCode::Auth | ErrorCode::Certificate => return VcsErrorKind::Network,
        _ => {}
    }

    match err.class() {
        ErrorClass::Net | ErrorClass::Http | ErrorClass::Ssl | ErrorClass::Ssh => {
            VcsErrorKind::Network
        }
        // libgit2 has no dedicated code for paths the filesystem rejects
        ErrorClass::Filesystem
        | ErrorClass::Os
        | ErrorClass::Checkout
        | ErrorClass::Index
        | ErrorClass::Tree
            if err.message().to_lowercase().contains("invalid path") =>
        {
            VcsErrorKind::InvalidPath
        }
        _ => VcsErrorKind::Other,
    }
}

impl From<git2::Error> for VcsError {
    fn from(err: git2::Error) -> Self {
        VcsError::new(classify(&err), err.message().to_string())
    }
}
