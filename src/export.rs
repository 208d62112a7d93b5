//! JSON records written after batch operations.

use crate::domain::{Commit, CommitSummary, SyncResult, SyncStatus};
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// One repository's outcome, as written to `changes_results.json`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRecord {
    pub repo: String,
    pub status: SyncStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_commit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_commit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_commits_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_commits: Option<Vec<CommitRecord>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommitRecord {
    pub hash: String,
    pub message: String,
    pub author: String,
}

impl From<&Commit> for CommitRecord {
    fn from(commit: &Commit) -> Self {
        Self {
            hash: commit.hash.clone(),
            message: commit.message.clone(),
            author: commit.author.name.clone(),
        }
    }
}

impl From<&SyncResult> for ResultRecord {
    fn from(result: &SyncResult) -> Self {
        let advance = result.outcome.advance();
        Self {
            repo: result.repo.to_string(),
            status: result.status(),
            message: result.outcome.error_message().map(str::to_string),
            old_commit: advance.map(|a| a.old_hash.clone()),
            new_commit: advance.map(|a| a.new_hash.clone()),
            new_commits_count: advance.map(|a| a.commits.len()),
            new_commits: advance.map(|a| a.commits.iter().map(CommitRecord::from).collect()),
        }
    }
}

/// Last commit of one repository; `status` is only present when there is no commit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRecord {
    pub repo: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<SyncStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_commit: Option<LastCommitRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LastCommitRecord {
    pub hash: String,
    pub message: String,
    pub author: String,
    pub date: String,
}

impl From<&CommitSummary> for SummaryRecord {
    fn from(summary: &CommitSummary) -> Self {
        let repo = summary.repo().to_string();
        match summary {
            CommitSummary::Present { commit, .. } => Self {
                repo,
                status: None,
                message: None,
                last_commit: Some(LastCommitRecord {
                    hash: commit.hash.clone(),
                    message: commit.message.clone(),
                    author: commit.author.name.clone(),
                    date: commit.timestamp.to_rfc3339(),
                }),
            },
            CommitSummary::NotCloned { .. } => Self {
                repo,
                status: Some(SyncStatus::NotCloned),
                message: None,
                last_commit: None,
            },
            CommitSummary::Error { message, .. } => Self {
                repo,
                status: Some(SyncStatus::Error),
                message: Some(message.clone()),
                last_commit: None,
            },
        }
    }
}

/// Envelope of the summaries export
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryExport {
    pub export_date: String,
    pub total_repos: usize,
    pub summaries: Vec<SummaryRecord>,
}

impl SummaryExport {
    pub fn new(exported_at: DateTime<Local>, summaries: &[CommitSummary]) -> Self {
        Self {
            export_date: exported_at.to_rfc3339(),
            total_repos: summaries.len(),
            summaries: summaries.iter().map(SummaryRecord::from).collect(),
        }
    }

    /// `commit_summaries_YYYYMMDD_HHMMSS.json`
    pub fn default_file_name(exported_at: DateTime<Local>) -> String {
        format!("commit_summaries_{}.json", exported_at.format("%Y%m%d_%H%M%S"))
    }
}

pub fn result_records(results: &[SyncResult]) -> Vec<ResultRecord> {
    results.iter().map(ResultRecord::from).collect()
}

/// Pretty-printed, non-ASCII kept as is
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), value)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
