//! Loading and filtering the list of managed repositories.

use crate::domain::RepoId;
use anyhow::{Context, Result};
use regex::RegexBuilder;
use std::fs;
use std::io;
use std::path::Path;
use tracing::{error, info, warn};

/// Parse one `owner/name` per line; blank lines are skipped, malformed ones logged and skipped
pub fn parse_repo_list(contents: &str) -> Vec<RepoId> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| match RepoId::parse(line) {
            Ok(id) => Some(id),
            Err(err) => {
                warn!("Skipping line: {}", err);
                None
            }
        })
        .collect()
}

/// A missing file yields an empty list rather than an error
pub fn load_repo_list(path: &Path) -> Result<Vec<RepoId>> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            error!("{} not found", path.display());
            return Ok(Vec::new());
        }
        Err(err) => {
            return Err(err).with_context(|| format!("Failed to read {}", path.display()));
        }
    };

    let repos = parse_repo_list(&contents);
    if repos.is_empty() {
        warn!("{} is empty", path.display());
    } else {
        info!("Loaded {} repositories from {}", repos.len(), path.display());
    }
    Ok(repos)
}

/// Keep identifiers matching a case-insensitive regex
pub fn filter_repos(repos: &[RepoId], pattern: &str) -> Result<Vec<RepoId>, regex::Error> {
    let regex = RegexBuilder::new(pattern).case_insensitive(true).build()?;
    let filtered: Vec<RepoId> = repos
        .iter()
        .filter(|id| regex.is_match(id.as_str()))
        .cloned()
        .collect();
    info!(
        "Filtered {} repositories matching pattern '{}'",
        filtered.len(),
        pattern
    );
    Ok(filtered)
}
