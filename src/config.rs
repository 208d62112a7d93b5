use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use serde_with::{DurationSeconds, serde_as};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::cli::CliArgs;
use crate::services::{BatchPolicy, SyncPolicy, history::DEFAULT_SEARCH_DEPTH};

#[serde_as]
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(default)]
pub struct Config {
    pub repos_dir: PathBuf,
    pub repos_file: PathBuf,
    /// `{id}` is replaced by `owner/name`
    pub remote_template: String,
    pub max_retries: u32,
    #[serde_as(as = "DurationSeconds<u64>")]
    pub retry_delay: Duration,
    pub delete_retries: u32,
    #[serde_as(as = "DurationSeconds<u64>")]
    pub delete_delay: Duration,
    pub max_workers: usize,
    pub auto_parallel: bool,
    pub default_commit_limit: usize,
    pub search_depth: usize,
    pub reclone_on_invalid_path: bool,
    pub logging: LoggingConfig,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub enabled: bool,
    pub level: String,
    pub file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        let sync = SyncPolicy::default();
        Self {
            repos_dir: PathBuf::from("./repos"),
            repos_file: PathBuf::from("repos.txt"),
            remote_template: sync.remote_template,
            max_retries: sync.max_retries,
            retry_delay: sync.retry_delay,
            delete_retries: sync.delete_attempts,
            delete_delay: sync.delete_delay,
            max_workers: BatchPolicy::default().max_workers,
            auto_parallel: true,
            default_commit_limit: 50,
            search_depth: DEFAULT_SEARCH_DEPTH,
            reclone_on_invalid_path: sync.reclone_on_invalid_path,
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            file: Some(PathBuf::from("mirrorsync.log")),
        }
    }
}

pub fn get_default_config_path() -> Result<PathBuf> {
    let proj_dirs = ProjectDirs::from("", "", "mirrorsync")
        .context("Failed to determine project directories")?;

    let config_dir = proj_dirs.config_dir();
    Ok(config_dir.join("mirrorsync.toml"))
}

impl Config {
    pub fn load(config_path: Option<PathBuf>) -> Result<Self> {
        let path = match config_path {
            Some(p) => p,
            None => get_default_config_path()?,
        };

        if !path.exists() {
            let default_config = Config::default();
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).context("Failed to create config directory")?;
            }
            default_config.save(&path)?;
            return Ok(default_config);
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    pub fn from_cli_and_file(cli_args: &CliArgs) -> Result<Self> {
        let mut config = Self::load(cli_args.config.clone())?;

        // CLI args override config file
        if let Some(repos_dir) = &cli_args.repos_dir {
            config.repos_dir = repos_dir.clone();
        }
        if let Some(repos_file) = &cli_args.repos_file {
            config.repos_file = repos_file.clone();
        }
        if let Some(workers) = cli_args.workers {
            config.max_workers = workers;
        }

        Ok(config)
    }

    pub fn sync_policy(&self) -> SyncPolicy {
        SyncPolicy {
            max_retries: self.max_retries,
            retry_delay: self.retry_delay,
            delete_attempts: self.delete_retries,
            delete_delay: self.delete_delay,
            remote_template: self.remote_template.clone(),
            reclone_on_invalid_path: self.reclone_on_invalid_path,
        }
    }

    pub fn batch_policy(&self) -> BatchPolicy {
        BatchPolicy {
            max_workers: self.max_workers,
        }
    }
}
