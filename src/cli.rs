use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug, PartialEq)]
#[command(name = "mirrorsync")]
#[command(about = "Keep local mirrors of a list of remote Git repositories up to date")]
pub struct CliArgs {
    /// Path to configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding the mirrors (overrides config)
    #[arg(long, global = true)]
    pub repos_dir: Option<PathBuf>,

    /// File listing one owner/name per line (overrides config)
    #[arg(long, global = true)]
    pub repos_file: Option<PathBuf>,

    /// Worker threads for parallel batches (overrides config)
    #[arg(long, global = true)]
    pub workers: Option<usize>,

    /// Only operate on repositories whose name matches this case-insensitive regex
    #[arg(long, global = true)]
    pub filter: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Clone every repository that is not cloned yet
    Clone(BatchArgs),

    /// Pull every cloned repository, forcing a reset when a pull fails
    Update(BatchArgs),

    /// Show the last commit of every repository
    Summary,

    /// Show commit history of one repository
    History {
        repo: String,

        /// Maximum number of commits (defaults to the configured limit)
        #[arg(long)]
        limit: Option<usize>,

        /// Only commits whose author name or email contains this text
        #[arg(long)]
        author: Option<String>,
    },

    /// Delete a repository's mirror and clone it again
    Reclone { repo: String },

    /// Write last-commit summaries of every repository to a JSON file
    Export {
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Show clone counts, disk usage, and commit totals
    Stats,

    /// List repositories and whether they are cloned
    List {
        /// Case-insensitive regex on the repository name
        #[arg(long)]
        pattern: Option<String>,
    },

    /// Search recent commit messages across repositories
    Search { query: String },
}

#[derive(Args, Debug, PartialEq)]
pub struct BatchArgs {
    /// Process repositories concurrently
    #[arg(long, conflicts_with = "sequential")]
    pub parallel: bool,

    /// Process repositories one at a time
    #[arg(long)]
    pub sequential: bool,

    /// Where to write the per-repository results
    #[arg(long, default_value = "changes_results.json")]
    pub output: PathBuf,
}

impl BatchArgs {
    /// Explicit flags win over the configured default
    pub fn parallel(&self, auto_parallel: bool) -> bool {
        if self.parallel {
            true
        } else if self.sequential {
            false
        } else {
            auto_parallel
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_update_with_globals() {
        let args = CliArgs::parse_from([
            "mirrorsync",
            "update",
            "--sequential",
            "--repos-dir",
            "/mirrors",
        ]);
        assert_eq!(args.repos_dir, Some(PathBuf::from("/mirrors")));
        match args.command {
            Command::Update(batch) => {
                assert!(!batch.parallel(true));
                assert_eq!(batch.output, PathBuf::from("changes_results.json"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_parse_history() {
        let args = CliArgs::parse_from([
            "mirrorsync",
            "history",
            "octocat/hello",
            "--limit",
            "5",
            "--author",
            "ada",
        ]);
        assert_eq!(
            args.command,
            Command::History {
                repo: "octocat/hello".to_string(),
                limit: Some(5),
                author: Some("ada".to_string()),
            }
        );
    }

    #[test]
    fn test_parallel_defaults_to_config() {
        let args = CliArgs::parse_from(["mirrorsync", "clone"]);
        let Command::Clone(batch) = args.command else {
            panic!("expected clone");
        };
        assert!(batch.parallel(true));
        assert!(!batch.parallel(false));
    }

    #[test]
    fn test_parallel_and_sequential_conflict() {
        let result = CliArgs::try_parse_from(["mirrorsync", "clone", "--parallel", "--sequential"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_parse_filter() {
        let args = CliArgs::parse_from(["mirrorsync", "--filter", "^rust-lang/", "stats"]);
        assert_eq!(args.filter.as_deref(), Some("^rust-lang/"));
        assert_eq!(args.command, Command::Stats);
    }
}
