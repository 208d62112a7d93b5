use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use mirrorsync::adapters::GitAdapter;
use mirrorsync::cli::{BatchArgs, CliArgs, Command};
use mirrorsync::config::Config;
use mirrorsync::domain::{CommitSummary, RepoId, SyncResult};
use mirrorsync::export::{self, SummaryExport};
use mirrorsync::logging;
use mirrorsync::ports::VcsPort;
use mirrorsync::progress::{self, ProgressRenderer};
use mirrorsync::repos;
use mirrorsync::services::{
    BatchResult, BatchRunner, ExecutionMode, HistoryQuery, HistoryService, SyncEngine,
    collect_stats,
};
use mirrorsync::store::MirrorStore;

struct App {
    config: Config,
    ids: Vec<RepoId>,
    vcs: Arc<dyn VcsPort>,
    store: MirrorStore,
    engine: SyncEngine,
    history: HistoryService,
}

impl App {
    fn new(config: Config, ids: Vec<RepoId>) -> Result<Self> {
        let vcs: Arc<dyn VcsPort> = Arc::new(GitAdapter::new());
        let store = MirrorStore::on_disk(&config.repos_dir);
        store.ensure_root().with_context(|| {
            format!(
                "Failed to create repositories directory: {}",
                config.repos_dir.display()
            )
        })?;

        let engine = SyncEngine::new(Arc::clone(&vcs), store.clone(), config.sync_policy());
        let history = HistoryService::new(Arc::clone(&vcs), store.clone())
            .with_search_depth(config.search_depth);

        Ok(Self {
            config,
            ids,
            vcs,
            store,
            engine,
            history,
        })
    }

    fn run(&self, command: Command) -> Result<()> {
        match command {
            Command::Clone(args) => self.batch(&args, "Cloning", |id| self.engine.clone_repo(id)),
            Command::Update(args) => {
                self.batch(&args, "Updating", |id| self.engine.update_repo(id))
            }
            Command::Summary => self.summary(),
            Command::History {
                repo,
                limit,
                author,
            } => self.show_history(&repo, limit, author),
            Command::Reclone { repo } => self.reclone(&repo),
            Command::Export { output } => self.export(output.as_deref()),
            Command::Stats => self.stats(),
            Command::List { pattern } => self.list(pattern.as_deref()),
            Command::Search { query } => self.search(&query),
        }
    }

    fn batch<F>(&self, args: &BatchArgs, verb: &str, op: F) -> Result<()>
    where
        F: Fn(&RepoId) -> SyncResult + Sync,
    {
        if self.ids.is_empty() {
            println!("No repositories to process");
            return Ok(());
        }

        let mode = ExecutionMode::from_parallel(args.parallel(self.config.auto_parallel));
        println!("{} {} repositories ({:?})...", verb, self.ids.len(), mode);

        let mut batch = with_progress(|runner| runner.run_sync(&self.ids, mode, op), &self.config);
        batch.sort_by_repo();
        print_batch(&batch);

        export::write_json(&args.output, &export::result_records(&batch.results))?;
        println!("Results saved to {}", args.output.display());
        Ok(())
    }

    fn summary(&self) -> Result<()> {
        let summaries = with_progress(
            |runner| {
                runner.run(&self.ids, ExecutionMode::Sequential, |id| {
                    self.history.last_commit(id)
                })
            },
            &self.config,
        );

        for summary in &summaries {
            match summary {
                CommitSummary::Present { repo, commit } => {
                    println!("{repo}");
                    println!(
                        "  {} {} {}: {}",
                        commit.short_hash(),
                        commit.timestamp,
                        commit.author.name,
                        commit.summary()
                    );
                }
                CommitSummary::NotCloned { repo } => println!("{repo}\n  not cloned"),
                CommitSummary::Error { repo, message } => println!("{repo}\n  error: {message}"),
            }
        }
        Ok(())
    }

    fn show_history(&self, repo: &str, limit: Option<usize>, author: Option<String>) -> Result<()> {
        let id = RepoId::parse(repo)?;
        let query = HistoryQuery {
            limit: Some(limit.unwrap_or(self.config.default_commit_limit)),
            author,
        };
        let commits = self.history.history(&id, &query)?;

        if commits.is_empty() {
            println!("No commits found for {id}");
            return Ok(());
        }
        println!("{} commits of {}:", commits.len(), id);
        for commit in &commits {
            println!(
                "{} {} {}: {}",
                commit.short_hash(),
                commit.timestamp,
                commit.author.name,
                commit.summary()
            );
        }
        Ok(())
    }

    fn reclone(&self, repo: &str) -> Result<()> {
        let id = RepoId::parse(repo)?;
        let result = self.engine.reclone_repo(&id);
        match result.outcome.error_message() {
            Some(message) => println!("✗ {id}: {message}"),
            None => println!("✓ {id}: {}", result.status()),
        }
        Ok(())
    }

    fn export(&self, output: Option<&Path>) -> Result<()> {
        let now = Local::now();
        let summaries = self.history.last_commit_summaries(&self.ids);
        let envelope = SummaryExport::new(now, &summaries);

        let default_name = SummaryExport::default_file_name(now);
        let path = output.unwrap_or_else(|| Path::new(&default_name));
        export::write_json(path, &envelope)?;
        println!(
            "Exported {} summaries to {}",
            envelope.total_repos,
            path.display()
        );
        Ok(())
    }

    fn stats(&self) -> Result<()> {
        let stats = collect_stats(&self.store, self.vcs.as_ref(), &self.ids);
        println!("Repositories listed: {}", stats.listed);
        println!("Cloned:              {}", stats.cloned);
        println!("Not cloned:          {}", stats.not_cloned);
        println!("Total size:          {:.2} MB", stats.total_size_mb());
        println!("Total commits:       {}", stats.total_commits);
        if let Some(average) = stats.average_commits() {
            println!("Average commits:     {average:.1}");
        }
        Ok(())
    }

    fn list(&self, pattern: Option<&str>) -> Result<()> {
        let ids = match pattern {
            Some(pattern) => repos::filter_repos(&self.ids, pattern)
                .with_context(|| format!("Invalid pattern '{pattern}'"))?,
            None => self.ids.clone(),
        };
        for id in &ids {
            let mark = if self.store.exists(id) {
                "✓ cloned"
            } else {
                "✗ not cloned"
            };
            println!("{id:<50} {mark}");
        }
        println!("{} repositories", ids.len());
        Ok(())
    }

    fn search(&self, query: &str) -> Result<()> {
        let hits = self.history.search_messages(query, &self.ids);
        if hits.is_empty() {
            println!("No commits matching '{query}'");
            return Ok(());
        }
        for repo_hits in &hits {
            println!("{} ({} matches)", repo_hits.repo, repo_hits.count);
            for m in &repo_hits.matches {
                println!("  {} {} {}: {}", m.hash, m.date, m.author, m.message);
            }
        }
        Ok(())
    }
}

/// Run a batch with a progress renderer attached, then wait for it to drain
fn with_progress<R>(work: impl FnOnce(&BatchRunner) -> R, config: &Config) -> R {
    let (tx, handle) = progress::spawn(ProgressRenderer::new());
    let runner = BatchRunner::new(config.batch_policy()).with_progress(tx);
    let result = work(&runner);
    drop(runner);
    if handle.join().is_err() {
        warn!("Progress renderer panicked");
    }
    result
}

fn print_batch(batch: &BatchResult) {
    let summary = batch.summary();
    println!();
    println!("Total:       {}", summary.total);
    println!("Successful:  {}", summary.succeeded);
    println!("Errors:      {}", summary.errored);
    println!("Updated:     {}", summary.updated);
    println!("New commits: {}", summary.new_commits);

    let errors: Vec<_> = batch.errors().collect();
    if !errors.is_empty() {
        println!();
        println!("Failed repositories:");
        for result in errors {
            println!(
                "  {}: {}",
                result.repo,
                result.outcome.error_message().unwrap_or_default()
            );
        }
    }
}

fn main() -> Result<()> {
    let cli_args = CliArgs::parse();
    let config = Config::from_cli_and_file(&cli_args)?;
    logging::init(&config.logging)?;

    info!("Starting mirrorsync");

    let mut ids = repos::load_repo_list(&config.repos_file)?;
    if let Some(pattern) = &cli_args.filter {
        ids = repos::filter_repos(&ids, pattern)
            .with_context(|| format!("Invalid filter pattern '{pattern}'"))?;
    }

    let app = App::new(config, ids)?;
    app.run(cli_args.command)
}
