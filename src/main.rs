use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ide_reset::config::Config;
use ide_reset::diff_watch;
use ide_reset::executor::{self, PendingRepo};
use ide_reset::git_ops::GitWorkTree;
use ide_reset::repo_select;
use ide_reset::repo_status::RepoStatus;

#[derive(Parser)]
#[command(
    name = "ide-reset",
    version,
    about = "Restores IDE metadata files to their committed state via Git.",
    args_conflicts_with_subcommands = true
)]
struct Cli {
    /// Repositories to reset; defaults to the watched list from the config
    paths: Vec<String>,

    /// Bound on waiting for a repository's diff, in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Add a repository to the default selection
    Watch {
        /// Path to the repository
        path: String,
    },
    /// Remove a repository from the default selection
    Unwatch {
        /// Path to the repository
        path: String,
    },
    /// Show the default selection
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Watch { path }) => {
            let mut config = Config::load();
            config.set_watch(path);
            config.save();
            Ok(())
        }
        Some(Commands::Unwatch { path }) => {
            let mut config = Config::load();
            config.set_unwatch(path);
            config.save();
            Ok(())
        }
        Some(Commands::List) => {
            list_selection();
            Ok(())
        }
        None => run_reset(cli).await,
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ide_reset=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn list_selection() {
    let config = Config::load();
    if config.repos.is_empty() {
        println!("No repositories in the default selection.");
        return;
    }
    for repo in &config.repos {
        let status = RepoStatus::of(repo);
        let marker = if !status.exists {
            "missing"
        } else if !status.is_git_repo {
            "not a git repository"
        } else {
            "ok"
        };
        println!("{} [{marker}]", status.path.display());
    }
}

async fn run_reset(cli: Cli) -> Result<()> {
    let config = Config::load();
    let timeout = cli
        .timeout_secs
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.wait_timeout());

    let repos = repo_select::resolve(&cli.paths, &config)?;
    info!(count = repos.len(), "selected repositories");

    // One registration per repository up front, then a single background
    // task works through them in order.
    let pending: Vec<PendingRepo> = repos
        .iter()
        .map(|workdir| PendingRepo {
            workdir: workdir.clone(),
            handle: diff_watch::register(workdir),
        })
        .collect();

    let (cancel_tx, cancel_rx) = watch::channel(false);
    let mut job = tokio::spawn(executor::run(
        pending,
        Arc::new(GitWorkTree),
        timeout,
        cancel_rx,
    ));

    let outcome = tokio::select! {
        res = &mut job => res?,
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupt received, aborting");
            let _ = cancel_tx.send(true);
            (&mut job).await?
        }
    };

    let report = outcome?;
    println!(
        "Processed {} repositories: {} files reverted, {} deleted.",
        report.repos_processed, report.files_reverted, report.files_deleted
    );
    Ok(())
}

#[cfg(test)]
mod cli_tests {
    use super::*;

    #[test]
    fn parses_bare_invocation() {
        let cli = Cli::parse_from(["ide-reset"]);
        assert!(cli.command.is_none());
        assert!(cli.paths.is_empty());
        assert!(cli.timeout_secs.is_none());
    }

    #[test]
    fn parses_paths_and_timeout() {
        let cli = Cli::parse_from(["ide-reset", "--timeout-secs", "5", "/a", "/b"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.paths, vec!["/a".to_string(), "/b".to_string()]);
        assert_eq!(cli.timeout_secs, Some(5));
    }

    #[test]
    fn parses_watch_command() {
        let cli = Cli::parse_from(["ide-reset", "watch", "/work/alpha"]);
        match cli.command {
            Some(Commands::Watch { path }) => assert_eq!(path, "/work/alpha"),
            other => panic!("expected Watch, got {other:?}"),
        }
    }

    #[test]
    fn parses_unwatch_command() {
        let cli = Cli::parse_from(["ide-reset", "unwatch", "/work/alpha"]);
        match cli.command {
            Some(Commands::Unwatch { path }) => assert_eq!(path, "/work/alpha"),
            other => panic!("expected Unwatch, got {other:?}"),
        }
    }

    #[test]
    fn parses_list_command() {
        let cli = Cli::parse_from(["ide-reset", "list"]);
        assert!(matches!(cli.command, Some(Commands::List)));
    }
}
