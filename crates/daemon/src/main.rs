use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use starbackup_daemon::config::{self, Config, Settings};
use starbackup_daemon::run::{RunOptions, Runner};
use starbackup_github::GitHubError;
use tokio::time::sleep;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Back up a GitHub user's starred repositories as zipped mirrors.
#[derive(Parser)]
#[command(name = "starbackup", version)]
struct Cli {
    /// TOML config file; environment variables take precedence over it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Write archives into this directory instead of R2.
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// List what would be backed up without cloning or uploading.
    #[arg(long, global = true)]
    dry_run: bool,

    /// Only process the first N starred repositories.
    #[arg(long, global = true)]
    max_repos: Option<usize>,

    /// Skip contributor, language and topic lookups.
    #[arg(long, global = true)]
    no_enrich: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run a single backup (default).
    RunOnce,
    /// Run a backup every interval until interrupted.
    Schedule {
        #[arg(long, default_value = "24h")]
        interval: humantime::Duration,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let cfg = match &cli.config {
        Some(path) => {
            info!(?path, "loading config file");
            config::load_config(path)?
        }
        None => Config::default(),
    };
    let settings = Settings::resolve(&cfg, cli.output_dir.clone(), |name| env::var(name).ok())?;
    let opts = RunOptions {
        dry_run: cli.dry_run,
        max_repos: cli.max_repos.or(settings.max_repos),
        enrich: settings.enrich && !cli.no_enrich,
    };
    let runner = Runner::from_settings(&settings)?;

    match cli.command.unwrap_or(Command::RunOnce) {
        Command::RunOnce => runner.run_once(opts).await.map(|_| ()),
        Command::Schedule { interval } => {
            scheduler_loop(&runner, opts, interval.into()).await;
            Ok(())
        }
    }
}

async fn scheduler_loop(runner: &Runner, opts: RunOptions, interval: Duration) {
    info!(interval = %humantime::format_duration(interval), "starting scheduled backups");
    loop {
        if let Err(e) = runner.run_once(opts).await {
            if let Some(GitHubError::RateLimited { reset_at }) = e.downcast_ref::<GitHubError>() {
                warn!(%reset_at, "scheduled backup hit the GitHub rate limit");
            } else {
                error!(error = %format!("{e:#}"), "scheduled backup failed");
            }
        }
        sleep(interval).await;
    }
}
