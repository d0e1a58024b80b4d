//! Command-line interface for notion-archive.
//!
//! Only argument parsing, client wiring and user-visible output live here; all
//! archive logic is in [`notion_archive_core`].
//!
//! ## Commands
//! - `archive <url>... [--dry-run] [--push]` back up one or more pages
//! - `check` validate the configuration without touching the network
//!
//! For programmatic and integration use, call [`run`] with a constructed [`Cli`].
use crate::load_config::load_config;
use anyhow::Result;
use clap::{Parser, Subcommand};
use notion_archive_core::config::ArchiveConfig;
use notion_archive_core::export::NotionExporter;
use notion_archive_core::metadata::NotionApiClient;
use notion_archive_core::pipeline::{archive_urls, preview_urls, ArchiveReport, Console};

/// CLI for notion-archive: back up Notion pages as PDFs into a git repository.
#[derive(Parser)]
#[clap(
    name = "notion-archive",
    version,
    about = "Export Notion pages to PDF and commit them into a git repository"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Export the given pages to PDF and commit them into the target repository
    Archive {
        /// Notion page URL(s), separated by spaces
        #[clap(required = true)]
        urls: Vec<String>,
        /// Only resolve page ids and metadata; write and commit nothing
        #[clap(long)]
        dry_run: bool,
        /// Push the target branch after each commit (also enabled by GIT_AUTO_PUSH)
        #[clap(long)]
        push: bool,
    },
    /// Validate the configuration without contacting Notion
    Check,
}

/// Async CLI entrypoint shared by `main()` and integration tests.
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    let config = load_config()?;
    execute(cli.command, &config).await
}

/// Run one command against an already loaded configuration.
pub async fn execute(command: Commands, config: &ArchiveConfig) -> Result<()> {
    let mut out = std::io::stdout();
    let mut err = std::io::stderr();
    let mut console = Console {
        out: &mut out,
        err: &mut err,
    };

    match command {
        Commands::Archive {
            urls,
            dry_run: true,
            ..
        } => {
            tracing::info!(
                command = "archive",
                dry_run = true,
                urls = urls.len(),
                "Starting dry run"
            );
            let metadata = NotionApiClient::new(&config.api_base_url, &config.notion_token);
            let report = preview_urls(config, &metadata, &urls, &mut console).await?;
            finish(&report)
        }
        Commands::Archive {
            urls,
            dry_run: false,
            push,
        } => {
            let tokens = config.require_export_tokens()?;
            let push = push_enabled(push, config.auto_push);
            tracing::info!(command = "archive", push, urls = urls.len(), "Starting archive run");

            let metadata = NotionApiClient::new(&config.api_base_url, &config.notion_token);
            let exporter = NotionExporter::new(tokens.clone(), config.export.clone());
            let report =
                archive_urls(config, &exporter, &metadata, &urls, push, &mut console).await?;
            finish(&report)
        }
        Commands::Check => {
            println!("[check] target_repo={}", config.target_repo.display());
            println!("[check] output_dir={}", config.output_dir().display());
            println!("[check] branch={}", config.branch);
            println!("[check] notion_token_length={}", config.notion_token.len());
            println!(
                "[check] export_tokens={}",
                if config.export_tokens.is_some() { "present" } else { "missing" }
            );
            println!("[check] auto_push={}", config.auto_push);
            println!("\nConfiguration OK.");
            Ok(())
        }
    }
}

/// `--push` or `GIT_AUTO_PUSH`, resolved once here and passed down explicitly.
fn push_enabled(flag: bool, auto_push: bool) -> bool {
    flag || auto_push
}

fn finish(report: &ArchiveReport) -> Result<()> {
    let total = report.pages.len();
    let failed = report.failed_count();
    if report.dry_run {
        println!("\nDry run complete: {total} page(s) checked, {failed} failed. Nothing was written.");
    } else {
        println!("\nArchive complete: {total} page(s) processed, {failed} failed.");
    }
    tracing::info!(total, failed, dry_run = report.dry_run, "Run finished");

    if failed > 0 {
        anyhow::bail!("{failed} of {total} page(s) failed");
    }
    Ok(())
}
