//! Delve main entry point
//!
//! This is the command-line interface for running and inspecting crawl jobs.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use delve::config::{load_config_with_hash, BrowserEngine, Config};
use delve::output::{
    format_job_list, format_job_summary, format_page_table, format_search_results,
    load_job_summary,
};
use delve::storage::{lock, OwnerIds};
use delve::{CrawlService, JobStatus};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Delve: bounded site crawling and quota-aware indexing
///
/// Delve crawls a single site up to a page and depth bound, analyzes the
/// most promising pages and indexes their content for search.
#[derive(Parser, Debug)]
#[command(name = "delve")]
#[command(version)]
#[command(about = "Bounded site crawler with chunked vector indexing", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    /// Validate the configuration and print the effective settings
    #[arg(long)]
    dry_run: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl a site and wait for the job to finish
    Crawl {
        /// Root URL of the site
        root_url: String,

        /// Page bound for this job (defaults to crawler.max-pages)
        #[arg(long)]
        max_pages: Option<u32>,

        /// User the job belongs to
        #[arg(long, default_value = "local")]
        owner: String,

        /// Profile the job belongs to
        #[arg(long, default_value = "default")]
        profile: String,
    },

    /// Show a job's status and counters
    Status { job_id: i64 },

    /// List a job's pages
    Pages { job_id: i64 },

    /// List a user's jobs
    Jobs {
        #[arg(default_value = "local")]
        owner: String,
    },

    /// Search indexed content
    Search {
        query: String,

        #[arg(long, default_value_t = 10)]
        limit: usize,

        /// Restrict results to one user
        #[arg(long)]
        owner: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    if cli.dry_run {
        print_dry_run(&config);
        return Ok(());
    }

    let Some(command) = cli.command else {
        bail!("no command given; run with --help for usage");
    };

    let service = CrawlService::from_config(config)
        .await
        .context("failed to initialize crawl service")?;

    match command {
        Command::Crawl {
            root_url,
            max_pages,
            owner,
            profile,
        } => handle_crawl(&service, &root_url, max_pages, OwnerIds::new(owner, profile)).await,
        Command::Status { job_id } => handle_status(&service, job_id),
        Command::Pages { job_id } => {
            let pages = service.get_job_pages(job_id)?;
            print!("{}", format_page_table(&pages));
            Ok(())
        }
        Command::Jobs { owner } => {
            let jobs = service.list_jobs_for_owner(&owner)?;
            print!("{}", format_job_list(&jobs));
            Ok(())
        }
        Command::Search {
            query,
            limit,
            owner,
        } => {
            let matches = service.search(&query, owner.as_deref(), limit).await?;
            print!("{}", format_search_results(&matches));
            Ok(())
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("delve=info,warn"),
            1 => EnvFilter::new("delve=debug,info"),
            2 => EnvFilter::new("delve=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn print_dry_run(config: &Config) {
    println!("=== Delve Dry Run ===\n");

    println!("Crawler:");
    println!("  Max depth: {}", config.crawler.max_depth);
    println!("  Max pages: {}", config.crawler.max_pages);
    println!("  Max analyzed: {}", config.crawler.analyzed_limit());
    println!("  Request delay: {}ms", config.crawler.request_delay_ms);
    println!("  Page timeout: {}s", config.crawler.page_timeout_secs);
    println!("  Analysis threshold: > {}", config.crawler.analysis_threshold);
    println!("  Respect robots.txt: {}", config.crawler.respect_robots);

    println!("\nUser Agent: {}", config.user_agent.header_value());
    println!("Database: {}", config.output.database_path);

    println!("\nIndex:");
    println!("  Document limit: {} bytes", config.index.document_limit_bytes);
    println!("  Chunk budget: {} bytes", config.index.chunk_budget());
    println!(
        "  Metadata limits: {} per value, {} total",
        config.index.metadata_value_limit_bytes, config.index.metadata_total_limit_bytes
    );
    println!("  Listing cap: {}", config.index.listing_cap);

    match &config.analyzer {
        Some(analyzer) => println!("\nAnalyzer: {} at {}", analyzer.model, analyzer.endpoint),
        None => println!("\nAnalyzer: heuristic (offline)"),
    }
    match config.browser.engine {
        BrowserEngine::Http => println!("Fetcher: http"),
        BrowserEngine::Chrome => println!("Fetcher: chrome (headless={})", config.browser.headless),
    }

    println!("\n✓ Configuration is valid");
}

/// Runs a crawl in the foreground; Ctrl-C cancels it
async fn handle_crawl(
    service: &CrawlService,
    root_url: &str,
    max_pages: Option<u32>,
    owner: OwnerIds,
) -> anyhow::Result<()> {
    let job = service.create_crawl_job(root_url, &owner, max_pages)?;
    let handle = service.spawn_job(job.id);
    let cancel = handle.cancellation_token();

    let job_id = job.id;
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling job {}", job_id);
            cancel.cancel();
        }
    });

    let finished = handle.wait().await?;
    interrupt.abort();

    let summary = {
        let storage = lock(&service.context().storage)?;
        load_job_summary(&*storage, finished.id)?
    };
    print!("{}", format_job_summary(&summary));

    if finished.status == JobStatus::Failed {
        bail!(
            "job {} failed: {}",
            finished.id,
            finished.error_message.unwrap_or_default()
        );
    }
    Ok(())
}

fn handle_status(service: &CrawlService, job_id: i64) -> anyhow::Result<()> {
    service.get_job_status(job_id)?;
    let storage = lock(&service.context().storage)?;
    let summary = load_job_summary(&*storage, job_id)?;
    print!("{}", format_job_summary(&summary));
    Ok(())
}
