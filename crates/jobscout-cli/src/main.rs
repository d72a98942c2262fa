use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use jobscout_client::{
    BrowserSession, BrowserSettings, Credentials, DomExtractor, GatewayConfig, HttpGateway,
};
use jobscout_core::traits::{BackendGateway, KvStore};
use jobscout_core::{
    Cache, CacheTtls, DataService, DiscoverRequest, Discoverer, MemoryStore, Pacing,
    ProgressTracker, Processor, SiteProfile, TracingReporter, spawn_ticker,
};
use jobscout_store::{CacheConfig, RedisStore};

#[derive(Parser)]
#[command(name = "jobscout", version, about = "Job posting discovery and capture pipeline")]
struct Cli {
    /// JSON file overriding the built-in site selectors
    #[arg(long, global = true, env = "JOBSCOUT_SELECTORS")]
    selectors: Option<PathBuf>,

    /// Use an in-process cache instead of Redis (single-process runs only)
    #[arg(long, global = true, default_value_t = false)]
    ephemeral: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Walk search results and queue postings not seen before
    Discover {
        #[arg(short, long)]
        keywords: String,

        #[arg(short, long)]
        location: String,

        /// Stop after this many postings were newly queued
        #[arg(short, long)]
        total_jobs: usize,

        /// Initial search offset (defaults to the current queue size)
        #[arg(long)]
        start_from: Option<usize>,
    },

    /// Capture queued postings and commit them to the backend
    Process {
        /// Maximum number of postings to take off the queue
        #[arg(short, long)]
        limit: usize,
    },

    /// Discover then process in one run with one browser session
    Scrape {
        #[arg(short, long)]
        keywords: String,

        #[arg(short, long)]
        location: String,

        #[arg(short, long)]
        total_jobs: usize,
    },

    /// Drop the queue and every cached fact and entity
    ClearCache,

    /// Show queue size and whether the cache and backend are reachable
    Status,
}

impl Commands {
    fn needs_browser(&self) -> bool {
        matches!(
            self,
            Commands::Discover { .. } | Commands::Process { .. } | Commands::Scrape { .. }
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    init_tracing()?;

    let cli = Cli::parse();

    if let Ok(workers) = std::env::var("SCRAPER_WORKERS")
        && workers.trim() != "1"
    {
        tracing::warn!(%workers, "SCRAPER_WORKERS is ignored; the pipeline runs a single worker");
    }

    let profile = load_profile(cli.selectors.as_deref())?;
    let cache_config = CacheConfig::from_env().context("Invalid cache configuration")?;

    if cli.ephemeral {
        tracing::warn!("Using in-process cache; the queue will not outlive this run");
        execute(cli.command, MemoryStore::new(), cache_config.ttls(), profile).await
    } else {
        let store = RedisStore::connect(&cache_config)
            .await
            .context("Failed to connect to Redis")?;
        execute(cli.command, store, cache_config.ttls(), profile).await
    }
}

/// `RUST_LOG` wins; otherwise `LOG_LEVEL` sets the level of the `jobscout*` targets.
fn init_tracing() -> Result<()> {
    let filter = match std::env::var("RUST_LOG") {
        Ok(_) => EnvFilter::from_default_env(),
        Err(_) => {
            let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
            EnvFilter::try_new(format!("jobscout={level}"))
                .with_context(|| format!("Invalid LOG_LEVEL '{level}'"))?
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {e}"))
}

fn load_profile(path: Option<&Path>) -> Result<SiteProfile> {
    match path {
        Some(path) => {
            let profile = SiteProfile::from_path(path)
                .with_context(|| format!("Failed to load selectors from {}", path.display()))?;
            tracing::info!(path = %path.display(), "Loaded site selectors");
            Ok(profile)
        }
        None => Ok(SiteProfile::default()),
    }
}

async fn execute<K: KvStore>(
    command: Commands,
    store: K,
    ttls: CacheTtls,
    profile: SiteProfile,
) -> Result<()> {
    let cache = Cache::new(store, ttls);
    match command {
        // Only the cache is touched; backend settings are not required.
        Commands::ClearCache => cmd_clear_cache(&cache).await,
        Commands::Status => cmd_status(&with_backend(cache, profile)?).await,
        command => {
            debug_assert!(command.needs_browser());
            cmd_pipeline(command, &with_backend(cache, profile)?).await
        }
    }
}

fn with_backend<K: KvStore>(
    cache: Cache<K>,
    profile: SiteProfile,
) -> Result<DataService<K, HttpGateway>> {
    let gateway_config = GatewayConfig::from_env().context("Invalid backend configuration")?;
    let gateway = HttpGateway::new(&gateway_config).context("Failed to create backend client")?;
    Ok(DataService::new(cache, gateway, profile))
}

async fn cmd_clear_cache<K: KvStore>(cache: &Cache<K>) -> Result<()> {
    let report = cache.clear_all().await.context("Failed to clear cache")?;
    println!("Cleared {} queued postings", report.queued);
    println!(
        "Removed {} posting facts, {} company facts, {} company records",
        report.job_facts, report.company_facts, report.company_entities
    );
    Ok(())
}

async fn cmd_status<K: KvStore, G: BackendGateway>(data: &DataService<K, G>) -> Result<()> {
    let status = data.status().await;

    match (&status.queued, &status.cache_error) {
        (Some(queued), _) => println!("Queue:   {queued} postings waiting"),
        (None, Some(err)) => println!("Queue:   unavailable ({err})"),
        (None, None) => println!("Queue:   unknown"),
    }
    match &status.gateway_error {
        None => println!("Backend: reachable"),
        Some(err) => println!("Backend: unavailable ({err})"),
    }

    if !status.healthy() {
        bail!("Pipeline dependencies are not healthy");
    }
    Ok(())
}

/// Launch the browser, run the command against Ctrl-C, and always close it.
async fn cmd_pipeline<K: KvStore, G: BackendGateway>(
    command: Commands,
    data: &DataService<K, G>,
) -> Result<()> {
    let credentials = Credentials::from_env().context("Missing site credentials")?;
    let settings = BrowserSettings::from_env().context("Invalid browser configuration")?;
    let pacing = Pacing::from_env().context("Invalid pacing configuration")?;

    let warm = data.warm_up().await;
    tracing::info!(
        job_ids = warm.job_ids,
        companies = warm.companies,
        failures = warm.failures,
        "Cache warmed up"
    );

    let session = BrowserSession::launch(&settings)
        .await
        .context("Failed to start browser")?;

    let outcome = tokio::select! {
        result = run_pipeline(command, &session, &credentials, data, pacing) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Shutdown signal received");
            Err(anyhow::anyhow!("Interrupted"))
        }
    };

    if let Err(e) = session.close().await {
        tracing::warn!(error = %e, "Browser did not shut down cleanly");
    }
    outcome
}

async fn run_pipeline<K: KvStore, G: BackendGateway>(
    command: Commands,
    session: &BrowserSession,
    credentials: &Credentials,
    data: &DataService<K, G>,
    pacing: Pacing,
) -> Result<()> {
    session
        .login(credentials, data.profile())
        .await
        .context("Login failed")?;

    let extractor = DomExtractor::new(Arc::new(data.profile().clone()));

    match command {
        Commands::Discover {
            keywords,
            location,
            total_jobs,
            start_from,
        } => {
            let request = DiscoverRequest {
                keywords,
                location,
                target: total_jobs,
                start_from,
            };
            discover(session, extractor, data, pacing, &request).await
        }
        Commands::Process { limit } => process(session, extractor, data, pacing, limit).await,
        Commands::Scrape {
            keywords,
            location,
            total_jobs,
        } => {
            let request = DiscoverRequest {
                keywords,
                location,
                target: total_jobs,
                start_from: None,
            };
            discover(session, extractor.clone(), data, pacing, &request).await?;
            process(session, extractor, data, pacing, total_jobs).await
        }
        Commands::ClearCache | Commands::Status => Ok(()),
    }
}

async fn discover<K: KvStore, G: BackendGateway>(
    session: &BrowserSession,
    extractor: DomExtractor,
    data: &DataService<K, G>,
    pacing: Pacing,
    request: &DiscoverRequest,
) -> Result<()> {
    let tracker = Arc::new(ProgressTracker::new(request.target));
    let ticker = start_ticker(&tracker);

    let result = Discoverer::new(session, extractor, data, pacing)
        .with_progress(tracker.clone())
        .run(request, &TracingReporter)
        .await;
    stop_ticker(ticker);

    let report = result.context("Discovery failed")?;
    println!(
        "Discovery finished ({}): {} pages, {} new postings queued, {} already known, {} already queued",
        report.reason, report.pages, report.enqueued, report.known, report.duplicates
    );
    Ok(())
}

async fn process<K: KvStore, G: BackendGateway>(
    session: &BrowserSession,
    extractor: DomExtractor,
    data: &DataService<K, G>,
    pacing: Pacing,
    limit: usize,
) -> Result<()> {
    let queued = data.queue_size().await.context("Failed to read queue size")?;
    let tracker = Arc::new(ProgressTracker::new(limit.min(queued)));
    let ticker = start_ticker(&tracker);

    let result = Processor::new(session, extractor, data, pacing)
        .with_progress(tracker.clone())
        .run(limit, &TracingReporter)
        .await;
    stop_ticker(ticker);

    let report = result.context("Processing failed")?;
    println!(
        "Processing finished: {} saved, {} skipped, {} failed",
        report.saved, report.skipped, report.failed
    );
    println!("{}", tracker.render_line());
    Ok(())
}

/// The live status line only makes sense on an interactive terminal.
fn start_ticker(tracker: &Arc<ProgressTracker>) -> Option<tokio::task::JoinHandle<()>> {
    std::io::stderr()
        .is_terminal()
        .then(|| spawn_ticker(tracker.clone(), Duration::from_secs(1)))
}

fn stop_ticker(ticker: Option<tokio::task::JoinHandle<()>>) {
    if let Some(handle) = ticker {
        handle.abort();
        eprintln!();
    }
}
