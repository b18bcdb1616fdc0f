//! Lead-Crawler main entry point
//!
//! This is the command-line interface for the lead discovery pipeline.

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use lead_crawler::config::{load_config_with_hash, Config};
use lead_crawler::crawler::{
    build_http_client, build_queries, CrawlScheduler, CrawlWorker, ReqwestTransport,
    WorkerSettings,
};
use lead_crawler::compliance::RobotsCache;
use lead_crawler::feedback::{FeedbackLogger, DEFAULT_FEEDBACK_CAPACITY};
use lead_crawler::output::{
    load_statistics, persist_run, print_statistics, write_lead_report, RunSummary,
};
use lead_crawler::providers::{SearchProvider, StaticSeedProvider};
use lead_crawler::queue::SharedTaskQueue;
use lead_crawler::storage::{open_storage, LeadLedger, RunStatus};
use lead_crawler::sweep::{OrgSweepScheduler, SweepOutcome, TaskEnvelope};
use lead_crawler::{CrawlResult, LeadRouter, LeadTier, PlanTier};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing_subscriber::EnvFilter;

/// Lead-Crawler: discovery, polite crawling and scoring of sales leads
///
/// Lead-Crawler turns a discovery intent into search queries, crawls the
/// resulting seed sites politely within plan budgets, extracts buying
/// signals and writes a tiered lead report.
#[derive(Parser, Debug)]
#[command(name = "lead-crawler")]
#[command(version)]
#[command(about = "Polite lead discovery and scoring", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Plan tier the run is billed against (free, pro, scale)
    #[arg(long, default_value = "free")]
    plan: PlanTier,

    /// Validate config and print the queries that would be issued
    #[arg(long, conflicts_with_all = ["stats", "sweep_once"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "sweep_once"])]
    stats: bool,

    /// Run one sweep tick over the stored orgs and print the decisions
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    sweep_once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config, cli.plan);
    } else if cli.stats {
        handle_stats(&config)?;
    } else if cli.sweep_once {
        handle_sweep_once(&config).await?;
    } else {
        handle_run(config, config_hash, cli.plan).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("lead_crawler=info,warn"),
            1 => EnvFilter::new("lead_crawler=debug,info"),
            2 => EnvFilter::new("lead_crawler=trace,debug"),
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

/// Handles the --dry-run mode: shows limits and the planned queries
fn handle_dry_run(config: &Config, plan: PlanTier) {
    println!("=== Lead-Crawler Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Per-host delay: {}ms", config.crawler.per_host_delay_ms);
    println!("  Concurrency: {}", config.crawler.concurrency);
    println!("  Respect robots.txt: {}", config.crawler.respect_robots);
    println!("  User-Agent: {}", config.user_agent.header_value());

    let limits = config.plans.limits(plan);
    println!("\nPlan '{}':", plan);
    println!("  Rate: {}/s (burst {})", limits.rate_per_sec, limits.burst);
    println!("  Parallel searches: {}", limits.max_parallel_searches);
    println!("  Seed URLs: {}", limits.max_seed_urls);
    println!("  Timeout: {}ms, byte budget: {}", limits.timeout_ms, limits.byte_budget);

    println!("\nSources ({}):", config.sources.len());
    for source in &config.sources {
        println!("  - {} ({} urls)", source.id, source.urls.len());
    }

    let queries = build_queries(&config.intent, &config.discovery);
    println!("\nQueries ({}):", queries.len());
    for query in &queries {
        let tags: Vec<&str> = query.tags.iter().map(String::as_str).collect();
        match &query.region {
            Some(region) => println!("  - {} [{}] ({})", query.text, region, tags.join(", ")),
            None => println!("  - {} ({})", query.text, tags.join(", ")),
        }
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let store = open_storage(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&store)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --sweep-once mode: one tick over the stored orgs
async fn handle_sweep_once(config: &Config) -> anyhow::Result<()> {
    let store = Arc::new(open_storage(Path::new(&config.output.database_path))?);
    let queue = SharedTaskQueue::<TaskEnvelope>::new();

    let sweeper = OrgSweepScheduler::new(
        config.sweep.clone(),
        config.plans.clone(),
        store,
        Arc::new(queue.clone()),
    );
    let report = sweeper.sweep_once(Utc::now()).await?;

    println!("=== Sweep ({} orgs) ===\n", report.decisions.len());
    for decision in &report.decisions {
        let outcome = match &decision.outcome {
            SweepOutcome::QuietHours => "quiet hours".to_string(),
            SweepOutcome::Backpressure { backlog, limit } => {
                format!("backpressure ({} queued, limit {})", backlog, limit)
            }
            SweepOutcome::DailyCapReached => "daily cap reached".to_string(),
            SweepOutcome::RateLimited { wait_ms } => format!("rate limited ({}ms)", wait_ms),
            SweepOutcome::Enqueued { discovery, refresh } => {
                format!("{} discovery, {} refresh", discovery, refresh)
            }
        };
        println!("  {}: {}", decision.org_id, outcome);
    }
    println!("\nEnvelopes queued: {}", queue.len());

    Ok(())
}

/// Handles the main discover → crawl → route run
async fn handle_run(config: Config, config_hash: String, plan: PlanTier) -> anyhow::Result<()> {
    let store = Arc::new(open_storage(Path::new(&config.output.database_path))?);
    let run_id = store.create_run(&config_hash, plan)?;
    let started_at = Utc::now();
    tracing::info!(run_id, plan = %plan, "Run started");

    let client = build_http_client(&config.user_agent, &config.crawler)?;
    let robots = Arc::new(RobotsCache::new(
        client.clone(),
        config.user_agent.header_value(),
    ));
    let (feedback, feedback_task) = FeedbackLogger::spawn(store.clone(), DEFAULT_FEEDBACK_CAPACITY);

    let results: Arc<Mutex<Vec<CrawlResult>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&results);
    let worker = Arc::new(
        CrawlWorker::builder(
            WorkerSettings::from_config(&config),
            Arc::new(ReqwestTransport::new(client)),
        )
        .robots(robots)
        .feedback(feedback)
        .on_result(move |result| {
            sink.lock().unwrap_or_else(PoisonError::into_inner).push(result);
        })
        .build(),
    );

    let providers: Vec<Arc<dyn SearchProvider>> = config
        .sources
        .iter()
        .map(|entry| Arc::new(StaticSeedProvider::from_entry(entry)) as Arc<dyn SearchProvider>)
        .collect();
    if providers.is_empty() {
        tracing::warn!("No discovery sources configured, nothing will be crawled");
    }

    let scheduler = CrawlScheduler::from_config(&config, providers, Arc::clone(&worker));
    let discovery = scheduler.discover_and_schedule(&config.intent, plan).await;
    tracing::info!(
        queries = discovery.queries,
        seeds = discovery.seeds,
        scheduled = discovery.scheduled.len(),
        "Discovery finished"
    );

    let interrupted = tokio::select! {
        _ = worker.wait_idle() => false,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted, stopping worker");
            true
        }
    };
    worker.stop();
    worker.join().await;

    // The feedback writer ends once the worker's logger handle is gone
    drop(scheduler);
    drop(worker);
    if let Err(e) = feedback_task.await {
        tracing::warn!(error = %e, "Feedback writer ended abnormally");
    }

    let results = std::mem::take(&mut *results.lock().unwrap_or_else(PoisonError::into_inner));
    let leads = LeadRouter::new().route_results(&results, &config.intent);

    persist_run(store.as_ref(), run_id, &results, &leads)?;
    if interrupted {
        store.finish_run(run_id, RunStatus::Interrupted)?;
    }

    let summary = RunSummary::new(plan, config_hash, started_at, &discovery, &results)
        .with_run_id(run_id);
    let report_path = Path::new(&config.output.report_path);
    write_lead_report(&summary, &leads, report_path)?;

    let hot = leads.iter().filter(|l| l.decision.tier == LeadTier::Hot).count();
    let warm = leads.iter().filter(|l| l.decision.tier == LeadTier::Warm).count();
    println!(
        "✓ {} results, {} leads ({} hot, {} warm)",
        results.len(),
        leads.len(),
        hot,
        warm
    );
    println!("✓ Report written to: {}", report_path.display());

    Ok(())
}
