use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use binday::config::Config;
use binday::fanout::{
    FanoutCoordinator, DEFAULT_LOCATION, DEFAULT_REMINDER_MINUTES, DEFAULT_TITLE,
};
use binday::integrations::IntegrationRegistry;
use binday::models::CollectionResult;
use binday::scraper::{AddressResolver, CollectionScraper};
use binday::session::RemoteSession;

#[derive(Parser)]
#[command(
    name = "binday",
    version,
    about = "Belfast bin collection dates delivered to calendars and notifiers",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path (falls back to CONFIG_PATH, then config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long, global = true, default_value = "text")]
    log_format: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape the next collection date and deliver it to enabled backends
    Run {
        /// Print the scraped date without delivering it anywhere
        #[arg(long, default_value = "false")]
        dry_run: bool,

        /// Keep the process alive serving the status API after the run
        #[arg(long, default_value = "false")]
        serve: bool,

        /// Event title used for calendar entries and notifications
        #[arg(long, default_value = DEFAULT_TITLE)]
        title: String,

        /// Event location for calendar entries
        #[arg(long, default_value = DEFAULT_LOCATION)]
        location: String,

        /// Calendar reminder lead time in minutes
        #[arg(long, default_value_t = DEFAULT_REMINDER_MINUTES)]
        reminder_minutes: u32,
    },

    /// List the addresses the council lookup offers for a postcode
    Addresses {
        /// Postcode to look up (defaults to the configured one)
        #[arg(short, long)]
        postcode: Option<String>,
    },

    /// Show the configured run schedule
    Schedule,

    /// Serve the status API, refreshing the date once at startup
    Serve {
        /// Event title used for calendar entries and notifications
        #[arg(long, default_value = DEFAULT_TITLE)]
        title: String,

        /// Event location for calendar entries
        #[arg(long, default_value = DEFAULT_LOCATION)]
        location: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_tracing(&cli.log_format, cli.verbose)?;

    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            dry_run,
            serve,
            title,
            location,
            reminder_minutes,
        } => {
            tracing::info!(dry_run, serve, "starting collection run");
            run(config, dry_run, serve, &title, &location, reminder_minutes).await?;
        }

        Commands::Addresses { postcode } => {
            addresses(config, postcode).await?;
        }

        Commands::Schedule => {
            schedule(config)?;
        }

        Commands::Serve { title, location } => {
            serve(config, &title, &location).await?;
        }
    }

    Ok(())
}

fn setup_tracing(format: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("binday=debug,info")
    } else {
        tracing_subscriber::EnvFilter::new("binday=info,warn")
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}

/// Write the run outcome into the config document; failures only warn
async fn record_outcome(config: &Config, status: &str, message: &str) {
    if let Err(e) = config.record_last_run(status, message).await {
        tracing::warn!(error = %e, "last run not recorded");
    }
}

/// Open a session, scrape once, and always tear the session down
async fn scrape_once(config: &Config) -> Result<CollectionResult> {
    let session = RemoteSession::connect(&config.webdriver.host(), config.webdriver.port())
        .await
        .context("could not reach the WebDriver endpoint")?;

    let scraper_config = config.scraper_config();
    let scraper = CollectionScraper::new(&session, &scraper_config);
    let result = scraper.scrape(&config.address()).await;
    session.close().await;

    result.context("scrape failed")
}

async fn run(
    config: Config,
    dry_run: bool,
    keep_serving: bool,
    title: &str,
    location: &str,
    reminder_minutes: u32,
) -> Result<()> {
    config.validate_for_run()?;

    let result = match scrape_once(&config).await {
        Ok(result) => result,
        Err(e) => {
            record_outcome(&config, "error", &e.to_string()).await;
            return Err(e);
        }
    };
    let date = match &result {
        CollectionResult::Success(date) => *date,
        other => {
            record_outcome(&config, "error", &other.to_string()).await;
            anyhow::bail!("no collection date acquired: {other}");
        }
    };

    println!("Next collection: {}", date.format("%A %d %B %Y"));

    if dry_run {
        tracing::info!(date = %date, "dry run, skipping delivery");
        return Ok(());
    }

    let registry = IntegrationRegistry::build(&config).await;
    let report = FanoutCoordinator::new(&registry)
        .with_reminder_minutes(reminder_minutes)
        .publish(date, title, location)
        .await;
    for delivery in report.deliveries() {
        println!("{delivery}");
    }

    record_outcome(&config, "ok", &format!("collection date {date}")).await;

    if keep_serving {
        if registry.status_handle().is_some() {
            tracing::info!("run complete, status API stays up until interrupted");
            tokio::signal::ctrl_c().await?;
        } else {
            tracing::warn!("--serve given but the status API is not running");
        }
    }

    Ok(())
}

async fn addresses(config: Config, postcode: Option<String>) -> Result<()> {
    let postcode = postcode
        .or_else(|| config.address.postcode())
        .context("no postcode given; pass --postcode or configure one")?;

    let session = RemoteSession::connect(&config.webdriver.host(), config.webdriver.port())
        .await
        .context("could not reach the WebDriver endpoint")?;
    let scraper_config = config.scraper_config();
    let resolver = AddressResolver::new(&session, &scraper_config);
    let addresses = resolver.lookup(&postcode).await;
    session.close().await;

    let addresses = addresses.context("address lookup failed")?;
    if addresses.is_empty() {
        println!("No addresses found for {postcode}");
        return Ok(());
    }
    println!("Addresses for {postcode}:");
    for address in addresses {
        println!(
            "  {}  {}",
            address.id.as_deref().unwrap_or("-"),
            address.text.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

fn schedule(config: Config) -> Result<()> {
    let spec = config.schedule_spec()?;
    println!("Run schedule ({} lines):", spec.len());
    for line in spec.lines() {
        println!("  {:<20} {}", line.cron(), line.display());
    }
    Ok(())
}

async fn serve(config: Config, title: &str, location: &str) -> Result<()> {
    if !config.status.is_enabled() {
        anyhow::bail!("status API is disabled; enable it with ENABLE_REST_API=true");
    }

    let registry = IntegrationRegistry::build(&config).await;
    if registry.status_handle().is_none() {
        anyhow::bail!("status API did not start, see the log for the bind failure");
    }

    // Prime the API with a fresh date; scrape failures leave it serving 404
    if config.validate_for_run().is_ok() {
        match scrape_once(&config).await {
            Ok(CollectionResult::Success(date)) => {
                FanoutCoordinator::new(&registry)
                    .publish(date, title, location)
                    .await;
            }
            Ok(other) => tracing::warn!(outcome = %other, "startup scrape without a date"),
            Err(e) => tracing::warn!(error = %e, "startup scrape failed"),
        }
    }

    tracing::info!("status API serving until interrupted");
    tokio::signal::ctrl_c().await?;
    Ok(())
}
