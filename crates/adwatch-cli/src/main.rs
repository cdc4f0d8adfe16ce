use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::Mutex;
use tracing_subscriber::EnvFilter;

use adwatch_client::{BrowserExtractor, ListingParser};
use adwatch_core::traits::{ErrorSink, TargetSource, UpdateHandler};
use adwatch_core::{AppError, DispatchProxy, Listing, RingScheduler, SchedulerConfig};

#[derive(Parser)]
#[command(name = "adwatch", version, about = "Classified-ad change watcher")]
struct Cli {
    /// Newline-delimited file of listing URLs to watch
    #[arg(short, long, env = "ADWATCH_TARGETS")]
    targets: PathBuf,

    /// Seconds between scheduler ticks
    #[arg(long, env = "ADWATCH_INTERVAL", default_value_t = 10)]
    interval: u64,

    /// Per-fetch deadline in seconds
    #[arg(long, env = "ADWATCH_DEADLINE", default_value_t = 10)]
    deadline: u64,

    /// Seconds a fetched listing stays cold before it is revisited.
    /// Pick something larger than the upstream's page-cache lifetime.
    #[arg(long, env = "ADWATCH_TTL", default_value_t = 300)]
    ttl: u64,

    /// Result queue capacity
    #[arg(long, env = "ADWATCH_QUEUE", default_value_t = 2)]
    queue: usize,

    /// Cap on simultaneously in-flight fetches (unbounded when omitted)
    #[arg(long, env = "ADWATCH_MAX_IN_FLIGHT")]
    max_in_flight: Option<usize>,

    /// Directory for raw captures of unavailable listings
    #[arg(long, env = "ADWATCH_DUMP_DIR")]
    dump_dir: Option<PathBuf>,

    /// CSS selector for the listing title element
    #[arg(long, env = "ADWATCH_TITLE_SELECTOR")]
    title_selector: Option<String>,

    /// CSS selector for the listing price element
    #[arg(long, env = "ADWATCH_PRICE_SELECTOR")]
    price_selector: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("adwatch=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = SchedulerConfig {
        tick_interval: Duration::from_secs(cli.interval),
        fetch_deadline: Duration::from_secs(cli.deadline),
        cache_ttl: Duration::from_secs(cli.ttl),
        queue_capacity: cli.queue,
        max_in_flight: cli.max_in_flight,
    };

    let parser = match (&cli.title_selector, &cli.price_selector) {
        (Some(title), Some(price)) => ListingParser::with_selectors(title, price)?,
        (None, None) => ListingParser::new()?,
        _ => anyhow::bail!("--title-selector and --price-selector must be given together"),
    };
    let extractor = BrowserExtractor::with_parser(parser)
        .await
        .context("launching headless browser")?;

    let scheduler = RingScheduler::new(extractor, &config)?;

    let seeded = scheduler
        .seed(&FileTargetSource { path: cli.targets })
        .await?;
    tracing::info!(%seeded, watching = scheduler.target_count(), "registry seeded");

    let rx = scheduler
        .take_output()
        .context("result stream already taken")?;
    let mut proxy = DispatchProxy::new(rx, ChangeLogHandler::default(), TracingErrorSink);
    if let Some(dir) = cli.dump_dir {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("creating dump dir {}", dir.display()))?;
        proxy = proxy.with_dump_dir(dir);
    }
    let dispatch = tokio::spawn(proxy.run());

    scheduler.run(config.tick_interval);
    tracing::info!(
        interval_s = cli.interval,
        ttl_s = cli.ttl,
        "scheduler running, ctrl-c to stop"
    );

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    tracing::info!("shutting down");

    scheduler.close().await;
    dispatch.await.context("dispatch task panicked")?;

    tracing::info!("shutdown complete");
    Ok(())
}

/// Seeds the scheduler from a newline-delimited URL file.
///
/// Blank lines and `#` comments are skipped; a malformed URL is fatal, the
/// watcher should not start half-seeded.
struct FileTargetSource {
    path: PathBuf,
}

impl TargetSource for FileTargetSource {
    async fn initial_targets(&self) -> Result<Vec<String>, AppError> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| AppError::Config(format!("reading {}: {e}", self.path.display())))?;

        let mut targets = Vec::new();
        for line in raw.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            url::Url::parse(line)
                .map_err(|e| AppError::Config(format!("invalid target url {line:?}: {e}")))?;
            targets.push(line.to_string());
        }
        Ok(targets)
    }
}

/// Keeps the last seen title/price per listing and logs change events.
///
/// Stands in for a real subscription/notification service at the update
/// handler boundary.
#[derive(Default)]
struct ChangeLogHandler {
    seen: Mutex<HashMap<String, Listing>>,
}

impl UpdateHandler for ChangeLogHandler {
    async fn handle(&self, listing: &Listing) -> Result<(), AppError> {
        let mut seen = self.seen.lock().await;
        match seen.insert(listing.url.clone(), listing.clone()) {
            None => {
                tracing::info!(
                    url = %listing.url,
                    title = %listing.title,
                    price = listing.price,
                    "watching listing"
                );
            }
            Some(prev) => {
                if prev.price != listing.price {
                    tracing::info!(
                        url = %listing.url,
                        old_price = prev.price,
                        new_price = listing.price,
                        "price changed"
                    );
                }
                if prev.title != listing.title {
                    tracing::info!(
                        url = %listing.url,
                        old_title = %prev.title,
                        new_title = %listing.title,
                        "title changed"
                    );
                }
            }
        }
        Ok(())
    }
}

/// Error sink that reports through the log.
struct TracingErrorSink;

impl ErrorSink for TracingErrorSink {
    fn report(&self, err: AppError) {
        tracing::error!(%err, "pipeline failure");
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[tokio::test]
    async fn target_file_skips_blanks_and_comments() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "# watched listings\nhttps://ads.example/1\n\nhttps://ads.example/2\n"
        )
        .unwrap();

        let source = FileTargetSource {
            path: file.path().to_path_buf(),
        };
        let targets = source.initial_targets().await.unwrap();
        assert_eq!(targets, vec!["https://ads.example/1", "https://ads.example/2"]);
    }

    #[tokio::test]
    async fn malformed_url_fails_the_seed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "not a url").unwrap();

        let source = FileTargetSource {
            path: file.path().to_path_buf(),
        };
        assert!(matches!(
            source.initial_targets().await,
            Err(AppError::Config(_))
        ));
    }

    #[tokio::test]
    async fn missing_file_fails_the_seed() {
        let source = FileTargetSource {
            path: PathBuf::from("/nonexistent/targets.txt"),
        };
        assert!(source.initial_targets().await.is_err());
    }

    #[tokio::test]
    async fn change_handler_logs_without_erroring() {
        let handler = ChangeLogHandler::default();
        let first = Listing {
            url: "https://ads.example/1".into(),
            title: "Bike".into(),
            price: 100.0,
        };
        let cheaper = Listing {
            price: 80.0,
            ..first.clone()
        };

        handler.handle(&first).await.unwrap();
        handler.handle(&cheaper).await.unwrap();

        let seen = handler.seen.lock().await;
        assert_eq!(seen.get("https://ads.example/1").unwrap().price, 80.0);
    }
}
