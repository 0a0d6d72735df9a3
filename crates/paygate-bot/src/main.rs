//! Paygate Bot
//!
//! Reads chat events as NDJSON on stdin and writes replies to stdout.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::io::BufReader;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use paygate_bot::bot::{Bot, BotDeps};
use paygate_bot::clock::SystemClock;
use paygate_bot::notify::{Notifier, WebhookClient};
use paygate_bot::receipt::PdfTextExtractor;
use paygate_bot::storage::Database;
use paygate_bot::transport::{EventStream, NdjsonTransport};
use paygate_core::config::load_config;
use paygate_core::tracing_init::init_tracing;

#[derive(Parser, Debug)]
#[command(name = "paygate-bot")]
#[command(version, about = "Paygate bot - receipt validation and access codes")]
struct Args {
    /// Path to a JSON config file layered over the global one.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to SQLite database file.
    #[arg(long, env = "PAYGATE_DB_PATH")]
    db_path: Option<PathBuf>,

    /// Log level for the bot's own targets (overridden by `RUST_LOG`).
    #[arg(long)]
    log_level: Option<String>,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = load_config(args.config.as_deref())?;
    if let Some(path) = args.db_path {
        config.storage.database_path = Some(path);
    }
    if let Some(level) = args.log_level {
        config.log_level = level;
    }

    init_tracing(&format!("paygate_bot={}", config.log_level), args.log_json);
    config.validate()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        tariffs = config.payment.tariffs.len(),
        "Starting paygate-bot"
    );

    let db_path = match &config.storage.database_path {
        Some(path) => path.clone(),
        None => default_db_path()?,
    };
    info!(path = %db_path.display(), "Opening database");
    let db = Database::open(&db_path).await?;

    let notifier = match &config.webhook.base_url {
        Some(base_url) => {
            let _ = rustls::crypto::ring::default_provider().install_default();
            let http = reqwest::Client::builder().build()?;
            let client = WebhookClient::new(
                http,
                base_url,
                Duration::from_secs(config.webhook.timeout_secs),
            );
            info!(url = client.url(), "Session webhook enabled");
            let (notifier, _worker) = Notifier::spawn(client, config.webhook.queue_capacity);
            notifier
        }
        None => {
            info!("Session webhook disabled");
            Notifier::disabled()
        }
    };

    let bot = Bot::new(
        &config,
        BotDeps {
            db,
            transport: Arc::new(NdjsonTransport::stdout()),
            notifier,
            extractor: Arc::new(PdfTextExtractor),
            clock: Arc::new(SystemClock),
        },
    );

    // Spawn background task to evict idle conversation contexts
    let contexts = bot.contexts().clone();
    let cleanup_every = Duration::from_secs(config.sessions.cleanup_interval_secs.max(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(cleanup_every);
        interval.tick().await; // Skip first immediate tick
        loop {
            interval.tick().await;
            let removed = contexts.cleanup_expired().await;
            if removed > 0 {
                info!(removed, "Evicted idle conversation contexts");
            }
        }
    });

    let mut events = EventStream::new(BufReader::new(tokio::io::stdin()));
    let mut in_flight = JoinSet::new();

    loop {
        tokio::select! {
            next = events.next_event() => {
                match next {
                    Ok(Some(event)) => {
                        let bot = bot.clone();
                        in_flight.spawn(async move { bot.handle(event).await });
                    }
                    Ok(None) => {
                        info!("Input closed");
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to read input");
                        break;
                    }
                }
            }
            Some(done) = in_flight.join_next(), if !in_flight.is_empty() => {
                if let Err(e) = done {
                    warn!(error = %e, "Event task failed");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
                break;
            }
        }
    }

    debug!(pending = in_flight.len(), "Draining in-flight events");
    while let Some(done) = in_flight.join_next().await {
        if let Err(e) = done {
            warn!(error = %e, "Event task failed");
        }
    }

    let stats = bot.notifier().stats();
    info!(
        webhooks_sent = stats.sent(),
        webhooks_failed = stats.failed(),
        "Bot stopped"
    );
    Ok(())
}

fn default_db_path() -> anyhow::Result<PathBuf> {
    let data =
        dirs::data_dir().ok_or_else(|| anyhow::anyhow!("Cannot determine data directory"))?;
    Ok(data.join("paygate").join("paygate.db"))
}
