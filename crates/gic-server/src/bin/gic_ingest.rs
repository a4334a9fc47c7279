//! GIC Ingest - run the ingestion transformer and inspect queues from the shell

use anyhow::{Context, Result};
use clap::Parser;
use gic_common::logging::{init_logging, LogConfig, LogLevel};
use gic_common::types::{IngestTrigger, IngestionSource};
use gic_server::{
    api::response::Envelope,
    aws,
    config::{AwsConfig, TimeoutConfig},
    features::ingest::{commands::ingest, routes::IngestBody},
    queue::{MessageQueue, QueueConfig, SqsQueue},
    storage::{config::StorageConfig, S3Storage},
};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "gic-ingest")]
#[command(author, version, about = "GIC connector ingestion tool")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Parser, Debug)]
enum Command {
    /// Ingest one object by bucket and key
    Object {
        #[arg(short, long)]
        bucket: String,

        #[arg(short, long)]
        key: String,
    },

    /// Ingest every record of a storage notification read from a JSON file
    Event {
        /// Path to the notification JSON
        file: PathBuf,
    },

    /// Print the attributes the primary and dead-letter queues must carry
    QueueAttributes,

    /// Receive, print and acknowledge messages
    Drain {
        /// Queue to drain; defaults to GIC_QUEUE_URL
        #[arg(long)]
        queue_url: Option<String>,

        /// Stop after this many messages
        #[arg(short, long, default_value_t = 10)]
        max: usize,

        /// Print without acknowledging; messages become visible again
        #[arg(long)]
        keep: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::for_component("gic-ingest")
        .with_level(log_level)
        .merge_env()?;

    let _log_guard = init_logging(&log_config)?;

    match cli.command {
        Command::Object { bucket, key } => {
            run_trigger(IngestTrigger::Direct(IngestionSource::new(bucket, key))).await
        },
        Command::Event { file } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            run_trigger(IngestTrigger::from_json(&raw)?).await
        },
        Command::QueueAttributes => print_queue_attributes(),
        Command::Drain {
            queue_url,
            max,
            keep,
        } => drain(queue_url, max, keep).await,
    }
}

async fn run_trigger(trigger: IngestTrigger) -> Result<()> {
    let sdk_config = aws::load_sdk_config(&AwsConfig::from_env()).await;
    let queue_config = QueueConfig::from_env()?;
    queue_config.validate()?;

    let store = S3Storage::new(&sdk_config, &StorageConfig::from_env());
    let queue = SqsQueue::new(&sdk_config, &queue_config);
    let timeouts = TimeoutConfig::from_env();

    let outcomes = ingest::handle_trigger(&store, &queue, timeouts.ingest, &trigger).await?;

    let results: Vec<Envelope<IngestBody>> = outcomes.into_iter().map(Envelope::from).collect();
    let failed = results.iter().filter(|r| !r.status().is_success()).count();

    println!("{}", serde_json::to_string_pretty(&results)?);

    if failed > 0 {
        anyhow::bail!("{} of {} files failed to ingest", failed, results.len());
    }

    info!("Ingestion complete");
    Ok(())
}

fn print_queue_attributes() -> Result<()> {
    let queue_config = QueueConfig::from_env()?;
    queue_config.validate()?;

    let attributes = serde_json::json!({
        "queue": queue_config.queue_attributes()?,
        "dead_letter_queue": queue_config.dead_letter_queue_attributes(),
    });

    println!("{}", serde_json::to_string_pretty(&attributes)?);
    Ok(())
}

async fn drain(queue_url: Option<String>, max: usize, keep: bool) -> Result<()> {
    // Endpoint and wait settings still come from the environment when a URL is given.
    let queue_config = match QueueConfig::from_env() {
        Ok(config) => config,
        Err(e) => match queue_url.as_deref() {
            Some(url) => QueueConfig::new(url),
            None => return Err(e),
        },
    };
    queue_config.validate()?;

    let sdk_config = aws::load_sdk_config(&AwsConfig::from_env()).await;
    let queue = match queue_url {
        Some(url) => SqsQueue::new(&sdk_config, &queue_config).for_queue_url(url),
        None => SqsQueue::new(&sdk_config, &queue_config),
    };

    let mut drained = 0;
    while drained < max {
        let deliveries = queue.receive(max - drained).await?;
        if deliveries.is_empty() {
            break;
        }

        for delivery in deliveries {
            println!("{}", serde_json::to_string_pretty(&delivery)?);
            if !keep {
                queue.ack(&delivery.receipt_handle).await?;
            }
            drained += 1;
        }
    }

    info!(drained, queue_url = %queue.queue_url(), "Drain complete");
    Ok(())
}
