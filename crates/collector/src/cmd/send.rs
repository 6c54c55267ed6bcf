//! `beacon send` - deliver or queue one event

use anyhow::{Context, Result, bail};
use beacon_client::{EventSender, SenderOptions};
use beacon_config::{ClientConfig, Config};
use beacon_protocol::{Event, WireFormat, wire};
use clap::Args;
use tracing::info;

/// Arguments for `beacon send`
#[derive(Args, Debug)]
pub struct SendArgs {
    /// Event as a JSON object, or a JSON array of objects
    #[arg(long)]
    pub json: String,

    /// Deliver immediately instead of going through the offline queue
    #[arg(long, conflicts_with = "flush")]
    pub now: bool,

    /// After queueing, deliver everything pending regardless of batch size
    #[arg(long)]
    pub flush: bool,

    /// Ingestion URL, overrides [client] endpoint
    #[arg(long)]
    pub endpoint: Option<String>,
}

/// Outcome printed for the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Delivered,
    Queued { pending: usize },
    Failed,
}

pub async fn run(args: SendArgs, config: Config) -> Result<()> {
    let events = parse_events(&args.json)?;
    let options = sender_options(&config.client, args.endpoint.as_deref())?;
    let (now, flush) = (args.now, args.flush);

    // The HTTP transport is blocking
    let outcome = tokio::task::spawn_blocking(move || send_blocking(options, &events, now, flush))
        .await
        .context("sender task panicked")??;

    match outcome {
        Outcome::Delivered => println!("delivered"),
        Outcome::Queued { pending } => println!("queued ({pending} pending)"),
        Outcome::Failed => bail!("delivery failed"),
    }
    Ok(())
}

fn send_blocking(options: SenderOptions, events: &[Event], now: bool, flush: bool) -> Result<Outcome> {
    let sender = EventSender::new(options).context("failed to create sender")?;

    if now {
        let delivered = sender.send_batch_now(events)?;
        return Ok(if delivered {
            Outcome::Delivered
        } else {
            Outcome::Failed
        });
    }

    let mut delivered = false;
    for event in events {
        delivered |= sender.batch_event(event)?;
    }
    if flush {
        delivered = sender.flush()?;
    }

    let pending = sender.pending_count()?;
    info!(events = events.len(), pending, "send finished");
    Ok(if delivered && pending == 0 {
        Outcome::Delivered
    } else {
        Outcome::Queued { pending }
    })
}

/// Parse a JSON object or array into events
fn parse_events(json: &str) -> Result<Vec<Event>> {
    let trimmed = json.trim();
    let text = if trimmed.starts_with('[') {
        trimmed.to_string()
    } else {
        format!("[{trimmed}]")
    };
    let events = wire::deserialize(&text, WireFormat::Json).context("invalid --json event")?;
    if events.is_empty() {
        bail!("--json contains no events");
    }
    Ok(events)
}

fn sender_options(client: &ClientConfig, endpoint: Option<&str>) -> Result<SenderOptions> {
    let endpoint = endpoint.unwrap_or(&client.endpoint);
    let options = SenderOptions::new(endpoint)?
        .with_limits(client.batch_size, client.max_offline_saved_events)?
        .with_queue_dir(client.queue_dir.clone())
        .with_format(client.format)
        .with_encoding(client.encoding);
    Ok(options)
}
