//! `beacon serve` - run the ingestion server

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use beacon_config::Config;
use beacon_sinks::{SchemaConfig, SchemaMapper, SqliteStorage, Storage, TableProvisioner};
use beacon_sources::{HttpSource, HttpSourceConfig};
use clap::Args;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Arguments for `beacon serve`
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Bind address, overrides [server] address
    #[arg(long)]
    pub address: Option<String>,

    /// Listen port, overrides [server] port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// SQLite database file, overrides [server] database
    #[arg(long)]
    pub database: Option<PathBuf>,
}

/// Run the server until Ctrl-C or SIGTERM
pub async fn run(args: ServeArgs, config: Config) -> Result<()> {
    let mut server = config.server;
    if let Some(address) = args.address {
        server.address = address;
    }
    if let Some(port) = args.port {
        server.port = port;
    }
    if let Some(database) = args.database {
        server.database = database;
    }

    let storage = SqliteStorage::open(&server.database)
        .await
        .with_context(|| format!("failed to open database {}", server.database.display()))?;
    info!(database = %server.database.display(), "storage ready");

    let mapper = SchemaMapper::new(SchemaConfig {
        table_name_properties: server.table_name_properties.clone(),
        include_name_column: server.include_name_column,
        primary_key_column: server.primary_key_column.clone(),
    })
    .context("invalid schema settings")?;

    let provisioner = Arc::new(TableProvisioner::new(
        Arc::new(storage) as Arc<dyn Storage>,
        mapper,
    ));

    let source = HttpSource::new(
        HttpSourceConfig {
            id: "http".into(),
            address: server.address.clone(),
            port: server.port,
            max_payload_size: server.max_payload_size,
        },
        provisioner,
    );

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        wait_for_shutdown().await;
        info!("shutdown signal received");
        shutdown.cancel();
    });

    source.run(cancel).await.context("HTTP source failed")?;
    Ok(())
}

/// Wait for SIGINT or SIGTERM
async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
