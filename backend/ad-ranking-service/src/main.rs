use ad_ranking_service::jobs::{spawn_state_sweeper, StateSweeperConfig};
use ad_ranking_service::models::TrackEventRequest;
use ad_ranking_service::services::TrackEventResponse;
use ad_ranking_service::{AdRankingEngine, Config, InMemoryCatalog, InMemoryStore};
use anyhow::Context;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// One line of driver input
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Command {
    Event(TrackEventRequest),
    Feed { session_id: Option<String> },
    Stats { ad_id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing; logs go to stderr, responses to stdout
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env().context("Failed to load config")?;

    let catalog = match &config.service.catalog_path {
        Some(path) => {
            let raw = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read catalog {}", path))?;
            InMemoryCatalog::from_json(&raw).context("Invalid catalog JSON")?
        }
        None => {
            warn!("CATALOG_PATH not set - serving an empty catalog");
            InMemoryCatalog::default()
        }
    };

    info!(
        service = %config.service.service_name,
        ads = catalog.len(),
        "Starting ad ranking engine"
    );

    let engine = Arc::new(AdRankingEngine::new(
        &config,
        Arc::new(InMemoryStore::new()),
        Arc::new(catalog),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = spawn_state_sweeper(
        Arc::clone(&engine),
        StateSweeperConfig {
            interval: Duration::from_secs(config.service.sweep_interval_secs),
        },
        shutdown_rx,
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Command>(&line) {
            Ok(command) => handle(&engine, command).await,
            Err(e) => json!({ "success": false, "error": format!("Invalid command: {}", e) }),
        };

        stdout.write_all(response.to_string().as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
    }

    let _ = shutdown_tx.send(true);
    sweeper.await.context("State sweeper panicked")?;
    info!("Input closed, shutting down");

    Ok(())
}

async fn handle(engine: &AdRankingEngine, command: Command) -> serde_json::Value {
    let now = Utc::now();
    match command {
        Command::Event(request) => {
            let result = engine.submit(request, now).await;
            json!(TrackEventResponse::from(&result))
        }
        Command::Feed { session_id } => match engine.feed(session_id.as_deref(), now).await {
            Ok(feed) => json!(feed),
            Err(e) => {
                error!(error = %e, "Failed to fetch feed");
                json!({ "success": false, "error": "Failed to fetch feed" })
            }
        },
        Command::Stats { ad_id } => match engine.ad_stats(&ad_id).await {
            Ok(stats) => json!(stats),
            Err(e) => {
                error!(ad_id = %ad_id, error = %e, "Failed to load ad stats");
                json!({ "success": false, "error": "Failed to load ad stats" })
            }
        },
    }
}
