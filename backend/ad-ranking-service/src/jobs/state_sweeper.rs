// ============================================
// State Sweeper
// ============================================
//
// Periodically drops rate-limit windows that have reset, dedup entries
// past their suppression window and recency windows left empty.
// Lazy expiry on access covers live sessions; this covers abandoned ones.

use crate::engine::AdRankingEngine;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct StateSweeperConfig {
    pub interval: Duration,
}

impl Default for StateSweeperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
        }
    }
}

/// Run the sweeper until `shutdown` flips to `true`
pub fn spawn_state_sweeper(
    engine: Arc<AdRankingEngine>,
    config: StateSweeperConfig,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(interval = ?config.interval, "State sweeper started");
        let mut ticker = tokio::time::interval(config.interval);
        // First tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = engine.sweep(Utc::now());
                    debug!(
                        rate_limit_entries = report.rate_limit_entries,
                        dedup_entries = report.dedup_entries,
                        recency_windows = report.recency_windows,
                        "Swept expired session state"
                    );
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("State sweeper stopped");
    })
}
