// ============================================
// Recency Tracker
// ============================================
//
// Per-session window of accepted impressions, ordered by time. Lookups
// drop expired entries from the front, so cost depends on the window
// size and never on total event volume.
//
// Each window is merged once with the store's impression log before it is
// read, which keeps the frequency penalty across restarts when the store
// is durable. Ingestion never waits on that read.

use crate::models::EventName;
use crate::store::{EngagementStore, Result};
use crate::utils::with_store_timeout;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tracing::debug;

#[derive(Debug, Default)]
struct ImpressionWindow {
    /// Merged with the impression log
    hydrated: bool,
    /// (seen_at, ad_id), oldest first
    entries: VecDeque<(DateTime<Utc>, String)>,
}

impl ImpressionWindow {
    fn insert(&mut self, at: DateTime<Utc>, ad_id: String) {
        // Keep time order even when concurrent events land slightly out of order
        let position = self.entries.partition_point(|(seen_at, _)| *seen_at <= at);
        self.entries.insert(position, (at, ad_id));
    }

    fn prune(&mut self, cutoff: DateTime<Utc>) {
        while self.entries.front().is_some_and(|(at, _)| *at < cutoff) {
            self.entries.pop_front();
        }
    }
}

pub struct RecencyTracker {
    windows: DashMap<String, ImpressionWindow>,
    window: Duration,
    store: Arc<dyn EngagementStore>,
    store_timeout: StdDuration,
}

impl RecencyTracker {
    pub fn new(store: Arc<dyn EngagementStore>, window: Duration, store_timeout: StdDuration) -> Self {
        Self {
            windows: DashMap::new(),
            window,
            store,
            store_timeout,
        }
    }

    /// Merge the session's window with the impression log, once
    pub async fn ensure_hydrated(&self, session_id: &str, now: DateTime<Utc>) -> Result<()> {
        if self
            .windows
            .get(session_id)
            .is_some_and(|window| window.hydrated)
        {
            return Ok(());
        }

        let since = now - self.window;
        let impressions = with_store_timeout(
            self.store_timeout,
            self.store
                .query_events(session_id, EventName::Impression, since),
        )
        .await?;
        let seeded = impressions.len();

        let mut window = self.windows.entry(session_id.to_string()).or_default();
        if !window.hydrated {
            for event in impressions {
                let already_recorded = window
                    .entries
                    .iter()
                    .any(|(at, ad_id)| *at == event.created_at && *ad_id == event.ad_id);
                if !already_recorded {
                    window.insert(event.created_at, event.ad_id);
                }
            }
            window.hydrated = true;
        }
        drop(window);

        debug!(
            session_id = session_id,
            seeded = seeded,
            "Recency window hydrated"
        );
        Ok(())
    }

    /// Record an accepted impression
    pub fn record(&self, session_id: &str, ad_id: &str, at: DateTime<Utc>) {
        self.windows
            .entry(session_id.to_string())
            .or_default()
            .insert(at, ad_id.to_string());
    }

    /// Ads impressed at or after `now - window`
    pub fn recently_impressed(&self, session_id: &str, now: DateTime<Utc>) -> HashSet<String> {
        let cutoff = now - self.window;
        match self.windows.get_mut(session_id) {
            Some(mut window) => {
                window.prune(cutoff);
                window
                    .entries
                    .iter()
                    .map(|(_, ad_id)| ad_id.clone())
                    .collect()
            }
            None => HashSet::new(),
        }
    }

    /// Prune every window and drop the ones left empty
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.window;
        let before = self.windows.len();
        self.windows.retain(|_, window| {
            window.prune(cutoff);
            !window.entries.is_empty()
        });
        before.saturating_sub(self.windows.len())
    }

    pub fn tracked_sessions(&self) -> usize {
        self.windows.len()
    }
}
