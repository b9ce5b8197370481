use crate::models::{AdEventStats, EventPayload, StoredEvent, SwipeDirection};
use crate::store::{EngagementStore, Result};
use crate::utils::with_store_timeout;
use std::sync::Arc;
use std::time::Duration;

/// Per-ad engagement counters over the event log
pub struct StatsService {
    store: Arc<dyn EngagementStore>,
    store_timeout: Duration,
}

impl StatsService {
    pub fn new(store: Arc<dyn EngagementStore>, store_timeout: Duration) -> Self {
        Self {
            store,
            store_timeout,
        }
    }

    pub async fn ad_stats(&self, ad_id: &str) -> Result<AdEventStats> {
        let events = with_store_timeout(self.store_timeout, self.store.events_for_ad(ad_id)).await?;
        Ok(summarize(&events))
    }
}

pub fn summarize(events: &[StoredEvent]) -> AdEventStats {
    let mut stats = AdEventStats::default();
    let mut total_watch_ms: u128 = 0;
    let mut watch_samples: u64 = 0;

    for event in events {
        match &event.payload {
            EventPayload::Impression { .. } => stats.impressions += 1,
            EventPayload::ViewStart {} => stats.view_starts += 1,
            EventPayload::Complete { .. } => stats.completions += 1,
            EventPayload::Click { .. } => stats.clicks += 1,
            EventPayload::WatchTime { watch_time_ms } => {
                // Zero-length watches are not samples
                if *watch_time_ms > 0 {
                    total_watch_ms += u128::from(*watch_time_ms);
                    watch_samples += 1;
                }
            }
            EventPayload::Swipe { direction } => match direction {
                SwipeDirection::Right => stats.swipes.right += 1,
                SwipeDirection::Left => stats.swipes.left += 1,
                SwipeDirection::Up => stats.swipes.up += 1,
            },
        }
    }

    if watch_samples > 0 {
        stats.avg_watch_time_ms = total_watch_ms as f64 / watch_samples as f64;
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SwipeCounts;
    use crate::store::InMemoryStore;
    use chrono::Utc;
    use uuid::Uuid;

    fn event(ad_id: &str, payload: EventPayload) -> StoredEvent {
        StoredEvent {
            id: Uuid::new_v4(),
            session_id: "s1".to_string(),
            ad_id: ad_id.to_string(),
            payload,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_summarize_counts_each_kind() {
        let events = vec![
            event("a", EventPayload::Impression { visible_ms: 100 }),
            event("a", EventPayload::ViewStart {}),
            event("a", EventPayload::WatchTime { watch_time_ms: 4000 }),
            event("a", EventPayload::WatchTime { watch_time_ms: 0 }),
            event("a", EventPayload::WatchTime { watch_time_ms: 8000 }),
            event("a", EventPayload::Complete { completed: true }),
            event(
                "a",
                EventPayload::Swipe {
                    direction: SwipeDirection::Right,
                },
            ),
            event(
                "a",
                EventPayload::Swipe {
                    direction: SwipeDirection::Up,
                },
            ),
            event(
                "a",
                EventPayload::Click {
                    destination_url: "https://example.com".to_string(),
                },
            ),
        ];

        let stats = summarize(&events);
        assert_eq!(stats.impressions, 1);
        assert_eq!(stats.view_starts, 1);
        assert_eq!(stats.completions, 1);
        assert_eq!(stats.clicks, 1);
        assert_eq!(stats.avg_watch_time_ms, 6000.0);
        assert_eq!(
            stats.swipes,
            SwipeCounts {
                right: 1,
                left: 0,
                up: 1
            }
        );
    }

    #[test]
    fn test_summarize_large_watch_times_do_not_overflow() {
        let events = vec![
            event("a", EventPayload::WatchTime { watch_time_ms: u64::MAX }),
            event("a", EventPayload::WatchTime { watch_time_ms: u64::MAX }),
        ];

        let stats = summarize(&events);
        assert_eq!(stats.avg_watch_time_ms, u64::MAX as f64);
    }

    #[tokio::test]
    async fn test_ad_stats_only_counts_that_ad() {
        let store = Arc::new(InMemoryStore::new());
        store
            .append_event(event("a", EventPayload::Impression { visible_ms: 1 }))
            .await
            .unwrap();
        store
            .append_event(event("b", EventPayload::Impression { visible_ms: 1 }))
            .await
            .unwrap();

        let service = StatsService::new(store, Duration::from_secs(1));
        assert_eq!(service.ad_stats("a").await.unwrap().impressions, 1);
        assert_eq!(service.ad_stats("missing").await.unwrap(), AdEventStats::default());
    }
}
