// ============================================
// Session Interest Aggregator (会话兴趣聚合)
// ============================================
//
// Per-session, per-tag preference scores. A score is the plain sum of every
// delta applied to it: no decay, no clamping, may go negative.
//
// Signal weights:
// - swipe right: +5, swipe left: -5, swipe up: no update
// - watch_time >= 75% of creative: +3, < 25%: -1, otherwise no update
// - click: +10
// - impression / view_start / complete: no score effect

use crate::models::{Ad, EventPayload, SwipeDirection};
use crate::store::{EngagementStore, Result};
use crate::utils::with_store_timeout;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const SWIPE_RIGHT_WEIGHT: f64 = 5.0;
const SWIPE_LEFT_WEIGHT: f64 = -5.0;
const WATCH_FULL_WEIGHT: f64 = 3.0;
const WATCH_SKIP_WEIGHT: f64 = -1.0;
const CLICK_WEIGHT: f64 = 10.0;

const WATCH_FULL_PERCENT: f64 = 75.0;
const WATCH_SKIP_PERCENT: f64 = 25.0;

/// Interest delta an event contributes to every tag of its ad, if any
pub fn score_delta(payload: &EventPayload, ad: &Ad, default_duration_secs: u32) -> Option<f64> {
    match payload {
        EventPayload::Swipe { direction } => match direction {
            SwipeDirection::Right => Some(SWIPE_RIGHT_WEIGHT),
            SwipeDirection::Left => Some(SWIPE_LEFT_WEIGHT),
            SwipeDirection::Up => None,
        },
        EventPayload::WatchTime { watch_time_ms } => {
            let duration_secs = ad
                .creative_duration_seconds
                .filter(|secs| *secs > 0)
                .unwrap_or(default_duration_secs);
            let duration_ms = f64::from(duration_secs) * 1000.0;
            let watch_percent = *watch_time_ms as f64 / duration_ms * 100.0;

            if watch_percent >= WATCH_FULL_PERCENT {
                Some(WATCH_FULL_WEIGHT)
            } else if watch_percent < WATCH_SKIP_PERCENT {
                Some(WATCH_SKIP_WEIGHT)
            } else {
                None
            }
        }
        EventPayload::Click { .. } => Some(CLICK_WEIGHT),
        EventPayload::Impression { .. } | EventPayload::ViewStart {} | EventPayload::Complete { .. } => {
            None
        }
    }
}

/// Session interest aggregator backed by the engagement store
pub struct InterestAggregator {
    store: Arc<dyn EngagementStore>,
    store_timeout: Duration,
}

impl InterestAggregator {
    pub fn new(store: Arc<dyn EngagementStore>, store_timeout: Duration) -> Self {
        Self {
            store,
            store_timeout,
        }
    }

    /// Add `delta` to the session's score for every tag
    pub async fn apply_delta(
        &self,
        session_id: &str,
        tags: &BTreeSet<String>,
        delta: f64,
    ) -> Result<()> {
        if tags.is_empty() {
            return Ok(());
        }

        let tags: Vec<String> = tags.iter().cloned().collect();
        with_store_timeout(
            self.store_timeout,
            self.store.increment_interests(session_id, &tags, delta),
        )
        .await?;

        debug!(
            session_id = session_id,
            tags_count = tags.len(),
            delta = delta,
            "Session interests updated"
        );

        Ok(())
    }

    /// Snapshot of every tag score for the session
    pub async fn scores(&self, session_id: &str) -> Result<HashMap<String, f64>> {
        with_store_timeout(self.store_timeout, self.store.interest_scores(session_id)).await
    }

    pub async fn interest_score(&self, session_id: &str, tag: &str) -> Result<f64> {
        let scores = self.scores(session_id).await?;
        Ok(scores.get(tag).copied().unwrap_or(0.0))
    }

    /// Highest scoring tags, best first
    pub async fn top_interests(&self, session_id: &str, limit: usize) -> Result<Vec<(String, f64)>> {
        let mut interests: Vec<(String, f64)> = self.scores(session_id).await?.into_iter().collect();
        interests.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        interests.truncate(limit);
        Ok(interests)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AdStatus;
    use crate::store::InMemoryStore;
    use chrono::Utc;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn ad(tags: &[&str], duration: Option<u32>) -> Ad {
        Ad {
            id: "ad-1".to_string(),
            title: String::new(),
            advertiser_name: String::new(),
            status: AdStatus::Active,
            category_tags: tags.iter().map(|t| t.to_string()).collect(),
            creative_duration_seconds: duration,
            created_at: Utc::now(),
        }
    }

    fn aggregator() -> InterestAggregator {
        InterestAggregator::new(Arc::new(InMemoryStore::new()), Duration::from_secs(1))
    }

    #[test]
    fn test_swipe_weights() {
        let ad = ad(&["fashion"], None);
        let swipe = |direction| EventPayload::Swipe { direction };

        assert_eq!(score_delta(&swipe(SwipeDirection::Right), &ad, 15), Some(5.0));
        assert_eq!(score_delta(&swipe(SwipeDirection::Left), &ad, 15), Some(-5.0));
        assert_eq!(score_delta(&swipe(SwipeDirection::Up), &ad, 15), None);
    }

    #[test]
    fn test_watch_time_thresholds() {
        let ad = ad(&["tech"], Some(15));
        let watch = |ms| EventPayload::WatchTime { watch_time_ms: ms };

        // 80%
        assert_eq!(score_delta(&watch(12_000), &ad, 15), Some(3.0));
        // exactly 75%
        assert_eq!(score_delta(&watch(11_250), &ad, 15), Some(3.0));
        // 50%
        assert_eq!(score_delta(&watch(7_500), &ad, 15), None);
        // exactly 25%
        assert_eq!(score_delta(&watch(3_750), &ad, 15), None);
        // 10%
        assert_eq!(score_delta(&watch(1_500), &ad, 15), Some(-1.0));
    }

    #[test]
    fn test_watch_time_uses_default_duration() {
        let no_duration = ad(&["tech"], None);
        let watch = EventPayload::WatchTime {
            watch_time_ms: 12_000,
        };
        assert_eq!(score_delta(&watch, &no_duration, 15), Some(3.0));

        let long_ad = ad(&["tech"], Some(60));
        assert_eq!(score_delta(&watch, &long_ad, 15), Some(-1.0));
    }

    #[test]
    fn test_neutral_events_have_no_delta() {
        let ad = ad(&["tech"], None);
        assert_eq!(score_delta(&EventPayload::Impression { visible_ms: 900 }, &ad, 15), None);
        assert_eq!(score_delta(&EventPayload::ViewStart {}, &ad, 15), None);
        assert_eq!(score_delta(&EventPayload::Complete { completed: true }, &ad, 15), None);
        assert_eq!(
            score_delta(
                &EventPayload::Click {
                    destination_url: "https://example.com".to_string()
                },
                &ad,
                15
            ),
            Some(10.0)
        );
    }

    #[tokio::test]
    async fn test_apply_delta_to_every_tag() {
        let aggregator = aggregator();
        let tags: BTreeSet<String> = ["fashion", "summer"].iter().map(|t| t.to_string()).collect();

        aggregator.apply_delta("s1", &tags, 5.0).await.unwrap();

        assert_eq!(aggregator.interest_score("s1", "fashion").await.unwrap(), 5.0);
        assert_eq!(aggregator.interest_score("s1", "summer").await.unwrap(), 5.0);
        assert_eq!(aggregator.interest_score("s1", "tech").await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn test_random_delta_sequences_accumulate_exactly() {
        let aggregator = aggregator();
        let mut rng = StdRng::seed_from_u64(7);
        let all_tags = ["a", "b", "c", "d"];
        let mut expected: HashMap<String, f64> = HashMap::new();
        let deltas = [5.0, -5.0, 3.0, -1.0, 10.0];

        for _ in 0..500 {
            let tag = all_tags[rng.gen_range(0..all_tags.len())].to_string();
            let delta = deltas[rng.gen_range(0..deltas.len())];
            *expected.entry(tag.clone()).or_insert(0.0) += delta;

            let tags = BTreeSet::from([tag]);
            aggregator.apply_delta("s1", &tags, delta).await.unwrap();
        }

        let actual = aggregator.scores("s1").await.unwrap();
        assert_eq!(actual, expected);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_deltas_are_not_lost() {
        let aggregator = Arc::new(aggregator());
        let tags: BTreeSet<String> = ["x", "y"].iter().map(|t| t.to_string()).collect();

        let mut handles = Vec::new();
        for i in 0..200 {
            let aggregator = Arc::clone(&aggregator);
            let tags = tags.clone();
            let delta = if i % 2 == 0 { 5.0 } else { -1.0 };
            handles.push(tokio::spawn(async move {
                aggregator.apply_delta("s1", &tags, delta).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        // 100 * 5 + 100 * -1
        assert_eq!(aggregator.interest_score("s1", "x").await.unwrap(), 400.0);
        assert_eq!(aggregator.interest_score("s1", "y").await.unwrap(), 400.0);
    }

    #[tokio::test]
    async fn test_top_interests_sorted() {
        let aggregator = aggregator();
        aggregator
            .apply_delta("s1", &BTreeSet::from(["tech".to_string()]), 10.0)
            .await
            .unwrap();
        aggregator
            .apply_delta("s1", &BTreeSet::from(["food".to_string()]), -5.0)
            .await
            .unwrap();
        aggregator
            .apply_delta("s1", &BTreeSet::from(["music".to_string()]), 3.0)
            .await
            .unwrap();

        let top = aggregator.top_interests("s1", 2).await.unwrap();
        assert_eq!(
            top,
            vec![("tech".to_string(), 10.0), ("music".to_string(), 3.0)]
        );
    }
}
