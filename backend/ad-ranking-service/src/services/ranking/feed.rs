use super::scorer::{explore, feed_mode, personalize, ScoringParams};
use super::Result;
use crate::models::{Ad, EventName, FeedMode, RankedFeed};
use crate::services::realtime::{InterestAggregator, RecencyTracker};
use crate::store::{AdCatalog, EngagementStore};
use crate::utils::with_store_timeout;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Feed ranker over the active catalog.
///
/// Reads for one request (swipe count, interest snapshot, recent set) are
/// all taken before the generator is locked; the lock is never held
/// across an await.
pub struct FeedRanker {
    catalog: Arc<dyn AdCatalog>,
    store: Arc<dyn EngagementStore>,
    interests: Arc<InterestAggregator>,
    recency: Arc<RecencyTracker>,
    params: ScoringParams,
    rng: Mutex<Box<dyn RngCore + Send>>,
    store_timeout: Duration,
}

impl FeedRanker {
    pub fn new(
        catalog: Arc<dyn AdCatalog>,
        store: Arc<dyn EngagementStore>,
        interests: Arc<InterestAggregator>,
        recency: Arc<RecencyTracker>,
        params: ScoringParams,
        store_timeout: Duration,
    ) -> Self {
        Self {
            catalog,
            store,
            interests,
            recency,
            params,
            rng: Mutex::new(Box::new(StdRng::from_entropy())),
            store_timeout,
        }
    }

    /// Replace the generator, e.g. with a seeded one for reproducible orderings
    pub fn with_rng<R: RngCore + Send + 'static>(mut self, rng: R) -> Self {
        self.rng = Mutex::new(Box::new(rng));
        self
    }

    /// Current mode for a session; no session is always exploring
    pub async fn mode(&self, session_id: Option<&str>) -> Result<FeedMode> {
        let Some(session_id) = session_id else {
            return Ok(FeedMode::Exploring);
        };
        let swipes = with_store_timeout(
            self.store_timeout,
            self.store.count_events(session_id, EventName::Swipe),
        )
        .await?;
        Ok(feed_mode(swipes, self.params.exploration_threshold))
    }

    /// Load the active catalog and rank it
    pub async fn feed(&self, session_id: Option<&str>, now: DateTime<Utc>) -> Result<RankedFeed> {
        let active_ads = with_store_timeout(self.store_timeout, self.catalog.active_ads()).await?;
        self.rank(session_id, active_ads, now).await
    }

    /// Rank a candidate list; ads that are not active are dropped first
    pub async fn rank(
        &self,
        session_id: Option<&str>,
        candidates: Vec<Ad>,
        now: DateTime<Utc>,
    ) -> Result<RankedFeed> {
        let active_ads: Vec<Ad> = candidates.into_iter().filter(Ad::is_active).collect();

        let Some(session_id) = session_id else {
            let ads = explore(active_ads, &Default::default(), &mut *self.rng.lock());
            return Ok(RankedFeed {
                ads,
                is_exploration_mode: true,
            });
        };

        let mode = self.mode(Some(session_id)).await?;
        self.recency.ensure_hydrated(session_id, now).await?;
        let recent = self.recency.recently_impressed(session_id, now);

        let feed = match mode {
            FeedMode::Exploring => RankedFeed {
                ads: explore(active_ads, &recent, &mut *self.rng.lock()),
                is_exploration_mode: true,
            },
            FeedMode::Personalized => {
                let interests = self.interests.scores(session_id).await?;
                let scored = personalize(
                    active_ads,
                    &interests,
                    &recent,
                    &self.params,
                    &mut *self.rng.lock(),
                );
                RankedFeed {
                    ads: scored.into_iter().map(|s| s.ad).collect(),
                    is_exploration_mode: false,
                }
            }
        };

        debug!(
            session_id = session_id,
            mode = ?mode,
            ads = feed.ads.len(),
            recent = recent.len(),
            "Feed ranked"
        );

        Ok(feed)
    }
}
