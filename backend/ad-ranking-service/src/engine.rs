use crate::config::Config;
use crate::models::{AdEventStats, RankedFeed, TrackEventRequest};
use crate::services::ranking::{self, ScoringParams};
use crate::services::{
    FeedRanker, ImpressionDeduplicator, IngestError, IngestOutcome, IngestionGate,
    InterestAggregator, RateLimitConfig, RateLimiter, RecencyTracker, StatsService,
};
use crate::store::{self, AdCatalog, EngagementStore};
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use std::sync::Arc;
use tracing::info;

/// Counts of entries reclaimed by one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub rate_limit_entries: usize,
    pub dedup_entries: usize,
    pub recency_windows: usize,
}

/// Wires the ingestion gate, feed ranker and their shared session state
/// over one injected store and catalog.
pub struct AdRankingEngine {
    gate: IngestionGate,
    ranker: FeedRanker,
    stats: StatsService,
    interests: Arc<InterestAggregator>,
    rate_limiter: Arc<RateLimiter>,
    deduplicator: Arc<ImpressionDeduplicator>,
    recency: Arc<RecencyTracker>,
}

impl AdRankingEngine {
    pub fn new(
        config: &Config,
        store: Arc<dyn EngagementStore>,
        catalog: Arc<dyn AdCatalog>,
    ) -> Self {
        let timeout = config.store.timeout();
        let ingestion = &config.ingestion;

        let rate_limiter = Arc::new(RateLimiter::new(RateLimitConfig {
            max_events: ingestion.rate_limit_max_events,
            window_seconds: ingestion.rate_limit_window_secs,
        }));
        let deduplicator = Arc::new(ImpressionDeduplicator::new(Duration::seconds(
            ingestion.impression_dedup_window_secs,
        )));
        let interests = Arc::new(InterestAggregator::new(Arc::clone(&store), timeout));
        let recency = Arc::new(RecencyTracker::new(
            Arc::clone(&store),
            Duration::seconds(ingestion.recency_window_secs),
            timeout,
        ));

        let gate = IngestionGate::new(
            ingestion,
            Arc::clone(&rate_limiter),
            Arc::clone(&deduplicator),
            Arc::clone(&catalog),
            Arc::clone(&store),
            Arc::clone(&interests),
            Arc::clone(&recency),
            timeout,
        );
        let ranker = FeedRanker::new(
            catalog,
            Arc::clone(&store),
            Arc::clone(&interests),
            Arc::clone(&recency),
            ScoringParams::from(&config.ranking),
            timeout,
        );
        let stats = StatsService::new(store, timeout);

        info!(
            rate_limit_max_events = ingestion.rate_limit_max_events,
            dedup_window_secs = ingestion.impression_dedup_window_secs,
            exploration_threshold = config.ranking.exploration_swipe_threshold,
            "Ad ranking engine initialized"
        );

        Self {
            gate,
            ranker,
            stats,
            interests,
            rate_limiter,
            deduplicator,
            recency,
        }
    }

    /// Swap the ranking generator, e.g. for a seeded one
    pub fn with_rng<R: RngCore + Send + 'static>(mut self, rng: R) -> Self {
        self.ranker = self.ranker.with_rng(rng);
        self
    }

    pub async fn submit(
        &self,
        request: TrackEventRequest,
        now: DateTime<Utc>,
    ) -> Result<IngestOutcome, IngestError> {
        self.gate.submit(request, now).await
    }

    pub async fn feed(
        &self,
        session_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> ranking::Result<RankedFeed> {
        self.ranker.feed(session_id, now).await
    }

    pub async fn ad_stats(&self, ad_id: &str) -> store::Result<AdEventStats> {
        self.stats.ad_stats(ad_id).await
    }

    pub fn ranker(&self) -> &FeedRanker {
        &self.ranker
    }

    pub fn interests(&self) -> &InterestAggregator {
        &self.interests
    }

    pub fn recency(&self) -> &RecencyTracker {
        &self.recency
    }

    /// Reclaim expired rate-limit, dedup and recency state
    pub fn sweep(&self, now: DateTime<Utc>) -> SweepReport {
        SweepReport {
            rate_limit_entries: self.rate_limiter.sweep_expired(now),
            dedup_entries: self.deduplicator.sweep_expired(now),
            recency_windows: self.recency.sweep_expired(now),
        }
    }
}
