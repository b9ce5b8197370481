pub mod deduplicator;
pub mod ingestion;
pub mod rate_limiter;
pub mod ranking;
pub mod realtime;
pub mod session_registry;
pub mod stats;

pub use deduplicator::ImpressionDeduplicator;
pub use ingestion::{IngestError, IngestOutcome, IngestionGate, TrackEventResponse};
pub use rate_limiter::{RateLimitConfig, RateLimitDecision, RateLimiter};
pub use ranking::{FeedRanker, RankingError};
pub use realtime::{InterestAggregator, RecencyTracker};
pub use session_registry::SessionRegistry;
pub use stats::StatsService;
