// ============================================
// Real-time Session Signals Module
// ============================================
//
// Within-session personalization for anonymous viewers:
// 1. Accumulate per-tag interest scores from swipe / watch / click signals
// 2. Track which ads a session has been shown in the last hour
//
// Both are keyed by session id and only mutated through these types.

pub mod recency;
pub mod session_interests;

pub use recency::RecencyTracker;
pub use session_interests::{score_delta, InterestAggregator};
