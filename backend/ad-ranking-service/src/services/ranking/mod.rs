/// Ranking Module
///
/// Orders the active ad catalog for a session feed.
///
/// # Modes
/// - **Exploring** (fewer than 5 lifetime swipes, or no session): uniform
///   shuffle, then ads impressed in the last hour moved to the back
/// - **Personalized** (5 or more swipes): sum of the session's tag scores,
///   minus a frequency penalty for recently impressed ads, plus a small
///   random jitter; sorted descending
///
/// The mode is derived from the append-only swipe count on every request,
/// so once a session is personalized it stays personalized.
pub mod feed;
pub mod scorer;

pub use feed::FeedRanker;
pub use scorer::{feed_mode, ScoredAd, ScoringParams};

use crate::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RankingError {
    #[error("Store failure: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, RankingError>;
