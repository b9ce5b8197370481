/// Feed Scoring
///
/// Pure ranking functions. Randomness always comes from the caller's
/// generator so orderings are reproducible with a seeded RNG.
use crate::config::RankingConfig;
use crate::models::{Ad, FeedMode};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone)]
pub struct ScoringParams {
    /// Lifetime swipes needed before personalization
    pub exploration_threshold: u64,
    /// Subtracted from ads impressed inside the recency window
    pub frequency_penalty: f64,
    /// Jitter is drawn from `[0, jitter_max)`
    pub jitter_max: f64,
}

impl Default for ScoringParams {
    fn default() -> Self {
        Self::from(&RankingConfig::default())
    }
}

impl From<&RankingConfig> for ScoringParams {
    fn from(config: &RankingConfig) -> Self {
        Self {
            exploration_threshold: config.exploration_swipe_threshold,
            frequency_penalty: config.frequency_penalty,
            jitter_max: config.jitter_max,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScoredAd {
    pub ad: Ad,
    pub score: f64,
}

pub fn feed_mode(swipe_count: u64, exploration_threshold: u64) -> FeedMode {
    if swipe_count < exploration_threshold {
        FeedMode::Exploring
    } else {
        FeedMode::Personalized
    }
}

/// Uniform shuffle, then not-recently-impressed ads ahead of recent ones.
/// Both groups keep their shuffled relative order.
pub fn explore<R: Rng + ?Sized>(
    mut ads: Vec<Ad>,
    recently_impressed: &HashSet<String>,
    rng: &mut R,
) -> Vec<Ad> {
    ads.shuffle(rng);
    let (fresh, seen): (Vec<Ad>, Vec<Ad>) = ads
        .into_iter()
        .partition(|ad| !recently_impressed.contains(&ad.id));
    fresh.into_iter().chain(seen).collect()
}

/// Deterministic part of an ad's personalized score
pub fn personalization_score(
    ad: &Ad,
    interests: &HashMap<String, f64>,
    recently_impressed: &HashSet<String>,
    frequency_penalty: f64,
) -> f64 {
    let interest: f64 = ad
        .category_tags
        .iter()
        .map(|tag| interests.get(tag).copied().unwrap_or(0.0))
        .sum();

    if recently_impressed.contains(&ad.id) {
        interest - frequency_penalty
    } else {
        interest
    }
}

/// Score every ad, add jitter, sort descending
pub fn personalize<R: Rng + ?Sized>(
    ads: Vec<Ad>,
    interests: &HashMap<String, f64>,
    recently_impressed: &HashSet<String>,
    params: &ScoringParams,
    rng: &mut R,
) -> Vec<ScoredAd> {
    let mut scored: Vec<ScoredAd> = ads
        .into_iter()
        .map(|ad| {
            let base = personalization_score(
                &ad,
                interests,
                recently_impressed,
                params.frequency_penalty,
            );
            let jitter = if params.jitter_max > 0.0 {
                rng.gen_range(0.0..params.jitter_max)
            } else {
                0.0
            };
            ScoredAd {
                ad,
                score: base + jitter,
            }
        })
        .collect();

    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored
}
