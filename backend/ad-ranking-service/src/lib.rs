pub mod config;
pub mod engine;
pub mod jobs;
pub mod models;
pub mod services;
pub mod store;
pub mod utils;

pub use config::Config;
pub use engine::AdRankingEngine;
pub use services::{FeedRanker, IngestError, IngestOutcome, IngestionGate, RankingError};
pub use store::{AdCatalog, EngagementStore, InMemoryCatalog, InMemoryStore, StoreError};
