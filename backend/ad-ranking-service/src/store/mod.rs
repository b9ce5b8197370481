// ============================================
// Engagement Store (持久化抽象)
// ============================================
//
// The engine never owns persistence. Everything durable goes through
// two injected collaborators:
// - AdCatalog: read-only view of ad creatives
// - EngagementStore: sessions, append-only event log, interest scores
//
// Atomicity contract for EngagementStore implementations:
// - get_or_create_session is insert-if-absent; a losing racer gets the winner's row
// - increment_interests adds the delta to every tag as one atomic step
//   per (session, tag) key; no lost updates under concurrent callers
// - count_events observes every append that returned Ok

pub mod memory;

pub use memory::{InMemoryCatalog, InMemoryStore};

use crate::models::{Ad, EventName, Session, StoredEvent};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store backend error: {0}")]
    Backend(String),

    #[error("Store operation timed out after {0:?}")]
    Timeout(Duration),
}

impl StoreError {
    /// Store failures are always worth retrying from the caller's side
    pub fn is_retryable(&self) -> bool {
        true
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait AdCatalog: Send + Sync {
    async fn get_ad(&self, ad_id: &str) -> Result<Option<Ad>>;

    /// Active ads only, newest first
    async fn active_ads(&self) -> Result<Vec<Ad>>;
}

#[async_trait]
pub trait EngagementStore: Send + Sync {
    /// Insert the session if absent, otherwise return the stored one unchanged
    async fn get_or_create_session(&self, session: Session) -> Result<Session>;

    async fn get_session(&self, session_id: &str) -> Result<Option<Session>>;

    async fn append_event(&self, event: StoredEvent) -> Result<()>;

    /// Events for a session of the given kind created at or after `since`
    async fn query_events(
        &self,
        session_id: &str,
        event_name: EventName,
        since: DateTime<Utc>,
    ) -> Result<Vec<StoredEvent>>;

    async fn count_events(&self, session_id: &str, event_name: EventName) -> Result<u64>;

    async fn events_for_ad(&self, ad_id: &str) -> Result<Vec<StoredEvent>>;

    async fn increment_interests(&self, session_id: &str, tags: &[String], delta: f64)
        -> Result<()>;

    /// Consistent snapshot of a session's tag scores
    async fn interest_scores(&self, session_id: &str) -> Result<HashMap<String, f64>>;
}
