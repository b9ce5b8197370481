// ============================================
// In-memory store backend
// ============================================
//
// DashMap keyed by session id. Every per-session mutation happens while
// holding that session's shard entry, which gives the per-key atomicity
// the EngagementStore contract asks for.

use super::{AdCatalog, EngagementStore, Result};
use crate::models::{Ad, EventName, Session, StoredEvent};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct InMemoryStore {
    sessions: DashMap<String, Session>,
    /// Per-session append-only log, in arrival order
    events: DashMap<String, Vec<StoredEvent>>,
    event_counts: DashMap<(String, EventName), u64>,
    interests: DashMap<String, HashMap<String, f64>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn event_count(&self) -> usize {
        self.events.iter().map(|entry| entry.value().len()).sum()
    }
}

#[async_trait]
impl EngagementStore for InMemoryStore {
    async fn get_or_create_session(&self, session: Session) -> Result<Session> {
        let stored = self
            .sessions
            .entry(session.id.clone())
            .or_insert(session)
            .clone();
        Ok(stored)
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<Session>> {
        Ok(self.sessions.get(session_id).map(|s| s.clone()))
    }

    async fn append_event(&self, event: StoredEvent) -> Result<()> {
        let count_key = (event.session_id.clone(), event.event_name());
        let mut log = self.events.entry(event.session_id.clone()).or_default();
        log.push(event);
        // Bumped while the log entry is still held so counts never run ahead of the log
        *self.event_counts.entry(count_key).or_insert(0) += 1;
        drop(log);
        Ok(())
    }

    async fn query_events(
        &self,
        session_id: &str,
        event_name: EventName,
        since: DateTime<Utc>,
    ) -> Result<Vec<StoredEvent>> {
        let events = self
            .events
            .get(session_id)
            .map(|log| {
                log.iter()
                    .filter(|e| e.event_name() == event_name && e.created_at >= since)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(events)
    }

    async fn count_events(&self, session_id: &str, event_name: EventName) -> Result<u64> {
        let key = (session_id.to_string(), event_name);
        Ok(self.event_counts.get(&key).map(|c| *c).unwrap_or(0))
    }

    async fn events_for_ad(&self, ad_id: &str) -> Result<Vec<StoredEvent>> {
        let mut events: Vec<StoredEvent> = self
            .events
            .iter()
            .flat_map(|log| {
                log.value()
                    .iter()
                    .filter(|e| e.ad_id == ad_id)
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect();
        events.sort_by_key(|e| e.created_at);
        Ok(events)
    }

    async fn increment_interests(
        &self,
        session_id: &str,
        tags: &[String],
        delta: f64,
    ) -> Result<()> {
        let mut scores = self.interests.entry(session_id.to_string()).or_default();
        for tag in tags {
            *scores.entry(tag.clone()).or_insert(0.0) += delta;
        }
        Ok(())
    }

    async fn interest_scores(&self, session_id: &str) -> Result<HashMap<String, f64>> {
        Ok(self
            .interests
            .get(session_id)
            .map(|scores| scores.clone())
            .unwrap_or_default())
    }
}

/// Catalog held in process; the binary loads it from a JSON file
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    ads: RwLock<Vec<Ad>>,
}

impl InMemoryCatalog {
    pub fn new(ads: Vec<Ad>) -> Self {
        Self {
            ads: RwLock::new(ads),
        }
    }

    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        let ads: Vec<Ad> = serde_json::from_str(raw)?;
        Ok(Self::new(ads))
    }

    /// Insert or replace by id
    pub fn upsert(&self, ad: Ad) {
        let mut ads = self.ads.write();
        match ads.iter_mut().find(|existing| existing.id == ad.id) {
            Some(existing) => *existing = ad,
            None => ads.push(ad),
        }
    }

    pub fn len(&self) -> usize {
        self.ads.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ads.read().is_empty()
    }
}

#[async_trait]
impl AdCatalog for InMemoryCatalog {
    async fn get_ad(&self, ad_id: &str) -> Result<Option<Ad>> {
        Ok(self.ads.read().iter().find(|ad| ad.id == ad_id).cloned())
    }

    async fn active_ads(&self) -> Result<Vec<Ad>> {
        let mut active: Vec<Ad> = self
            .ads
            .read()
            .iter()
            .filter(|ad| ad.is_active())
            .cloned()
            .collect();
        active.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AdStatus, EventPayload, SwipeDirection};
    use chrono::Duration;
    use std::collections::BTreeSet;
    use uuid::Uuid;

    fn ad(id: &str, status: AdStatus, age_minutes: i64) -> Ad {
        Ad {
            id: id.to_string(),
            title: String::new(),
            advertiser_name: String::new(),
            status,
            category_tags: BTreeSet::new(),
            creative_duration_seconds: None,
            created_at: Utc::now() - Duration::minutes(age_minutes),
        }
    }

    fn event(session_id: &str, ad_id: &str, payload: EventPayload, at: DateTime<Utc>) -> StoredEvent {
        StoredEvent {
            id: Uuid::new_v4(),
            session_id: session_id.to_string(),
            ad_id: ad_id.to_string(),
            payload,
            created_at: at,
        }
    }

    #[tokio::test]
    async fn test_get_or_create_keeps_first_session() {
        let store = InMemoryStore::new();
        let first = Session {
            id: "s1".to_string(),
            created_at: Utc::now(),
            user_agent: Some("ua-1".to_string()),
            ip_hash: None,
        };
        let second = Session {
            user_agent: Some("ua-2".to_string()),
            ..first.clone()
        };

        store.get_or_create_session(first.clone()).await.unwrap();
        let stored = store.get_or_create_session(second).await.unwrap();

        assert_eq!(stored, first);
        assert_eq!(store.session_count(), 1);
    }

    #[tokio::test]
    async fn test_count_and_query_events() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let swipe = EventPayload::Swipe {
            direction: SwipeDirection::Right,
        };
        let impression = EventPayload::Impression { visible_ms: 500 };

        store.append_event(event("s1", "a1", swipe.clone(), now)).await.unwrap();
        store.append_event(event("s1", "a2", swipe, now)).await.unwrap();
        store
            .append_event(event("s1", "a1", impression.clone(), now - Duration::hours(2)))
            .await
            .unwrap();
        store.append_event(event("s1", "a2", impression, now)).await.unwrap();

        assert_eq!(store.count_events("s1", EventName::Swipe).await.unwrap(), 2);
        assert_eq!(store.count_events("s2", EventName::Swipe).await.unwrap(), 0);

        let recent = store
            .query_events("s1", EventName::Impression, now - Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].ad_id, "a2");

        assert_eq!(store.events_for_ad("a1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_increment_interests_sums_deltas() {
        let store = InMemoryStore::new();
        let tags = vec!["tech".to_string(), "music".to_string()];

        store.increment_interests("s1", &tags, 5.0).await.unwrap();
        store.increment_interests("s1", &tags[..1], -1.0).await.unwrap();

        let scores = store.interest_scores("s1").await.unwrap();
        assert_eq!(scores["tech"], 4.0);
        assert_eq!(scores["music"], 5.0);
        assert!(store.interest_scores("s2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_catalog_active_ads_newest_first() {
        let catalog = InMemoryCatalog::new(vec![
            ad("old", AdStatus::Active, 60),
            ad("draft", AdStatus::Draft, 1),
            ad("new", AdStatus::Active, 5),
            ad("rejected", AdStatus::Rejected, 2),
        ]);

        let active = catalog.active_ads().await.unwrap();
        let ids: Vec<&str> = active.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "old"]);

        assert!(catalog.get_ad("draft").await.unwrap().is_some());
        assert!(catalog.get_ad("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_catalog_upsert_replaces() {
        let catalog = InMemoryCatalog::default();
        catalog.upsert(ad("a1", AdStatus::Pending, 1));
        catalog.upsert(ad("a1", AdStatus::Active, 1));

        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.active_ads().await.unwrap().len(), 1);
    }
}
