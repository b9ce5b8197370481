/// Impression Deduplicator
///
/// Clients re-report an impression every time a creative scrolls back into
/// view. Only the first impression of an ad per session inside the
/// suppression window is kept; the rest are silently dropped.
///
/// # Guarantees
/// - O(1) duplicate detection keyed by `(session_id, ad_id)`
/// - Check-and-record is a single entry operation, so two concurrent
///   impressions for the same key admit exactly one
/// - Expired entries are replaced lazily and reclaimed by `sweep_expired`
use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

pub struct ImpressionDeduplicator {
    /// Last accepted impression per (session, ad)
    seen: DashMap<(String, String), DateTime<Utc>>,
    window: Duration,
}

impl ImpressionDeduplicator {
    pub fn new(window: Duration) -> Self {
        Self {
            seen: DashMap::new(),
            window,
        }
    }

    /// `true` when the impression should be recorded, `false` for a duplicate
    pub fn should_track(&self, session_id: &str, ad_id: &str, now: DateTime<Utc>) -> bool {
        let key = (session_id.to_string(), ad_id.to_string());
        match self.seen.entry(key) {
            Entry::Occupied(mut occupied) => {
                if now - *occupied.get() < self.window {
                    debug!(
                        session_id = session_id,
                        ad_id = ad_id,
                        "Duplicate impression suppressed"
                    );
                    false
                } else {
                    occupied.insert(now);
                    true
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(now);
                true
            }
        }
    }

    /// Undo a `should_track` admission made at `at`, e.g. when the write behind it failed
    pub fn release(&self, session_id: &str, ad_id: &str, at: DateTime<Utc>) {
        let key = (session_id.to_string(), ad_id.to_string());
        self.seen.remove_if(&key, |_, last_seen| *last_seen == at);
    }

    /// Remove entries whose suppression window has passed
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.seen.len();
        self.seen.retain(|_, last_seen| now - *last_seen < self.window);
        before.saturating_sub(self.seen.len())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn dedup() -> ImpressionDeduplicator {
        ImpressionDeduplicator::new(Duration::minutes(30))
    }

    #[test]
    fn test_second_impression_inside_window_suppressed() {
        let dedup = dedup();
        let now = Utc::now();

        assert!(dedup.should_track("s1", "ad1", now));
        assert!(!dedup.should_track("s1", "ad1", now + Duration::minutes(10)));
        assert!(dedup.should_track("s1", "ad1", now + Duration::minutes(31)));
    }

    #[test]
    fn test_window_edge_allows_at_exactly_thirty_minutes() {
        let dedup = dedup();
        let now = Utc::now();

        assert!(dedup.should_track("s1", "ad1", now));
        assert!(!dedup.should_track("s1", "ad1", now + Duration::minutes(30) - Duration::milliseconds(1)));
        assert!(dedup.should_track("s1", "ad1", now + Duration::minutes(30)));
    }

    #[test]
    fn test_suppressed_impression_does_not_extend_window() {
        let dedup = dedup();
        let now = Utc::now();

        assert!(dedup.should_track("s1", "ad1", now));
        assert!(!dedup.should_track("s1", "ad1", now + Duration::minutes(20)));
        assert!(dedup.should_track("s1", "ad1", now + Duration::minutes(30)));
    }

    #[test]
    fn test_keys_are_per_session_and_ad() {
        let dedup = dedup();
        let now = Utc::now();

        assert!(dedup.should_track("s1", "ad1", now));
        assert!(dedup.should_track("s1", "ad2", now));
        assert!(dedup.should_track("s2", "ad1", now));
        assert_eq!(dedup.len(), 3);
    }

    #[test]
    fn test_concurrent_impressions_admit_one() {
        let dedup = Arc::new(dedup());
        let now = Utc::now();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let dedup = Arc::clone(&dedup);
                std::thread::spawn(move || dedup.should_track("s1", "ad1", now))
            })
            .collect();

        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|tracked| *tracked)
            .count();
        assert_eq!(admitted, 1);
    }

    #[test]
    fn test_release_reopens_key() {
        let dedup = dedup();
        let now = Utc::now();

        assert!(dedup.should_track("s1", "ad1", now));
        dedup.release("s1", "ad1", now);
        assert!(dedup.should_track("s1", "ad1", now + Duration::seconds(1)));

        // A stale release does not drop a newer admission
        dedup.release("s1", "ad1", now);
        assert!(!dedup.should_track("s1", "ad1", now + Duration::seconds(2)));
    }

    #[test]
    fn test_sweep_expired() {
        let dedup = dedup();
        let now = Utc::now();
        dedup.should_track("s1", "old", now - Duration::minutes(45));
        dedup.should_track("s1", "new", now - Duration::minutes(5));

        assert_eq!(dedup.sweep_expired(now), 1);
        assert_eq!(dedup.len(), 1);
    }
}
