// ============================================
// Session Registry (会话注册)
// ============================================
//
// Creates an anonymous session on first sight and hands back the stored
// record on every later call. Later user-agent / ip values are ignored.

use crate::models::Session;
use crate::store::{EngagementStore, Result};
use crate::utils::{hash_ip, with_store_timeout};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub struct SessionRegistry {
    store: Arc<dyn EngagementStore>,
    store_timeout: Duration,
}

impl SessionRegistry {
    pub fn new(store: Arc<dyn EngagementStore>, store_timeout: Duration) -> Self {
        Self {
            store,
            store_timeout,
        }
    }

    pub async fn get_or_create(
        &self,
        session_id: &str,
        user_agent: Option<&str>,
        ip: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Session> {
        if let Some(existing) =
            with_store_timeout(self.store_timeout, self.store.get_session(session_id)).await?
        {
            return Ok(existing);
        }

        let candidate = Session {
            id: session_id.to_string(),
            created_at: now,
            user_agent: user_agent.map(str::to_string),
            ip_hash: ip.map(hash_ip),
        };

        let session = with_store_timeout(
            self.store_timeout,
            self.store.get_or_create_session(candidate),
        )
        .await?;

        debug!(
            session_id = session_id,
            created_at = %session.created_at,
            "Session resolved"
        );

        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use chrono::Duration as ChronoDuration;

    fn registry() -> SessionRegistry {
        SessionRegistry::new(Arc::new(InMemoryStore::new()), Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_creates_session_with_ip_hash() {
        let registry = registry();
        let now = Utc::now();

        let session = registry
            .get_or_create("s1", Some("Mozilla/5.0"), Some("127.0.0.1"), now)
            .await
            .unwrap();

        assert_eq!(session.id, "s1");
        assert_eq!(session.created_at, now);
        assert_eq!(session.user_agent.as_deref(), Some("Mozilla/5.0"));
        assert_eq!(session.ip_hash.as_deref(), Some("12ca17b49af22894"));
    }

    #[tokio::test]
    async fn test_without_ip_has_no_hash() {
        let session = registry()
            .get_or_create("s1", None, None, Utc::now())
            .await
            .unwrap();
        assert!(session.ip_hash.is_none());
        assert!(session.user_agent.is_none());
    }

    #[tokio::test]
    async fn test_existing_session_is_unchanged() {
        let registry = registry();
        let first_seen = Utc::now();

        let first = registry
            .get_or_create("s1", Some("ua-a"), Some("10.0.0.1"), first_seen)
            .await
            .unwrap();
        let again = registry
            .get_or_create(
                "s1",
                Some("ua-b"),
                Some("10.0.0.2"),
                first_seen + ChronoDuration::minutes(5),
            )
            .await
            .unwrap();

        assert_eq!(first, again);
    }
}
