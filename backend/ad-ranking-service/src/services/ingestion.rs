// ============================================
// Ingestion Gate (事件接入)
// ============================================
//
// Every inbound engagement event passes these gates in order; the first
// failure short-circuits:
// 1. required fields present (session_id, ad_id, event_name)
// 2. event_name known, payload well-formed for that kind
// 3. per-session rate limit
// 4. session resolved (created on first sight)
// 5. ad resolved from the catalog
// 6. impressions only: duplicate suppression
// 7. event appended to the log
// 8. interest delta applied
//
// Steps 7 and 8 are the only store writes of an accepted event. A delta is
// never applied without its event in the log, and an appended event always
// gets its delta attempted.

use crate::config::IngestionConfig;
use crate::models::{
    EventName, EventPayload, StoredEvent, TrackEventRequest, ValidatedEvent,
};
use crate::services::deduplicator::ImpressionDeduplicator;
use crate::services::rate_limiter::{RateLimitDecision, RateLimiter};
use crate::services::realtime::{score_delta, InterestAggregator, RecencyTracker};
use crate::services::session_registry::SessionRegistry;
use crate::store::{AdCatalog, EngagementStore, StoreError};
use crate::utils::with_store_timeout;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Ad not found: {0}")]
    AdNotFound(String),

    #[error("Rate limit exceeded, retry after {retry_after_seconds}s")]
    RateLimitExceeded { retry_after_seconds: u64 },

    #[error("Store failure: {0}")]
    Store(#[from] StoreError),
}

impl IngestError {
    /// Wire name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            IngestError::Validation(_) => "validation_error",
            IngestError::AdNotFound(_) => "ad_not_found",
            IngestError::RateLimitExceeded { .. } => "rate_limit_exceeded",
            IngestError::Store(_) => "store_failure",
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            IngestError::RateLimitExceeded { .. } => true,
            IngestError::Store(e) => e.is_retryable(),
            IngestError::Validation(_) | IngestError::AdNotFound(_) => false,
        }
    }

    pub fn retry_after_seconds(&self) -> Option<u64> {
        match self {
            IngestError::RateLimitExceeded {
                retry_after_seconds,
            } => Some(*retry_after_seconds),
            _ => None,
        }
    }
}

/// Successful outcome of a submitted event
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    Accepted {
        event_id: Uuid,
        score_delta: Option<f64>,
    },
    /// Repeated impression inside the dedup window; nothing was written
    DuplicateSuppressed,
}

/// Response shape of the inbound event contract
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackEventResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<u64>,
}

impl From<&Result<IngestOutcome, IngestError>> for TrackEventResponse {
    fn from(result: &Result<IngestOutcome, IngestError>) -> Self {
        match result {
            Ok(_) => Self {
                success: true,
                error: None,
                error_kind: None,
                retry_after_seconds: None,
            },
            Err(e) => Self {
                success: false,
                error: Some(e.to_string()),
                error_kind: Some(e.kind().to_string()),
                retry_after_seconds: e.retry_after_seconds(),
            },
        }
    }
}

/// Check field presence, event kind and payload shape
pub fn validate(request: TrackEventRequest) -> Result<ValidatedEvent, IngestError> {
    let (session_id, ad_id, event_name) = match (
        non_empty(request.session_id),
        non_empty(request.ad_id),
        non_empty(request.event_name),
    ) {
        (Some(session_id), Some(ad_id), Some(event_name)) => (session_id, ad_id, event_name),
        _ => {
            return Err(IngestError::Validation(
                "Missing required fields: session_id, ad_id, event_name".to_string(),
            ))
        }
    };

    let event_name: EventName = event_name.parse().map_err(IngestError::Validation)?;

    let raw_payload = request
        .payload
        .filter(|value| !value.is_null())
        .unwrap_or_else(|| serde_json::json!({}));
    let payload = EventPayload::from_value(event_name, raw_payload).map_err(|e| {
        IngestError::Validation(format!("Invalid payload for {}: {}", event_name, e))
    })?;

    Ok(ValidatedEvent {
        session_id,
        ad_id,
        payload,
        user_agent: non_empty(request.user_agent),
        ip: non_empty(request.ip),
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

pub struct IngestionGate {
    rate_limiter: Arc<RateLimiter>,
    deduplicator: Arc<ImpressionDeduplicator>,
    sessions: SessionRegistry,
    catalog: Arc<dyn AdCatalog>,
    store: Arc<dyn EngagementStore>,
    interests: Arc<InterestAggregator>,
    recency: Arc<RecencyTracker>,
    default_duration_secs: u32,
    store_timeout: Duration,
}

impl IngestionGate {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: &IngestionConfig,
        rate_limiter: Arc<RateLimiter>,
        deduplicator: Arc<ImpressionDeduplicator>,
        catalog: Arc<dyn AdCatalog>,
        store: Arc<dyn EngagementStore>,
        interests: Arc<InterestAggregator>,
        recency: Arc<RecencyTracker>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            rate_limiter,
            deduplicator,
            sessions: SessionRegistry::new(Arc::clone(&store), store_timeout),
            catalog,
            store,
            interests,
            recency,
            default_duration_secs: config.default_creative_duration_secs,
            store_timeout,
        }
    }

    pub async fn submit(
        &self,
        request: TrackEventRequest,
        now: DateTime<Utc>,
    ) -> Result<IngestOutcome, IngestError> {
        let event = validate(request).map_err(|e| {
            debug!(error = %e, "Event rejected at validation");
            e
        })?;
        let event_name = event.event_name();

        if let RateLimitDecision::Limited {
            retry_after_seconds,
        } = self.rate_limiter.check(&event.session_id, now)
        {
            warn!(
                session_id = %event.session_id,
                event_name = %event_name,
                retry_after_seconds = retry_after_seconds,
                "Event rate limited"
            );
            return Err(IngestError::RateLimitExceeded {
                retry_after_seconds,
            });
        }

        self.sessions
            .get_or_create(
                &event.session_id,
                event.user_agent.as_deref(),
                event.ip.as_deref(),
                now,
            )
            .await?;

        let ad = with_store_timeout(self.store_timeout, self.catalog.get_ad(&event.ad_id))
            .await?
            .ok_or_else(|| IngestError::AdNotFound(event.ad_id.clone()))?;

        if event_name == EventName::Impression
            && !self
                .deduplicator
                .should_track(&event.session_id, &event.ad_id, now)
        {
            return Ok(IngestOutcome::DuplicateSuppressed);
        }

        let stored = StoredEvent::new(&event, now);
        let event_id = stored.id;
        if let Err(e) = with_store_timeout(self.store_timeout, self.store.append_event(stored)).await
        {
            if event_name == EventName::Impression {
                self.deduplicator.release(&event.session_id, &event.ad_id, now);
            }
            error!(
                session_id = %event.session_id,
                ad_id = %event.ad_id,
                event_name = %event_name,
                error = %e,
                "Failed to append event"
            );
            return Err(e.into());
        }

        if event_name == EventName::Impression {
            self.recency.record(&event.session_id, &event.ad_id, now);
        }

        let delta = score_delta(&event.payload, &ad, self.default_duration_secs);
        if let Some(delta) = delta {
            if let Err(e) = self
                .interests
                .apply_delta(&event.session_id, &ad.category_tags, delta)
                .await
            {
                error!(
                    session_id = %event.session_id,
                    event_id = %event_id,
                    delta = delta,
                    error = %e,
                    "Event appended but interest update failed"
                );
                return Err(e.into());
            }
        }

        debug!(
            session_id = %event.session_id,
            ad_id = %event.ad_id,
            event_name = %event_name,
            score_delta = ?delta,
            "Event accepted"
        );

        Ok(IngestOutcome::Accepted {
            event_id,
            score_delta: delta,
        })
    }
}
