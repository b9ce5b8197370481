use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Anonymous viewer session. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub user_agent: Option<String>,
    /// First 16 hex chars of SHA-256(ip)
    pub ip_hash: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdStatus {
    Draft,
    Pending,
    Active,
    Rejected,
}

/// Read-only view of an ad creative from the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ad {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub advertiser_name: String,
    pub status: AdStatus,
    #[serde(default)]
    pub category_tags: BTreeSet<String>,
    pub creative_duration_seconds: Option<u32>,
    pub created_at: DateTime<Utc>,
}

impl Ad {
    pub fn is_active(&self) -> bool {
        self.status == AdStatus::Active
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventName {
    Impression,
    ViewStart,
    WatchTime,
    Complete,
    Swipe,
    Click,
}

impl EventName {
    pub const ALL: [EventName; 6] = [
        EventName::Impression,
        EventName::ViewStart,
        EventName::WatchTime,
        EventName::Complete,
        EventName::Swipe,
        EventName::Click,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventName::Impression => "impression",
            EventName::ViewStart => "view_start",
            EventName::WatchTime => "watch_time",
            EventName::Complete => "complete",
            EventName::Swipe => "swipe",
            EventName::Click => "click",
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| {
                let valid: Vec<&str> = EventName::ALL.iter().map(|n| n.as_str()).collect();
                format!("Invalid event_name. Must be one of: {}", valid.join(", "))
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwipeDirection {
    Right,
    Left,
    Up,
}

impl SwipeDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwipeDirection::Right => "right",
            SwipeDirection::Left => "left",
            SwipeDirection::Up => "up",
        }
    }
}

/// Event payload, discriminated by event name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_name", content = "payload", rename_all = "snake_case")]
pub enum EventPayload {
    Impression {
        #[serde(default)]
        visible_ms: u64,
    },
    ViewStart {},
    WatchTime {
        watch_time_ms: u64,
    },
    Complete {
        #[serde(default)]
        completed: bool,
    },
    Swipe {
        direction: SwipeDirection,
    },
    Click {
        #[serde(default)]
        destination_url: String,
    },
}

impl EventPayload {
    pub fn event_name(&self) -> EventName {
        match self {
            EventPayload::Impression { .. } => EventName::Impression,
            EventPayload::ViewStart {} => EventName::ViewStart,
            EventPayload::WatchTime { .. } => EventName::WatchTime,
            EventPayload::Complete { .. } => EventName::Complete,
            EventPayload::Swipe { .. } => EventName::Swipe,
            EventPayload::Click { .. } => EventName::Click,
        }
    }

    /// Parse an untyped payload for a known event name
    pub fn from_value(name: EventName, payload: serde_json::Value) -> serde_json::Result<Self> {
        let tagged = serde_json::json!({
            "event_name": name.as_str(),
            "payload": payload,
        });
        serde_json::from_value(tagged)
    }
}

/// Inbound event exactly as received; nothing is trusted yet
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackEventRequest {
    pub session_id: Option<String>,
    pub ad_id: Option<String>,
    pub event_name: Option<String>,
    #[serde(default)]
    pub payload: Option<serde_json::Value>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
}

/// Event that passed boundary validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedEvent {
    pub session_id: String,
    pub ad_id: String,
    pub payload: EventPayload,
    pub user_agent: Option<String>,
    pub ip: Option<String>,
}

impl ValidatedEvent {
    pub fn event_name(&self) -> EventName {
        self.payload.event_name()
    }
}

/// Append-only event log record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredEvent {
    pub id: Uuid,
    pub session_id: String,
    pub ad_id: String,
    pub payload: EventPayload,
    pub created_at: DateTime<Utc>,
}

impl StoredEvent {
    pub fn new(event: &ValidatedEvent, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id: event.session_id.clone(),
            ad_id: event.ad_id.clone(),
            payload: event.payload.clone(),
            created_at: now,
        }
    }

    pub fn event_name(&self) -> EventName {
        self.payload.event_name()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedMode {
    Exploring,
    Personalized,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedFeed {
    pub ads: Vec<Ad>,
    pub is_exploration_mode: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SwipeCounts {
    pub right: u64,
    pub left: u64,
    pub up: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdEventStats {
    pub impressions: u64,
    pub view_starts: u64,
    pub completions: u64,
    pub clicks: u64,
    pub avg_watch_time_ms: f64,
    pub swipes: SwipeCounts,
}
