// Utility functions for ad-ranking-service

use crate::store::StoreError;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

/// Length of the stored IP fingerprint, in hex characters
pub const IP_HASH_LEN: usize = 16;

/// Truncated SHA-256 fingerprint of a client IP
pub fn hash_ip(ip: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(ip.as_bytes());
    let mut digest = hex::encode(hasher.finalize());
    digest.truncate(IP_HASH_LEN);
    digest
}

/// Whole seconds until `reset_at`, rounded up
pub fn seconds_until_ceil(now: DateTime<Utc>, reset_at: DateTime<Utc>) -> u64 {
    let remaining_ms = (reset_at - now).num_milliseconds().max(0) as u64;
    remaining_ms.div_ceil(1000)
}

/// Run a store call, mapping an elapsed deadline to `StoreError::Timeout`
pub async fn with_store_timeout<F, T>(duration: Duration, future: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(duration)),
    }
}
