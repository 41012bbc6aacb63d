//! Per-client request throttling with fixed time windows.
//!
//! Requests are counted in buckets keyed by `identifier + "_" + floor(now / window)`. This is
//! a fixed-window counter: a client can land `limit` requests at the end of one window and
//! `limit` more at the start of the next, so up to `2 * limit` requests may pass within one
//! window length across a boundary.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ValidationError;
use crate::store::{RecordStore, StorageError, Table};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateBucket {
    pub key: String,
    pub identifier: String,
    /// Unix seconds at which the bucket's window opened.
    pub window_start: i64,
    pub window_seconds: u64,
    pub count: u32,
}

impl RateBucket {
    fn is_stale(&self, now: i64) -> bool {
        let horizon = i64::try_from(self.window_seconds.saturating_mul(2)).unwrap_or(i64::MAX);
        now.saturating_sub(self.window_start) >= horizon
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub resets_at: DateTime<Utc>,
}

pub struct RateLimiter {
    store: Arc<RecordStore>,
}

impl RateLimiter {
    pub fn new(store: Arc<RecordStore>) -> Self {
        Self { store }
    }

    pub fn allow(
        &self,
        identifier: &str,
        limit: u32,
        window: Duration,
    ) -> Result<bool, ValidationError> {
        self.check(identifier, limit, window)
            .map(|decision| decision.allowed)
    }

    /// Counts one request against `identifier`. When the bucket table cannot be persisted
    /// the request is let through and the failure is logged.
    pub fn check(
        &self,
        identifier: &str,
        limit: u32,
        window: Duration,
    ) -> Result<RateDecision, ValidationError> {
        let window_seconds = window.as_secs();
        if window_seconds == 0 {
            return Err(ValidationError::new(
                "window",
                "must be at least one second",
            ));
        }
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(ValidationError::new("identifier", "is required"));
        }

        let now = self.store.now().timestamp();
        let span = i64::try_from(window_seconds).unwrap_or(i64::MAX);
        let index = now.div_euclid(span);
        let window_start = index.saturating_mul(span);
        let key = format!("{identifier}_{index}");
        let resets_at = DateTime::from_timestamp(window_start.saturating_add(span), 0)
            .unwrap_or_default();

        let outcome = self
            .store
            .modify(Table::RateLimits, |buckets: &mut Vec<RateBucket>| {
                buckets.retain(|bucket| !bucket.is_stale(now));

                let position = buckets.iter().position(|bucket| bucket.key == key);
                let count = position.map_or(0, |at| buckets[at].count);
                if count >= limit {
                    return Ok::<_, StorageError>((false, 0));
                }

                match position {
                    Some(at) => buckets[at].count += 1,
                    None => buckets.push(RateBucket {
                        key: key.clone(),
                        identifier: identifier.to_string(),
                        window_start,
                        window_seconds,
                        count: 1,
                    }),
                }
                Ok((true, limit - count - 1))
            });

        let (allowed, remaining) = match outcome {
            Ok(result) => result,
            Err(err) => {
                warn!(identifier, error = %err, "rate limiter storage failed; allowing request");
                (true, limit.saturating_sub(1))
            }
        };

        if !allowed {
            debug!(identifier, limit, window_seconds, "rate limit exceeded");
        }

        Ok(RateDecision {
            allowed,
            remaining,
            resets_at,
        })
    }
}
