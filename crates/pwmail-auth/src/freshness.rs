//! Timestamp freshness checks.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::AuthError;

/// Maximum accepted age of a request timestamp.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(180);

/// Maximum accepted distance of a request timestamp into the future.
pub const DEFAULT_MAX_FUTURE_SKEW: Duration = Duration::from_secs(30);

/// Accepts a request iff its timestamp lies in
/// `[now - window, now + max_future_skew]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessGate {
    window: Duration,
    max_future_skew: Duration,
}

impl Default for FreshnessGate {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW, DEFAULT_MAX_FUTURE_SKEW)
    }
}

impl FreshnessGate {
    pub fn new(window: Duration, max_future_skew: Duration) -> Self {
        Self {
            window,
            max_future_skew,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn max_future_skew(&self) -> Duration {
        self.max_future_skew
    }

    /// How long a consumed nonce can still matter for replay detection.
    ///
    /// A request carrying an already-consumed nonce can only pass the
    /// freshness check for `window + max_future_skew` after it was first seen.
    pub fn retention(&self) -> Duration {
        self.window.saturating_add(self.max_future_skew)
    }

    /// Parse an RFC3339 timestamp.
    pub fn parse(timestamp: &str) -> Result<DateTime<Utc>, AuthError> {
        DateTime::parse_from_rfc3339(timestamp)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| AuthError::BadRequest(format!("timestamp: {e}")))
    }

    /// Check a request timestamp against `now`.
    ///
    /// Malformed timestamps are a [`AuthError::BadRequest`]; well-formed
    /// but out-of-window ones are a [`AuthError::Timeout`].
    pub fn check(&self, timestamp: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, AuthError> {
        let issued_at = Self::parse(timestamp)?;
        let age = now.signed_duration_since(issued_at);

        let fresh = if age >= chrono::Duration::zero() {
            age.to_std().map_or(false, |age| age <= self.window)
        } else {
            (-age).to_std().map_or(false, |ahead| ahead <= self.max_future_skew)
        };

        if fresh {
            Ok(issued_at)
        } else {
            Err(AuthError::Timeout)
        }
    }
}
