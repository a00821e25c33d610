//! # Retry Policy
//!
//! Bounded retry with exponential backoff for transient storage conflicts.
//!
//! ## Flow
//! ```text
//! attempt 1 ──► Ok ──────────────────────────────────► return
//!     │
//!     └─ Err(busy / unique clash / pool exhausted)
//!            │
//!            ▼
//!     sleep(next_backoff)   20ms, 40ms, 80ms ... capped at 500ms
//!            │
//!            ▼
//!     attempt 2 ... attempt (max_retries + 1)
//!            │
//!            └─ still failing ──► ConcurrencyConflict { entity, id, attempts }
//! ```
//!
//! Business errors are never retried.

use std::future::Future;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use floor_core::CoreError;
use tracing::{debug, warn};

use crate::config::ConcurrencySettings;
use crate::error::{FloorError, FloorResult};

/// How many times, and how patiently, to retry.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    initial_interval: Duration,
    max_interval: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_interval: Duration, max_interval: Duration) -> Self {
        RetryPolicy {
            max_retries,
            initial_interval,
            max_interval,
        }
    }

    pub fn from_settings(settings: &ConcurrencySettings) -> Self {
        Self::new(
            settings.max_retries,
            Duration::from_millis(settings.initial_backoff_ms),
            Duration::from_millis(settings.max_backoff_ms),
        )
    }

    /// Never retries.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO, Duration::ZERO)
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    fn backoff(&self) -> ExponentialBackoff {
        let mut backoff = ExponentialBackoff {
            initial_interval: self.initial_interval,
            max_interval: self.max_interval,
            multiplier: 2.0,
            randomization_factor: 0.2,
            // Attempts are counted here; never let elapsed time stop us.
            max_elapsed_time: None,
            ..Default::default()
        };
        // Start from our initial interval, not the crate default.
        backoff.reset();
        backoff
    }

    /// Runs `op` until it succeeds, fails with a non-retryable error, or the
    /// retry budget runs out.
    ///
    /// `entity` and `id` name what was contended, for the surfaced
    /// `ConcurrencyConflict`.
    pub async fn run<T, F, Fut>(&self, entity: &str, id: &str, mut op: F) -> FloorResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = FloorResult<T>>,
    {
        let mut backoff = self.backoff();
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(entity, id, attempt, "Succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) if is_transient(&err) => {
                    if attempt > self.max_retries {
                        warn!(entity, id, attempts = attempt, error = %err, "Retries exhausted");
                        return Err(CoreError::ConcurrencyConflict {
                            entity: entity.to_string(),
                            id: id.to_string(),
                            attempts: attempt,
                        }
                        .into());
                    }

                    let wait = backoff.next_backoff().unwrap_or(self.max_interval);
                    warn!(entity, id, attempt, ?wait, error = %err, "Transient conflict, retrying");
                    tokio::time::sleep(wait).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&ConcurrencySettings::default())
    }
}

/// Storage contention, or a plan invalidated between planning and locking.
fn is_transient(err: &FloorError) -> bool {
    err.is_retryable() || matches!(err, FloorError::Domain(CoreError::ConcurrencyConflict { .. }))
}

// =============================================================================
// Unit Tests
// =============================================================================
