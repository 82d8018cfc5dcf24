//! Bounded polling

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::{Error, Result};

/// Result type for polling check functions.
///
/// - `Ok(Some(value))` - Condition met, return the value
/// - `Ok(None)` - Condition not met yet, keep polling
/// - `Err(e)` - Fatal error, stop polling immediately
pub type PollResult<T> = std::result::Result<Option<T>, String>;

/// Poll `check_fn` up to `max_attempts` times, sleeping `interval` between
/// attempts.
///
/// Returns the first value the check produces, [`Error::PollExhausted`] once
/// every attempt reported "not yet", or [`Error::PollFailed`] as soon as the
/// check reports a fatal error.
pub async fn poll_until<T, F, Fut>(
    max_attempts: u32,
    interval: Duration,
    description: &str,
    mut check_fn: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = PollResult<T>>,
{
    for attempt in 1..=max_attempts {
        match check_fn().await {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => {
                debug!(attempt, max_attempts, "Waiting for {}...", description);
                if attempt < max_attempts {
                    tokio::time::sleep(interval).await;
                }
            }
            Err(message) => {
                return Err(Error::PollFailed {
                    description: description.to_string(),
                    message,
                })
            }
        }
    }

    Err(Error::PollExhausted {
        description: description.to_string(),
        attempts: max_attempts,
    })
}
