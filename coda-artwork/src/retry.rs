//! Backoff retry for artwork that may lag availability.
//!
//! Lock-screen style surfaces need artwork for the item that just started
//! playing, which the server may not have processed yet. The retry loop is
//! explicit state (attempt counter + generation signal) rather than hidden
//! task juggling: when the active generation moves on, the loop stops at the
//! next opportunity and a stale result is never returned as current.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::sleep;
use tracing::debug;

use crate::pipeline::{ArtworkImage, ArtworkPipeline, ArtworkRequest};

/// Backoff schedule for [`load_with_retry`].
///
/// Retry `n` waits `n * base_delay`, so the defaults probe at roughly 2 s,
/// 4 s and 6 s after the initial miss.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub const fn defaults() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
        }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::defaults()
    }
}

/// Load artwork, retrying with backoff while it is still absent.
///
/// `active` carries the caller's current generation (e.g. a counter bumped
/// on every track change); the loop only runs — and only returns artwork —
/// while `*active.borrow() == generation`. Fetch errors are logged and
/// treated as "not there yet". Returns `None` when the policy is exhausted,
/// the artwork genuinely does not exist, or the generation went stale.
pub async fn load_with_retry(
    pipeline: &ArtworkPipeline,
    request: &ArtworkRequest,
    policy: &RetryPolicy,
    active: &mut watch::Receiver<u64>,
    generation: u64,
) -> Option<ArtworkImage> {
    let mut attempt: u32 = 0;
    loop {
        if *active.borrow() != generation {
            return None;
        }

        match pipeline.load(request).await {
            Ok(Some(image)) => {
                // Re-check before handing the image over: the fetch may have
                // outlived the item it was for.
                if *active.borrow() != generation {
                    return None;
                }
                return Some(image);
            }
            Ok(None) => {}
            Err(err) => {
                debug!(
                    "artwork attempt {} failed for {}: {err}",
                    attempt + 1,
                    request.key.cache_key()
                );
            }
        }

        if attempt >= policy.max_attempts {
            return None;
        }
        attempt += 1;

        let backoff = sleep(policy.delay_for(attempt));
        tokio::pin!(backoff);
        loop {
            tokio::select! {
                _ = &mut backoff => break,
                changed = active.changed() => {
                    // Sender dropped means the surface is gone entirely.
                    if changed.is_err() || *active.borrow() != generation {
                        return None;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::RetryPolicy;
    use std::time::Duration;

    #[test]
    fn delays_scale_linearly_with_attempt() {
        let policy = RetryPolicy::defaults();

        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(3), Duration::from_secs(6));
    }
}
