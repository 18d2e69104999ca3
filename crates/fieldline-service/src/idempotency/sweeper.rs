//! Periodic expiry sweep for the idempotency store.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::IdempotencyStore;

/// ## Summary
/// Spawns a background task that evicts expired idempotency entries every
/// `interval`. The sweep runs independently of request handling; a failed
/// pass is logged and retried on the next tick.
pub fn spawn_sweeper(store: Arc<IdempotencyStore>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately; skip it so a fresh store is not
        // swept before it has seen any traffic.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match store.sweep().await {
                Ok(0) => {}
                Ok(evicted) => {
                    tracing::debug!(evicted, "Idempotency sweep evicted expired entries");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Idempotency sweep failed");
                }
            }
        }
    })
}
