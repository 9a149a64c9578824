// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Idle connection reaper task

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::TrackedPool;

/// Cleanup interval for expired connections (60 seconds)
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Starts a background task reaping expired idle connections from every pool
///
/// Runs every 60 seconds until `shutdown_rx` flips to `true`.
pub fn start_pool_cleanup_task(
    pools: Vec<Arc<TrackedPool>>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut cleanup_ticker = tokio::time::interval(CLEANUP_INTERVAL);
        loop {
            tokio::select! {
                _ = cleanup_ticker.tick() => {
                    for pool in &pools {
                        pool.cleanup();
                    }
                },
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::debug!("Stopping connection pool cleanup");
                        break;
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cleanup_task_respects_shutdown_signal() {
        let pool = Arc::new(TrackedPool::new("primary"));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = start_pool_cleanup_task(vec![pool.clone()], shutdown_rx);

        tokio::time::sleep(Duration::from_millis(50)).await;
        let _ = shutdown_tx.send(true);

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("cleanup task did not stop")
            .unwrap();
        assert_eq!(pool.stats().total, 0);
    }

    #[tokio::test]
    async fn test_first_tick_reaps_expired_connections() {
        let pool = Arc::new(TrackedPool::new("primary").max_idle_time(Duration::ZERO));
        drop(pool.checkout());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = start_pool_cleanup_task(vec![pool.clone()], shutdown_rx);

        // interval fires immediately on the first tick
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(pool.stats().total, 0);

        let _ = shutdown_tx.send(true);
        let _ = handle.await;
    }

    #[test]
    fn test_cleanup_interval_constant_is_60_seconds() {
        assert_eq!(CLEANUP_INTERVAL, Duration::from_secs(60));
    }
}
