//! Background monitoring loops
//!
//! - `presence`: device attach/detach polling, always alive
//! - `health`: reachability and throughput sampling while a test runs
//! - `keep_awake`: periodic swipe so the device screen stays on
//!
//! Every loop is spawned as its own task and controlled through a
//! [`LoopHandle`].

pub mod health;
pub mod keep_awake;
pub mod presence;

use std::future::Future;
use std::time::Duration;

use log::warn;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub use health::{FailureEvent, HealthEvent, NetworkHealthMonitor};
pub use keep_awake::KeepAwake;
pub use presence::DevicePresenceMonitor;

/// Stop signal plus join handle for a spawned loop.
///
/// Stopping waits for an in-flight bridge command to finish instead of
/// killing it.
#[derive(Debug)]
pub struct LoopHandle {
    name: &'static str,
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl LoopHandle {
    /// Spawns `body` with a fresh stop signal
    pub fn spawn<F, Fut>(name: &'static str, body: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let handle = tokio::spawn(body(token.clone()));
        Self {
            name,
            token,
            handle: Some(handle),
        }
    }

    /// Signals the loop and waits for it to exit. Safe to call repeatedly.
    pub async fn stop(&mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!("{} loop ended abnormally: {}", self.name, e);
            }
        }
    }

    /// True once the loop has exited on its own or been stopped
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }
}

impl Drop for LoopHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Sleeps for `period` unless `token` fires first. Returns `false` when stopped.
pub(crate) async fn pause_or_stop(token: &CancellationToken, period: Duration) -> bool {
    tokio::select! {
        _ = token.cancelled() => false,
        _ = tokio::time::sleep(period) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_idempotent_and_joins() {
        let iterations = Arc::new(AtomicUsize::new(0));
        let counter = iterations.clone();

        let mut handle = LoopHandle::spawn("test", move |token| async move {
            while pause_or_stop(&token, Duration::from_secs(1)).await {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_millis(3500)).await;
        handle.stop().await;
        let seen = iterations.load(Ordering::SeqCst);
        assert_eq!(seen, 3);
        assert!(handle.is_finished());

        handle.stop().await;
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(iterations.load(Ordering::SeqCst), seen);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_or_stop_returns_false_when_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        assert!(!pause_or_stop(&token, Duration::from_secs(60)).await);
    }
}
