//! Cancellable delayed execution.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Runs a task after a fixed delay; scheduling again cancels the pending one.
///
/// Only the wait is cancellable. Once the delay elapses the task runs to
/// completion even if something newer is scheduled.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    pending: Mutex<Option<CancellationToken>>,
}

impl Debouncer {
    /// Debouncer with the given delay.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Mutex::new(None),
        }
    }

    /// Configured delay.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule `task`, cancelling whatever was waiting.
    ///
    /// The handle resolves to `true` when the task ran and `false` when it
    /// was cancelled before the delay elapsed.
    pub fn schedule<F>(&self, task: F) -> JoinHandle<bool>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        if let Ok(mut pending) = self.pending.lock() {
            if let Some(previous) = pending.replace(token.clone()) {
                previous.cancel();
            }
        }

        let delay = self.delay;
        tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => {
                    tracing::debug!("pending check cancelled");
                    false
                }
                () = tokio::time::sleep(delay) => {
                    task.await;
                    true
                }
            }
        })
    }

    /// Cancel the pending task, if any.
    pub fn cancel(&self) {
        if let Ok(mut pending) = self.pending.lock() {
            if let Some(token) = pending.take() {
                token.cancel();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_runs_after_delay() {
        let debouncer = Debouncer::new(Duration::from_millis(500));
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        let started = tokio::time::Instant::now();
        let ran = debouncer
            .schedule(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .await
            .unwrap();

        assert!(ran);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reschedule_cancels_pending() {
        let debouncer = Debouncer::new(Duration::from_millis(500));
        let hits = Arc::new(AtomicUsize::new(0));

        let c1 = hits.clone();
        let first = debouncer.schedule(async move {
            c1.fetch_add(1, Ordering::SeqCst);
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
        let c2 = hits.clone();
        let second = debouncer.schedule(async move {
            c2.fetch_add(10, Ordering::SeqCst);
        });

        assert!(!first.await.unwrap());
        assert!(second.await.unwrap());
        assert_eq!(hits.load(Ordering::SeqCst), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_explicit_cancel() {
        let debouncer = Debouncer::new(Duration::from_secs(1));
        let handle = debouncer.schedule(async {});
        debouncer.cancel();
        assert!(!handle.await.unwrap());
    }
}
