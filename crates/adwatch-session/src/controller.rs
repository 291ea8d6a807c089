//! Detection controller.
//!
//! Per path the state moves `IDLE -> DETECTING -> CHECKED`. Before a run the
//! guard chain is evaluated in order and short-circuits on the first hit:
//!
//! 1. detection disabled: stay idle
//! 2. excluded path: checked, not blocked
//! 3. session memo present: checked, blocked
//! 4. inside the cooldown window: checked, verdict unchanged
//! 5. otherwise run the aggregator
//!
//! Storage faults anywhere in the chain read as "key absent".

use crate::debounce::Debouncer;
use crate::store::DetectionStore;
use adwatch_core::{
    session_memo_key, Clock, DetectionConfig, DetectionState, KeyValueStore, SystemClock,
    LAST_DETECTION_KEY, MEMO_SENTINEL,
};
use adwatch_probe::{Aggregator, Detection, DetectionOptions};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// How a call to [`DetectionController::check`] ended.
#[derive(Debug, Clone)]
pub enum CheckOutcome {
    /// Detection is switched off
    Disabled,
    /// Path is on the exclusion list
    Excluded,
    /// A session memo already marks the path as blocked
    Memoized,
    /// A run completed less than the cooldown ago
    CoolingDown,
    /// Probes ran and the verdict was published
    Completed(Detection),
    /// Probes ran but a newer navigation made the verdict stale
    Superseded(Detection),
}

impl CheckOutcome {
    /// Whether the aggregator ran.
    #[must_use]
    pub fn ran_probes(&self) -> bool {
        matches!(self, Self::Completed(_) | Self::Superseded(_))
    }

    /// Short label for logs and CLI output.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Excluded => "excluded",
            Self::Memoized => "memoized",
            Self::CoolingDown => "cooling-down",
            Self::Completed(_) => "completed",
            Self::Superseded(_) => "superseded",
        }
    }
}

/// Decides when probes run and publishes the verdict.
pub struct DetectionController {
    config: DetectionConfig,
    aggregator: Aggregator,
    store: Arc<DetectionStore>,
    session: Arc<dyn KeyValueStore>,
    durable: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    debouncer: Debouncer,
    generation: AtomicU64,
}

impl DetectionController {
    /// Create a controller.
    ///
    /// `session` holds the per-tab memo, `durable` the cooldown timestamp.
    #[must_use]
    pub fn new(
        config: DetectionConfig,
        aggregator: Aggregator,
        session: Arc<dyn KeyValueStore>,
        durable: Arc<dyn KeyValueStore>,
    ) -> Self {
        let debouncer = Debouncer::new(config.check_delay());
        Self {
            config,
            aggregator,
            store: Arc::new(DetectionStore::new()),
            session,
            durable,
            clock: Arc::new(SystemClock),
            debouncer,
            generation: AtomicU64::new(0),
        }
    }

    /// Use a different clock for cooldown accounting.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Publish into an existing store.
    #[must_use]
    pub fn with_store(mut self, store: Arc<DetectionStore>) -> Self {
        self.store = store;
        self
    }

    /// Store this controller writes to.
    #[must_use]
    pub fn store(&self) -> &Arc<DetectionStore> {
        &self.store
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// React to a path change.
    ///
    /// Resets the state to idle for `path` and schedules a check after the
    /// configured delay. A later navigation cancels a check that has not
    /// started yet; one already running finishes and is reported as
    /// superseded.
    pub fn navigate(self: &Arc<Self>, path: impl Into<String>) -> JoinHandle<bool> {
        let path = path.into();
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.store.update(|s| {
            s.current_path.clone_from(&path);
            s.is_detecting = false;
            s.has_checked = false;
        });
        tracing::debug!(path = %path, delay_ms = self.config.check_delay_ms, "navigation, scheduling check");

        let controller = Arc::clone(self);
        self.debouncer.schedule(async move {
            controller.check(&path).await;
        })
    }

    /// Evaluate the guard chain for `path` and run probes if it passes.
    pub async fn check(&self, path: &str) -> CheckOutcome {
        let generation = self.generation.load(Ordering::SeqCst);
        self.store.update(|s| {
            if s.current_path != path {
                s.current_path = path.to_string();
                s.has_checked = false;
            }
        });

        if !self.config.enabled {
            tracing::debug!(path, "detection disabled");
            return CheckOutcome::Disabled;
        }

        if self.config.is_excluded(path) {
            tracing::debug!(path, "path excluded from detection");
            self.store.update(|s| {
                s.is_detecting = false;
                s.has_checked = true;
                s.is_blocked = false;
            });
            return CheckOutcome::Excluded;
        }

        let memo_key = session_memo_key(path);
        if self.read(self.session.as_ref(), &memo_key).await.as_deref() == Some(MEMO_SENTINEL) {
            tracing::debug!(path, "session memo present, skipping probes");
            self.store.update(|s| {
                s.is_detecting = false;
                s.has_checked = true;
                s.is_blocked = true;
            });
            return CheckOutcome::Memoized;
        }

        if let Some(last) = self.last_detection_ms().await {
            let elapsed = self.clock.now_ms().saturating_sub(last);
            if elapsed < i64::try_from(self.config.cooldown_ms).unwrap_or(i64::MAX) {
                tracing::debug!(path, elapsed_ms = elapsed, "inside cooldown window");
                self.store.update(|s| {
                    s.is_detecting = false;
                    s.has_checked = true;
                });
                return CheckOutcome::CoolingDown;
            }
        }

        self.store.update(|s| {
            s.is_detecting = true;
            s.has_checked = false;
        });

        let detection = self
            .aggregator
            .run_detection(&self.config.methods, &DetectionOptions::from(&self.config))
            .await;

        let finished_at = self.clock.now_ms();
        self.write(self.durable.as_ref(), LAST_DETECTION_KEY, &finished_at.to_string())
            .await;

        if self.generation.load(Ordering::SeqCst) != generation {
            tracing::debug!(path, "navigation moved on, discarding verdict");
            self.store.update(|s| s.last_detection_timestamp_ms = Some(finished_at));
            return CheckOutcome::Superseded(detection);
        }

        if detection.detected {
            self.write(self.session.as_ref(), &memo_key, MEMO_SENTINEL).await;
        } else {
            self.erase(self.session.as_ref(), &memo_key).await;
        }

        let blocked = detection.detected;
        self.store.update(|s| {
            s.last_detection_timestamp_ms = Some(finished_at);
            s.is_blocked = blocked;
            s.has_checked = true;
            s.is_detecting = false;
        });
        tracing::info!(path, blocked, "ad blocker check complete");

        CheckOutcome::Completed(detection)
    }

    /// Forget the verdict for the current path and check it again.
    ///
    /// Clears the session memo first; the cooldown still applies.
    pub async fn retry(&self) -> CheckOutcome {
        let path = self.store.snapshot().current_path;
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.debouncer.cancel();
        self.erase(self.session.as_ref(), &session_memo_key(&path)).await;
        self.store.update(|s| {
            s.is_detecting = false;
            s.has_checked = false;
        });
        tracing::debug!(path = %path, "retrying detection");
        self.check(&path).await
    }

    /// Re-run probes from the interstitial page on behalf of `return_path`.
    ///
    /// Bypasses the guard chain. A clear verdict removes the memo for
    /// `return_path` and clears `is_blocked` so the visitor can be sent back.
    pub async fn recheck_for_return(&self, return_path: &str) -> Detection {
        self.store.update(|s| {
            s.is_detecting = true;
            s.has_checked = false;
        });
        let detection = self
            .aggregator
            .run_detection(&self.config.methods, &DetectionOptions::from(&self.config))
            .await;

        let finished_at = self.clock.now_ms();
        self.write(self.durable.as_ref(), LAST_DETECTION_KEY, &finished_at.to_string())
            .await;

        if !detection.detected {
            self.erase(self.session.as_ref(), &session_memo_key(return_path))
                .await;
        }
        let blocked = detection.detected;
        self.store.update(|s| {
            s.last_detection_timestamp_ms = Some(finished_at);
            s.is_detecting = false;
            s.has_checked = true;
            if !blocked {
                s.is_blocked = false;
            }
        });
        tracing::info!(return_path, blocked, "interstitial re-check complete");

        detection
    }

    /// Current state, for callers that do not subscribe.
    #[must_use]
    pub fn state(&self) -> DetectionState {
        self.store.snapshot()
    }

    async fn last_detection_ms(&self) -> Option<i64> {
        let raw = self.read(self.durable.as_ref(), LAST_DETECTION_KEY).await?;
        match raw.parse::<i64>() {
            Ok(ms) => Some(ms),
            Err(_) => {
                tracing::warn!("Ignoring unreadable detection timestamp '{}'", raw);
                None
            }
        }
    }

    async fn read(&self, store: &dyn KeyValueStore, key: &str) -> Option<String> {
        match store.get(key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Storage read for {} failed, treating as absent: {}", key, e);
                None
            }
        }
    }

    async fn write(&self, store: &dyn KeyValueStore, key: &str, value: &str) {
        if let Err(e) = store.set(key, value).await {
            tracing::warn!("Storage write for {} failed: {}", key, e);
        }
    }

    async fn erase(&self, store: &dyn KeyValueStore, key: &str) {
        if let Err(e) = store.remove(key).await {
            tracing::warn!("Storage remove for {} failed: {}", key, e);
        }
    }
}
