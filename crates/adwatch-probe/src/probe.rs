//! Probe trait and the runner that enforces the probe contract.
//!
//! A probe's own logic may fail, stall, or panic. [`run_probe`] turns every one
//! of those exits into a [`ProbeResult`] and removes every element the probe
//! inserted before returning.

use crate::environment::{BaitElement, ElementMetrics, ProbeEnvironment, ScriptLoad};
use crate::error::Result;
use adwatch_core::ProbeResult;
use async_trait::async_trait;
use futures::FutureExt;
use serde_json::json;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Extra time the runner grants past a probe's own timeout before giving up on it.
pub const RUNNER_GRACE: Duration = Duration::from_millis(250);

/// Upper bound for removing a probe's elements.
pub const CLEANUP_TIMEOUT: Duration = Duration::from_millis(500);

/// Per-invocation parameters.
#[derive(Debug, Clone, Copy)]
pub struct ProbeContext {
    /// Time the probe may spend on its own checks
    pub timeout: Duration,
    /// Emit diagnostic logs for this probe
    pub logging: bool,
}

impl Default for ProbeContext {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(3000),
            logging: false,
        }
    }
}

/// A single heuristic check for ad-blocking behavior.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Registry name of the probe.
    fn method(&self) -> &str;

    /// Whether an error or stall counts as a detection.
    fn fails_closed(&self) -> bool {
        false
    }

    /// Timeout for this probe given the configured per-probe timeout.
    fn timeout(&self, configured: Duration) -> Duration {
        configured
    }

    /// Run the check. Elements must be inserted through `scope` so the runner
    /// can clean them up.
    async fn check(&self, scope: &ProbeScope, ctx: &ProbeContext) -> Result<ProbeResult>;
}

/// Environment handle that remembers what a probe inserted.
pub struct ProbeScope {
    env: Arc<dyn ProbeEnvironment>,
    inserted: Mutex<Vec<String>>,
}

impl ProbeScope {
    /// Wrap an environment.
    #[must_use]
    pub fn new(env: Arc<dyn ProbeEnvironment>) -> Self {
        Self {
            env,
            inserted: Mutex::new(Vec::new()),
        }
    }

    /// Unique DOM id for a bait element.
    #[must_use]
    pub fn unique_id(prefix: &str) -> String {
        format!("{prefix}-{}", uuid::Uuid::new_v4().simple())
    }

    /// Insert an element and remember it for cleanup.
    pub async fn insert(&self, element: &BaitElement) -> Result<()> {
        // Recorded before the call so a stalled insert still gets cleaned up.
        if let Ok(mut inserted) = self.inserted.lock() {
            inserted.push(element.id.clone());
        }
        self.env.insert(element).await
    }

    /// Measure an element.
    pub async fn measure(&self, id: &str) -> Result<Option<ElementMetrics>> {
        self.env.measure(id).await
    }

    /// Load a script. The script element is cleaned up like inserted bait,
    /// so a load that never settles does not leave it behind.
    pub async fn load_script(&self, url: &str) -> Result<ScriptLoad> {
        let id = Self::unique_id("adwatch-script");
        if let Ok(mut inserted) = self.inserted.lock() {
            inserted.push(id.clone());
        }
        self.env.load_script(&id, url).await
    }

    /// Request an ad fill for a slot.
    pub async fn request_ad_fill(&self, id: &str) -> Result<()> {
        self.env.request_ad_fill(id).await
    }

    /// Remove everything inserted through this scope, newest first.
    ///
    /// Removal errors are logged and skipped.
    pub async fn cleanup(&self) {
        let ids: Vec<String> = match self.inserted.lock() {
            Ok(mut inserted) => inserted.drain(..).rev().collect(),
            Err(_) => return,
        };
        for id in ids {
            match tokio::time::timeout(CLEANUP_TIMEOUT, self.env.remove(&id)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!("Failed to remove bait element {}: {}", id, e),
                Err(_) => tracing::warn!("Timed out removing bait element {}", id),
            }
        }
    }

    /// Number of elements awaiting cleanup.
    #[must_use]
    pub fn pending_cleanup(&self) -> usize {
        self.inserted.lock().map(|i| i.len()).unwrap_or(0)
    }
}

/// Run one probe under the probe contract.
///
/// The probe's check is raced against its timeout plus [`RUNNER_GRACE`].
/// Errors, timeouts and panics resolve to `detected = probe.fails_closed()`.
/// Cleanup runs on every path.
pub async fn run_probe(
    probe: Arc<dyn Probe>,
    env: Arc<dyn ProbeEnvironment>,
    ctx: ProbeContext,
) -> ProbeResult {
    let method = probe.method().to_string();
    let ctx = ProbeContext {
        timeout: probe.timeout(ctx.timeout),
        ..ctx
    };
    let scope = ProbeScope::new(env);

    let outcome = tokio::time::timeout(
        ctx.timeout + RUNNER_GRACE,
        AssertUnwindSafe(probe.check(&scope, &ctx)).catch_unwind(),
    )
    .await;

    scope.cleanup().await;

    let result = match outcome {
        Ok(Ok(Ok(result))) => result,
        Ok(Ok(Err(e))) => {
            tracing::warn!("Probe {} failed: {}", method, e);
            ProbeResult::new(&method, probe.fails_closed())
                .with_details(json!({ "error": e.to_string() }))
        }
        Ok(Err(_)) => {
            tracing::warn!("Probe {} panicked", method);
            ProbeResult::new(&method, probe.fails_closed())
                .with_details(json!({ "error": "probe panicked" }))
        }
        Err(_) => {
            tracing::warn!("Probe {} timed out after {:?}", method, ctx.timeout);
            ProbeResult::new(&method, probe.fails_closed()).with_details(json!({
                "timeout": true,
                "timeoutMs": u64::try_from(ctx.timeout.as_millis()).unwrap_or(u64::MAX),
            }))
        }
    };

    if ctx.logging {
        tracing::debug!(
            method = %result.method,
            detected = result.detected,
            details = %result.details,
            "probe finished"
        );
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProbeError;
    use crate::simulated::{NoBlocker, SimulatedEnvironment};

    struct Scripted {
        fails_closed: bool,
        behavior: Behavior,
    }

    enum Behavior {
        Insert,
        Error,
        Stall,
        Panic,
    }

    #[async_trait]
    impl Probe for Scripted {
        fn method(&self) -> &str {
            "scripted"
        }

        fn fails_closed(&self) -> bool {
            self.fails_closed
        }

        async fn check(&self, scope: &ProbeScope, _ctx: &ProbeContext) -> Result<ProbeResult> {
            scope.insert(&BaitElement::new("div", "scripted-bait")).await?;
            match self.behavior {
                Behavior::Insert => Ok(ProbeResult::new("scripted", true)),
                Behavior::Error => Err(ProbeError::Dom("boom".to_string())),
                Behavior::Stall => {
                    std::future::pending::<()>().await;
                    unreachable!()
                }
                Behavior::Panic => panic!("probe bug"),
            }
        }
    }

    async fn run(behavior: Behavior, fails_closed: bool) -> (ProbeResult, Arc<SimulatedEnvironment>) {
        let env = Arc::new(SimulatedEnvironment::new(NoBlocker));
        let probe = Arc::new(Scripted {
            fails_closed,
            behavior,
        });
        let ctx = ProbeContext {
            timeout: Duration::from_millis(100),
            logging: true,
        };
        let result = run_probe(probe, env.clone(), ctx).await;
        (result, env)
    }

    #[tokio::test]
    async fn test_success_cleans_up() {
        let (result, env) = run(Behavior::Insert, false).await;
        assert!(result.detected);
        assert_eq!(env.element_count(), 0);
    }

    #[tokio::test]
    async fn test_error_fails_open_and_cleans_up() {
        let (result, env) = run(Behavior::Error, false).await;
        assert!(!result.detected);
        assert_eq!(result.details["error"], "DOM operation failed: boom");
        assert_eq!(env.element_count(), 0);
    }

    #[tokio::test]
    async fn test_error_fails_closed() {
        let (result, _) = run(Behavior::Error, true).await;
        assert!(result.detected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stall_times_out_and_cleans_up() {
        let started = tokio::time::Instant::now();
        let (result, env) = run(Behavior::Stall, true).await;
        assert!(result.detected);
        assert_eq!(result.details["timeout"], true);
        assert!(started.elapsed() < Duration::from_millis(100) + RUNNER_GRACE + CLEANUP_TIMEOUT);
        assert_eq!(env.element_count(), 0);
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let (result, env) = run(Behavior::Panic, false).await;
        assert!(!result.detected);
        assert_eq!(result.details["error"], "probe panicked");
        assert_eq!(env.element_count(), 0);
    }
}
