//! Load of a known ad-network script.

use super::{millis, AD_SCRIPT_URL};
use crate::environment::ScriptLoad;
use crate::error::Result;
use crate::probe::{Probe, ProbeContext, ProbeScope};
use adwatch_core::{ProbeMethod, ProbeResult};
use async_trait::async_trait;
use serde_json::json;

/// Loads an ad-network script. A load error or a load that never settles
/// counts as blocked; many blockers drop the request without an error event.
///
/// This probe fails closed: an environment error is also a detection.
#[derive(Debug, Clone)]
pub struct ScriptLoadProbe {
    url: String,
}

impl ScriptLoadProbe {
    /// Probe a custom script URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl Default for ScriptLoadProbe {
    fn default() -> Self {
        Self::new(AD_SCRIPT_URL)
    }
}

#[async_trait]
impl Probe for ScriptLoadProbe {
    fn method(&self) -> &str {
        ProbeMethod::ScriptLoad.as_str()
    }

    fn fails_closed(&self) -> bool {
        true
    }

    async fn check(&self, scope: &ProbeScope, ctx: &ProbeContext) -> Result<ProbeResult> {
        let outcome = tokio::time::timeout(ctx.timeout, scope.load_script(&self.url)).await;

        let (detected, outcome) = match outcome {
            Ok(Ok(ScriptLoad::Loaded)) => (false, "loaded"),
            Ok(Ok(ScriptLoad::Failed)) => (true, "error"),
            Ok(Err(e)) => return Err(e),
            Err(_) => (true, "stalled"),
        };

        Ok(ProbeResult::new(self.method(), detected).with_details(json!({
            "url": self.url,
            "outcome": outcome,
            "waitedMs": millis(ctx.timeout),
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::run_probe;
    use crate::simulated::{NetworkBlockMode, NoBlocker, RulePolicy, SimulatedEnvironment};
    use std::sync::Arc;
    use std::time::Duration;

    fn blocking() -> RulePolicy {
        RulePolicy::new().block_host("googlesyndication.com")
    }

    #[tokio::test]
    async fn test_loaded_script_not_detected() {
        let env = Arc::new(SimulatedEnvironment::new(NoBlocker));
        let result = run_probe(Arc::new(ScriptLoadProbe::default()), env, ProbeContext::default()).await;
        assert!(!result.detected);
        assert_eq!(result.details["outcome"], "loaded");
    }

    #[tokio::test]
    async fn test_load_error_detected() {
        let env = Arc::new(SimulatedEnvironment::new(blocking()));
        let result = run_probe(Arc::new(ScriptLoadProbe::default()), env, ProbeContext::default()).await;
        assert!(result.detected);
        assert_eq!(result.details["outcome"], "error");
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_drop_detected_within_timeout() {
        let env = Arc::new(SimulatedEnvironment::new(blocking()).network_mode(NetworkBlockMode::Silent));
        let ctx = ProbeContext {
            timeout: Duration::from_millis(500),
            logging: false,
        };
        let started = tokio::time::Instant::now();
        let result = run_probe(Arc::new(ScriptLoadProbe::default()), env, ctx).await;

        assert!(result.detected);
        assert_eq!(result.details["outcome"], "stalled");
        assert!(result.is_successful());
        assert!(started.elapsed() < Duration::from_millis(600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_drop_leaves_no_script_behind() {
        let env = Arc::new(SimulatedEnvironment::new(blocking()).network_mode(NetworkBlockMode::Silent));
        let ctx = ProbeContext {
            timeout: Duration::from_millis(500),
            logging: false,
        };
        let result = run_probe(Arc::new(ScriptLoadProbe::default()), env.clone(), ctx).await;

        assert_eq!(result.details["outcome"], "stalled");
        assert_eq!(env.element_count(), 0);
    }
}
