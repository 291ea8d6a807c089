//! Probe aggregation.
//!
//! Runs the requested probes concurrently with all-settle semantics and
//! reduces their results with the any-positive rule: a single positive probe
//! is a positive verdict. There is no quorum or weighting; a false positive is
//! preferred over ads being silently blocked.

use crate::environment::ProbeEnvironment;
use crate::probe::{run_probe, ProbeContext};
use crate::registry::ProbeRegistry;
use adwatch_core::{DetectionConfig, ProbeResult, VerdictDetail};
use futures::future::{join_all, BoxFuture, FutureExt};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Options for one detection run.
#[derive(Debug, Clone, Copy)]
pub struct DetectionOptions {
    /// Configured per-probe timeout
    pub per_probe_timeout: Duration,
    /// Emit per-probe diagnostics
    pub logging: bool,
}

impl Default for DetectionOptions {
    fn default() -> Self {
        Self::from(&DetectionConfig::default())
    }
}

impl From<&DetectionConfig> for DetectionOptions {
    fn from(config: &DetectionConfig) -> Self {
        Self {
            per_probe_timeout: config.per_probe_timeout(),
            logging: config.enable_logging,
        }
    }
}

/// Outcome of one detection run.
#[derive(Debug, Clone, Serialize)]
pub struct Detection {
    /// Verdict
    pub detected: bool,
    /// One result per requested method, in request order
    pub results: Vec<ProbeResult>,
    /// Aggregate counters
    pub details: VerdictDetail,
}

impl Detection {
    /// Reduce a batch of probe results.
    #[must_use]
    pub fn from_results(results: Vec<ProbeResult>) -> Self {
        let details = VerdictDetail::from_results(&results);
        Self {
            detected: details.detected,
            results,
            details,
        }
    }

    /// Negative verdict for a run that could not happen.
    #[must_use]
    pub fn failed_open(error: impl Into<String>) -> Self {
        Self {
            detected: false,
            results: Vec::new(),
            details: VerdictDetail::failed_open(error),
        }
    }
}

/// Runs probe batches against one environment.
#[derive(Clone)]
pub struct Aggregator {
    registry: Arc<ProbeRegistry>,
    env: Arc<dyn ProbeEnvironment>,
}

impl Aggregator {
    /// Create an aggregator.
    #[must_use]
    pub fn new(registry: Arc<ProbeRegistry>, env: Arc<dyn ProbeEnvironment>) -> Self {
        Self { registry, env }
    }

    /// Registry used to resolve method names.
    #[must_use]
    pub fn registry(&self) -> &ProbeRegistry {
        &self.registry
    }

    /// Run `methods` concurrently and reduce them to a verdict.
    ///
    /// Never fails: unknown methods contribute a non-detection, failing probes
    /// resolve through the probe contract, and an unavailable environment
    /// yields a negative verdict carrying the error.
    pub async fn run_detection(&self, methods: &[String], options: &DetectionOptions) -> Detection {
        if let Err(e) = self.env.is_available().await {
            tracing::warn!("Probe environment unavailable, assuming no ad blocker: {}", e);
            return Detection::failed_open(e.to_string());
        }

        let ctx = ProbeContext {
            timeout: options.per_probe_timeout,
            logging: options.logging,
        };

        let runs: Vec<BoxFuture<'static, ProbeResult>> = methods
            .iter()
            .map(|method| match self.registry.get(method) {
                Some(probe) => run_probe(probe, self.env.clone(), ctx).boxed(),
                None => {
                    tracing::warn!("Unknown probe method '{}' in configuration", method);
                    let result = ProbeResult::new(method.as_str(), false)
                        .with_details(json!({ "error": "unknown probe method" }));
                    futures::future::ready(result).boxed()
                }
            })
            .collect();

        let detection = Detection::from_results(join_all(runs).await);

        tracing::info!(
            detected = detection.detected,
            positives = detection.details.detection_count,
            total = detection.details.total_probes,
            successful = detection.details.successful_probes,
            "detection run finished"
        );
        if options.logging {
            for result in &detection.results {
                tracing::debug!(method = %result.method, detected = result.detected, details = %result.details, "probe result");
            }
        }

        detection
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulated::{NoBlocker, RulePolicy, SimulatedEnvironment};

    fn aggregator(env: SimulatedEnvironment) -> Aggregator {
        Aggregator::new(Arc::new(ProbeRegistry::standard()), Arc::new(env))
    }

    fn methods(names: &[&str]) -> Vec<String> {
        names.iter().map(ToString::to_string).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_results_follow_request_order() {
        let agg = aggregator(SimulatedEnvironment::new(NoBlocker));
        let requested = methods(&["container-mutation", "bait-element", "script-load"]);
        let detection = agg.run_detection(&requested, &DetectionOptions::default()).await;

        let order: Vec<_> = detection.results.iter().map(|r| r.method.clone()).collect();
        assert_eq!(order, requested);
        assert!(!detection.detected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_method_is_non_detection() {
        let agg = aggregator(SimulatedEnvironment::new(NoBlocker));
        let detection = agg
            .run_detection(&methods(&["bait-element", "popunder"]), &DetectionOptions::default())
            .await;

        assert_eq!(detection.results.len(), 2);
        assert!(!detection.detected);
        assert_eq!(detection.results[1].details["error"], "unknown probe method");
        assert_eq!(detection.details.successful_probes, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unavailable_environment_fails_open() {
        let agg = aggregator(SimulatedEnvironment::new(RulePolicy::new().hide_class("adsbox")).unavailable());
        let detection = agg
            .run_detection(&methods(&["bait-element"]), &DetectionOptions::default())
            .await;

        assert!(!detection.detected);
        assert!(detection.results.is_empty());
        assert!(detection.details.error.is_some());
    }

    #[tokio::test]
    async fn test_empty_batch_is_negative() {
        let agg = aggregator(SimulatedEnvironment::new(NoBlocker));
        let detection = agg.run_detection(&[], &DetectionOptions::default()).await;
        assert!(!detection.detected);
        assert_eq!(detection.details.total_probes, 0);
    }
}
