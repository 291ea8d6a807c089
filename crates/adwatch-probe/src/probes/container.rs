//! Bait container with nested ad content.

use super::settle;
use crate::environment::BaitElement;
use crate::error::Result;
use crate::probe::{Probe, ProbeContext, ProbeScope};
use adwatch_core::{ProbeMethod, ProbeResult};
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

const SETTLE: Duration = Duration::from_millis(150);

/// Inserts an ad container holding nested ad content and checks that the
/// nested content survives with a non-zero box.
///
/// Details distinguish a blocker that strips markup (`"stripped"`) from one
/// that only hides it with CSS (`"hidden"`).
#[derive(Debug, Default, Clone, Copy)]
pub struct ContainerMutationProbe;

#[async_trait]
impl Probe for ContainerMutationProbe {
    fn method(&self) -> &str {
        ProbeMethod::ContainerMutation.as_str()
    }

    async fn check(&self, scope: &ProbeScope, _ctx: &ProbeContext) -> Result<ProbeResult> {
        let container_id = ProbeScope::unique_id("adwatch-container");
        let content_id = ProbeScope::unique_id("adwatch-content");

        let container = BaitElement::new("div", &container_id)
            .classes(["ad-container", "ad-wrapper"])
            .style("position:absolute;left:-10000px;top:-1000px;width:300px;height:250px;")
            .child(
                BaitElement::new("div", &content_id)
                    .classes(["ad-content", "advertisement"])
                    .attr("data-ad-slot", "adwatch")
                    .style("width:300px;height:250px;")
                    .text("Advertisement"),
            );
        scope.insert(&container).await?;
        settle(SETTLE).await;

        let container_metrics = scope.measure(&container_id).await?;
        let content_metrics = scope.measure(&content_id).await?;

        let mode = match (&container_metrics, &content_metrics) {
            (None, _) | (Some(_), None) => "stripped",
            (Some(_), Some(content)) if content.is_collapsed() => "hidden",
            (Some(_), Some(_)) => "intact",
        };

        Ok(ProbeResult::new(self.method(), mode != "intact").with_details(json!({
            "mode": mode,
            "containerPresent": container_metrics.is_some(),
            "contentPresent": content_metrics.is_some(),
            "contentHeight": content_metrics.map_or(0.0, |m| m.box_height),
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::run_probe;
    use crate::simulated::{NoBlocker, RulePolicy, SimulatedEnvironment};
    use std::sync::Arc;

    async fn mode_for(env: SimulatedEnvironment) -> (bool, String) {
        let env = Arc::new(env);
        let result = run_probe(Arc::new(ContainerMutationProbe), env.clone(), ProbeContext::default()).await;
        assert_eq!(env.element_count(), 0);
        (result.detected, result.details["mode"].as_str().unwrap_or_default().to_string())
    }

    #[tokio::test(start_paused = true)]
    async fn test_intact() {
        let (detected, mode) = mode_for(SimulatedEnvironment::new(NoBlocker)).await;
        assert!(!detected);
        assert_eq!(mode, "intact");
    }

    #[tokio::test(start_paused = true)]
    async fn test_css_hidden() {
        let policy = RulePolicy::new().hide_class("ad-wrapper");
        let (detected, mode) = mode_for(SimulatedEnvironment::new(policy)).await;
        assert!(detected);
        assert_eq!(mode, "hidden");
    }

    #[tokio::test(start_paused = true)]
    async fn test_markup_stripped() {
        let policy = RulePolicy::new().strip_class("advertisement");
        let (detected, mode) = mode_for(SimulatedEnvironment::new(policy)).await;
        assert!(detected);
        assert_eq!(mode, "stripped");
    }
}
