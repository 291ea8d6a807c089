//! Bait element judged by its layout box.

use super::{settle, OFFSCREEN_BAIT_STYLE};
use crate::environment::BaitElement;
use crate::error::Result;
use crate::probe::{Probe, ProbeContext, ProbeScope};
use adwatch_core::{ProbeMethod, ProbeResult};
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

const SETTLE: Duration = Duration::from_millis(100);

/// Inserts an element with generic ad classes and reports a detection when
/// its rendered box collapses to zero.
#[derive(Debug, Default, Clone, Copy)]
pub struct BaitElementProbe;

#[async_trait]
impl Probe for BaitElementProbe {
    fn method(&self) -> &str {
        ProbeMethod::BaitElement.as_str()
    }

    async fn check(&self, scope: &ProbeScope, _ctx: &ProbeContext) -> Result<ProbeResult> {
        let id = ProbeScope::unique_id("adwatch-bait");
        let bait = BaitElement::new("div", &id)
            .classes(["adsbox", "ads", "ad-placement"])
            .style(OFFSCREEN_BAIT_STYLE)
            .text("\u{a0}");
        scope.insert(&bait).await?;
        settle(SETTLE).await;

        let metrics = scope.measure(&id).await?;
        let (detected, details) = match metrics {
            None => (true, json!({ "present": false })),
            Some(m) => (
                m.is_collapsed(),
                json!({
                    "present": true,
                    "width": m.box_width,
                    "height": m.box_height,
                }),
            ),
        };

        Ok(ProbeResult::new(self.method(), detected).with_details(details))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::run_probe;
    use crate::simulated::{NoBlocker, RulePolicy, SimulatedEnvironment};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_clean_page_not_detected() {
        let env = Arc::new(SimulatedEnvironment::new(NoBlocker));
        let result = run_probe(Arc::new(BaitElementProbe), env.clone(), ProbeContext::default()).await;
        assert!(!result.detected);
        assert_eq!(result.details["height"], 1.0);
        assert_eq!(env.element_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hidden_bait_detected() {
        let env = Arc::new(SimulatedEnvironment::new(RulePolicy::new().hide_class("adsbox")));
        let result = run_probe(Arc::new(BaitElementProbe), env.clone(), ProbeContext::default()).await;
        assert!(result.detected);
        assert_eq!(env.element_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_removed_bait_detected() {
        let env = Arc::new(SimulatedEnvironment::new(RulePolicy::new().strip_class("ads")));
        let result = run_probe(Arc::new(BaitElementProbe), env, ProbeContext::default()).await;
        assert!(result.detected);
        assert_eq!(result.details["present"], false);
    }
}
