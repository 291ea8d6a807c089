//! Real ad-network bootstrap plus a real ad slot.

use super::{millis, settle, AD_SCRIPT_URL};
use crate::environment::{BaitElement, ScriptLoad};
use crate::error::Result;
use crate::probe::{Probe, ProbeContext, ProbeScope};
use adwatch_core::{ProbeMethod, ProbeResult};
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

const SETTLE: Duration = Duration::from_millis(1000);

/// Default generous timeout; the probe waits on a live ad network.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Loads the ad-network bootstrap, inserts a real ad slot, requests a fill,
/// and judges the slot by its rendered size and content about a second later.
///
/// The most accurate and slowest probe. A script that fails or stalls is a
/// detection; an empty slot is a detection too, which makes this probe
/// sensitive to publishers without inventory.
#[derive(Debug, Clone)]
pub struct RealContentProbe {
    ad_client: String,
    ad_slot: String,
    timeout: Duration,
}

impl RealContentProbe {
    /// Probe with a publisher id and slot id.
    #[must_use]
    pub fn new(ad_client: impl Into<String>, ad_slot: impl Into<String>) -> Self {
        Self {
            ad_client: ad_client.into(),
            ad_slot: ad_slot.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Override the probe's own timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for RealContentProbe {
    fn default() -> Self {
        Self::new("ca-pub-0000000000000000", "0000000000")
    }
}

#[async_trait]
impl Probe for RealContentProbe {
    fn method(&self) -> &str {
        ProbeMethod::RealContent.as_str()
    }

    fn timeout(&self, configured: Duration) -> Duration {
        self.timeout.max(configured)
    }

    async fn check(&self, scope: &ProbeScope, ctx: &ProbeContext) -> Result<ProbeResult> {
        // Leave room for the settle window inside the probe's budget.
        let script_budget = ctx.timeout.saturating_sub(SETTLE + Duration::from_millis(500));
        let script = format!("{AD_SCRIPT_URL}?client={}", self.ad_client);

        match tokio::time::timeout(script_budget, scope.load_script(&script)).await {
            Ok(Ok(ScriptLoad::Loaded)) => {}
            Ok(Ok(ScriptLoad::Failed)) => {
                return Ok(ProbeResult::new(self.method(), true)
                    .with_details(json!({ "stage": "script", "outcome": "error" })));
            }
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                return Ok(ProbeResult::new(self.method(), true).with_details(json!({
                    "stage": "script",
                    "outcome": "stalled",
                    "waitedMs": millis(script_budget),
                })));
            }
        }

        let id = ProbeScope::unique_id("adwatch-slot");
        let slot = BaitElement::new("ins", &id)
            .class("adsbygoogle")
            .attr("data-ad-client", &self.ad_client)
            .attr("data-ad-slot", &self.ad_slot)
            .attr("data-ad-format", "auto")
            .style("display:block;");
        scope.insert(&slot).await?;
        scope.request_ad_fill(&id).await?;
        settle(SETTLE).await;

        let (detected, details) = match scope.measure(&id).await? {
            None => (true, json!({ "stage": "slot", "present": false })),
            Some(m) => (
                m.is_collapsed() || !m.has_content,
                json!({
                    "stage": "slot",
                    "present": true,
                    "width": m.box_width,
                    "height": m.box_height,
                    "hasContent": m.has_content,
                }),
            ),
        };

        Ok(ProbeResult::new(self.method(), detected).with_details(details))
    }
}
