//! Bait element judged by computed style.

use super::{settle, OFFSCREEN_BAIT_STYLE};
use crate::environment::BaitElement;
use crate::error::Result;
use crate::probe::{Probe, ProbeContext, ProbeScope};
use adwatch_core::{ProbeMethod, ProbeResult};
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

const SETTLE: Duration = Duration::from_millis(50);

/// Classes lifted from common banner and text-ad markup.
const BAIT_CLASSES: &[&str] = &[
    "pub_300x250",
    "pub_300x250m",
    "pub_728x90",
    "text-ad",
    "textAd",
    "text_ad",
    "text_ads",
    "text-ads",
    "text-ad-links",
];

/// Inserts an element with banner-ad classes and reports a detection when
/// computed `display`, `visibility` or `height` hide it.
#[derive(Debug, Default, Clone, Copy)]
pub struct BaitClassProbe;

#[async_trait]
impl Probe for BaitClassProbe {
    fn method(&self) -> &str {
        ProbeMethod::BaitClass.as_str()
    }

    async fn check(&self, scope: &ProbeScope, _ctx: &ProbeContext) -> Result<ProbeResult> {
        let id = ProbeScope::unique_id("adwatch-class");
        let bait = BaitElement::new("div", &id)
            .classes(BAIT_CLASSES.iter().copied())
            .style(OFFSCREEN_BAIT_STYLE)
            .text("\u{a0}");
        scope.insert(&bait).await?;
        settle(SETTLE).await;

        let Some(metrics) = scope.measure(&id).await? else {
            return Ok(ProbeResult::new(self.method(), true).with_details(json!({ "present": false })));
        };

        Ok(ProbeResult::new(self.method(), metrics.is_style_hidden()).with_details(json!({
            "present": true,
            "display": metrics.display,
            "visibility": metrics.visibility,
            "height": metrics.computed_height,
        })))
    }
}
