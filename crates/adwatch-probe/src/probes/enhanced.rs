//! Several bait variants at once, reported as a ratio.

use super::{settle, OFFSCREEN_BAIT_STYLE};
use crate::environment::BaitElement;
use crate::error::Result;
use crate::probe::{Probe, ProbeContext, ProbeScope};
use adwatch_core::{ProbeMethod, ProbeResult};
use async_trait::async_trait;
use futures::future::join_all;
use rand::Rng;
use serde_json::json;
use std::time::Duration;

const SETTLE: Duration = Duration::from_millis(100);
const STAGGER: Duration = Duration::from_millis(10);
const MAX_JITTER_MS: u64 = 5;

/// Class/id combinations mimicking common ad units.
const VARIANTS: &[(&[&str], &str)] = &[
    (&["adsbygoogle"], "adwatch-gads"),
    (&["ad-slot", "ad-unit"], "ad-slot"),
    (&["advertisement"], "adwatch-advert"),
    (&["banner_ad", "banner-ad"], "banner_ad"),
    (&["sponsored-content", "sponsor"], "adwatch-sponsored"),
    (&["ad-leaderboard", "leaderboard-ad"], "div-gpt-ad"),
];

/// Runs every variant in [`VARIANTS`] in parallel, staggered by a few
/// milliseconds each, and counts how many were blocked.
///
/// Any blocked variant is a detection; `confidence` is blocked/total.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnhancedProbe;

impl EnhancedProbe {
    async fn run_variant(
        scope: &ProbeScope,
        classes: &[&str],
        id_prefix: &str,
        delay: Duration,
    ) -> Result<bool> {
        tokio::time::sleep(delay).await;
        let id = ProbeScope::unique_id(id_prefix);
        let bait = BaitElement::new("div", &id)
            .classes(classes.iter().copied())
            .style(OFFSCREEN_BAIT_STYLE)
            .text("\u{a0}");
        scope.insert(&bait).await?;
        settle(SETTLE).await;

        Ok(match scope.measure(&id).await? {
            None => true,
            Some(m) => m.is_collapsed() || m.is_style_hidden(),
        })
    }
}

#[async_trait]
impl Probe for EnhancedProbe {
    fn method(&self) -> &str {
        ProbeMethod::Enhanced.as_str()
    }

    async fn check(&self, scope: &ProbeScope, _ctx: &ProbeContext) -> Result<ProbeResult> {
        let delays: Vec<Duration> = {
            let mut rng = rand::thread_rng();
            (0..VARIANTS.len())
                .map(|i| {
                    let jitter = Duration::from_millis(rng.gen_range(0..=MAX_JITTER_MS));
                    STAGGER * u32::try_from(i).unwrap_or(u32::MAX) + jitter
                })
                .collect()
        };

        let outcomes = join_all(
            VARIANTS
                .iter()
                .zip(delays)
                .map(|((classes, id), delay)| Self::run_variant(scope, classes, id, delay)),
        )
        .await;

        let total = outcomes.len();
        let mut blocked = 0usize;
        let mut errors = 0usize;
        for outcome in outcomes {
            match outcome {
                Ok(true) => blocked += 1,
                Ok(false) => {}
                Err(e) => {
                    errors += 1;
                    tracing::debug!("Enhanced probe variant failed: {}", e);
                }
            }
        }

        #[allow(clippy::cast_precision_loss)]
        let confidence = if total == 0 {
            0.0
        } else {
            blocked as f64 / total as f64
        };

        Ok(ProbeResult::new(self.method(), blocked > 0).with_details(json!({
            "blocked": blocked,
            "total": total,
            "failedVariants": errors,
            "confidence": confidence,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::run_probe;
    use crate::simulated::{NoBlocker, RulePolicy, SimulatedEnvironment};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_nothing_blocked() {
        let env = Arc::new(SimulatedEnvironment::new(NoBlocker));
        let result = run_probe(Arc::new(EnhancedProbe), env.clone(), ProbeContext::default()).await;
        assert!(!result.detected);
        assert_eq!(result.details["blocked"], 0);
        assert_eq!(result.details["total"], VARIANTS.len());
        assert_eq!(env.insert_count(), VARIANTS.len());
        assert_eq!(env.element_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_blocking_reports_confidence() {
        let policy = RulePolicy::new()
            .hide_class("adsbygoogle")
            .hide_id("div-gpt-ad")
            .strip_class("advertisement");
        let env = Arc::new(SimulatedEnvironment::new(policy));
        let result = run_probe(Arc::new(EnhancedProbe), env.clone(), ProbeContext::default()).await;

        assert!(result.detected);
        assert_eq!(result.details["blocked"], 3);
        assert_eq!(result.details["confidence"], 0.5);
        assert_eq!(env.element_count(), 0);
    }
}
