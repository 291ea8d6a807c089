//! Verdict rendering.

use adwatch_probe::Detection;
use adwatch_session::{CheckOutcome, EnforcementAction, InterstitialOutcome};
use serde::Serialize;

/// Everything a run produced, in a printable shape.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub target: String,
    pub path: String,
    pub outcome: &'static str,
    pub blocked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detection: Option<Detection>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<EnforcementAction>,
    /// Path the interstitial sent the page back to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub returned_to: Option<String>,
}

impl Report {
    pub fn new(target: impl Into<String>, path: impl Into<String>, outcome: &CheckOutcome, blocked: bool) -> Self {
        let detection = match outcome {
            CheckOutcome::Completed(d) | CheckOutcome::Superseded(d) => Some(d.clone()),
            _ => None,
        };
        Self {
            target: target.into(),
            path: path.into(),
            outcome: outcome.label(),
            blocked,
            detection,
            actions: Vec::new(),
            returned_to: None,
        }
    }

    /// Fold in a re-check run on the interstitial page.
    #[must_use]
    pub fn with_interstitial(mut self, resolved: InterstitialOutcome) -> Self {
        self.outcome = if resolved.returned {
            "interstitial-returned"
        } else {
            "interstitial-blocked"
        };
        self.blocked = resolved.detection.detected;
        self.detection = Some(resolved.detection);
        self.returned_to = resolved.returned.then_some(resolved.return_path);
        self
    }

    pub fn render_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let verdict = if self.blocked {
            "AD BLOCKING DETECTED"
        } else {
            "no ad blocking detected"
        };
        out.push_str(&format!("{}: {verdict} ({})\n", self.target, self.outcome));

        if let Some(detection) = &self.detection {
            let details = &detection.details;
            out.push_str(&format!(
                "  {}/{} probes positive, {} completed cleanly\n",
                details.detection_count, details.total_probes, details.successful_probes
            ));
            if let Some(error) = &details.error {
                out.push_str(&format!("  error: {error}\n"));
            }
            for result in &detection.results {
                let mark = if result.detected { "blocked" } else { "ok" };
                out.push_str(&format!("  {:<20} {mark:<8} {}\n", result.method, result.details));
            }
        }

        for action in &self.actions {
            out.push_str(&format!("  enforcement: {action:?}\n"));
        }
        if let Some(path) = &self.returned_to {
            out.push_str(&format!("  returned to {path}\n"));
        }
        out
    }
}
