//! Shared types used across adwatch.
//!
//! Probe outcomes, aggregate verdicts, the observable detection state and the
//! small enums that configure enforcement.

use crate::error::AdwatchError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifiers of the built-in probes.
///
/// Configuration refers to probes by their kebab-case name, so unknown names
/// can still travel through config as plain strings and be reported at
/// aggregation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProbeMethod {
    /// Hidden element with a blocklisted class, judged by layout box
    BaitElement,
    /// Hidden element with a blocklisted class, judged by computed style
    BaitClass,
    /// Load of a known ad-network script
    ScriptLoad,
    /// Bait container with nested ad content, judged by nested survival
    ContainerMutation,
    /// Several bait variants in parallel, reported as a ratio
    Enhanced,
    /// Real ad-network bootstrap plus a real ad slot
    RealContent,
}

impl ProbeMethod {
    /// Kebab-case name used in configuration and results.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BaitElement => "bait-element",
            Self::BaitClass => "bait-class",
            Self::ScriptLoad => "script-load",
            Self::ContainerMutation => "container-mutation",
            Self::Enhanced => "enhanced",
            Self::RealContent => "real-content",
        }
    }

    /// Every built-in probe.
    #[must_use]
    pub fn all() -> &'static [ProbeMethod] {
        &[
            Self::BaitElement,
            Self::BaitClass,
            Self::ScriptLoad,
            Self::ContainerMutation,
            Self::Enhanced,
            Self::RealContent,
        ]
    }

    /// Probes enabled when configuration does not list any.
    ///
    /// `real-content` depends on a live ad network and is opt-in.
    #[must_use]
    pub fn defaults() -> Vec<String> {
        Self::all()
            .iter()
            .filter(|m| **m != Self::RealContent)
            .map(ToString::to_string)
            .collect()
    }
}

impl fmt::Display for ProbeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProbeMethod {
    type Err = AdwatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .find(|m| m.as_str() == s)
            .copied()
            .ok_or_else(|| AdwatchError::Validation(format!("unknown probe method '{s}'")))
    }
}

/// Outcome of a single probe invocation.
///
/// Produced once per run and discarded after aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    /// Probe name (may be an unknown name echoed back)
    pub method: String,
    /// Whether the probe saw ad content being suppressed
    pub detected: bool,
    /// Probe-specific diagnostics; never used to alter the verdict
    pub details: serde_json::Value,
}

impl ProbeResult {
    /// Create a result with empty details.
    #[must_use]
    pub fn new(method: impl Into<String>, detected: bool) -> Self {
        Self {
            method: method.into(),
            detected,
            details: serde_json::Value::Object(serde_json::Map::new()),
        }
    }

    /// Attach diagnostic details.
    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    /// True when the probe finished through its own logic rather than via an
    /// error or timeout fallback.
    #[must_use]
    pub fn is_successful(&self) -> bool {
        self.details.get("error").is_none() && self.details.get("timeout").is_none()
    }
}

/// Aggregate of all probe results for one detection run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerdictDetail {
    /// Any probe positive
    pub detected: bool,
    /// Number of positive probes
    pub detection_count: usize,
    /// Number of probes requested
    pub total_probes: usize,
    /// Number of probes that completed through their own logic
    pub successful_probes: usize,
    /// Set when the whole run failed open
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl VerdictDetail {
    /// Reduce a batch of results with the any-positive rule.
    #[must_use]
    pub fn from_results(results: &[ProbeResult]) -> Self {
        let detection_count = results.iter().filter(|r| r.detected).count();
        Self {
            detected: detection_count > 0,
            detection_count,
            total_probes: results.len(),
            successful_probes: results.iter().filter(|r| r.is_successful()).count(),
            error: None,
        }
    }

    /// Verdict used when the run itself failed: no ad blocking assumed.
    #[must_use]
    pub fn failed_open(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

/// Shared detection state observed by UI surfaces.
///
/// Written only by the detection controller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionState {
    /// A detection run is in flight for `current_path`
    pub is_detecting: bool,
    /// `current_path` reached the checked state
    pub has_checked: bool,
    /// Last verdict says ad content is being blocked
    pub is_blocked: bool,
    /// Epoch milliseconds of the last completed run
    pub last_detection_timestamp_ms: Option<i64>,
    /// Path the state refers to
    pub current_path: String,
}

impl DetectionState {
    /// Fresh state for a path.
    #[must_use]
    pub fn for_path(path: impl Into<String>) -> Self {
        Self {
            current_path: path.into(),
            ..Self::default()
        }
    }
}

/// How a positive verdict is enforced.
///
/// One policy is authoritative per deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnforcementPolicy {
    /// Dismissible modal that remembers the visitor's choice
    Soft,
    /// Navigate to an interstitial page carrying a `return` parameter
    #[default]
    Redirect,
    /// Hide the page, suppress dev-tool shortcuts and neuter the console
    HardLock,
}

impl FromStr for EnforcementPolicy {
    type Err = AdwatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "soft" => Ok(Self::Soft),
            "redirect" => Ok(Self::Redirect),
            "hard-lock" => Ok(Self::HardLock),
            other => Err(AdwatchError::Validation(format!(
                "unknown enforcement policy '{other}'"
            ))),
        }
    }
}

/// Choice recorded by the soft-enforcement modal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserChoice {
    /// Visitor says the blocker was disabled
    Disabled,
    /// Visitor continues with the blocker on
    Continued,
}

impl UserChoice {
    /// Stored representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Continued => "continued",
        }
    }

    /// Parse the stored representation; unknown values are ignored.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "disabled" => Some(Self::Disabled),
            "continued" => Some(Self::Continued),
            _ => None,
        }
    }
}
