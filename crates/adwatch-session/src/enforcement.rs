//! Enforcement of a positive verdict.
//!
//! One [`EnforcementPolicy`] is authoritative per deployment. The [`Enforcer`]
//! turns published [`DetectionState`]s into [`EnforcementAction`]s and drives
//! an [`EnforcementSurface`] (a browser page, or a recorder in tests).

use crate::controller::{CheckOutcome, DetectionController};
use crate::error::Result;
use crate::store::DetectionStore;
use adwatch_core::config::path_is_under;
use adwatch_core::{
    DetectionConfig, DetectionState, EnforcementPolicy, KeyValueStore, UserChoice,
    USER_CHOICE_KEY,
};
use adwatch_probe::Detection;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Page-side effects the enforcer can request.
#[async_trait]
pub trait EnforcementSurface: Send + Sync {
    /// Show the ad-blocker modal.
    async fn show_modal(&self) -> Result<()>;

    /// Hide the modal.
    async fn hide_modal(&self) -> Result<()>;

    /// Navigate the page to a same-origin URL.
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Hide everything except `container_id`, block dev-tool shortcuts and
    /// the context menu, silence the console.
    async fn engage_lock(&self, container_id: &str) -> Result<()>;

    /// Undo everything [`engage_lock`](Self::engage_lock) did.
    async fn release_lock(&self) -> Result<()>;
}

/// A single change to the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnforcementAction {
    /// Show the modal
    ShowModal,
    /// Hide the modal
    HideModal,
    /// Go to the interstitial, carrying the return path
    Redirect(String),
    /// Engage the hard lock, leaving the container visible
    EngageLock {
        /// Element id left visible
        container_id: String,
    },
    /// Release the hard lock
    ReleaseLock,
}

/// Result of a re-check run from the interstitial page.
#[derive(Debug, Clone)]
pub struct InterstitialOutcome {
    /// Same-origin path the visitor came from
    pub return_path: String,
    /// Verdict of the re-check
    pub detection: Detection,
    /// Whether the surface was sent back to `return_path`
    pub returned: bool,
}

/// What is currently in effect on the surface.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Applied {
    modal: bool,
    locked: bool,
    redirected_from: Option<String>,
}

/// Reacts to detection state according to the configured policy.
pub struct Enforcer {
    policy: EnforcementPolicy,
    interstitial_path: String,
    container_id: String,
    surface: Arc<dyn EnforcementSurface>,
    durable: Arc<dyn KeyValueStore>,
    applied: Mutex<Applied>,
    choice: Mutex<Option<UserChoice>>,
    shutdown: CancellationToken,
}

impl Enforcer {
    /// Enforcer for the policy and routes in `config`.
    ///
    /// `durable` remembers the soft-modal choice across reloads.
    #[must_use]
    pub fn new(
        config: &DetectionConfig,
        surface: Arc<dyn EnforcementSurface>,
        durable: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self {
            policy: config.policy,
            interstitial_path: config.interstitial_path.clone(),
            container_id: config.modal_container_id.clone(),
            surface,
            durable,
            applied: Mutex::new(Applied::default()),
            choice: Mutex::new(None),
            shutdown: CancellationToken::new(),
        }
    }

    /// Active policy.
    #[must_use]
    pub fn policy(&self) -> EnforcementPolicy {
        self.policy
    }

    /// Remembered soft-modal choice, if any.
    #[must_use]
    pub fn choice(&self) -> Option<UserChoice> {
        self.choice.lock().ok().and_then(|c| *c)
    }

    /// Load the remembered choice from durable storage.
    pub async fn restore_choice(&self) {
        let stored = match self.durable.get(USER_CHOICE_KEY).await {
            Ok(value) => value.as_deref().and_then(UserChoice::parse),
            Err(e) => {
                tracing::warn!("Could not read stored modal choice: {}", e);
                None
            }
        };
        if let Ok(mut choice) = self.choice.lock() {
            *choice = stored;
        }
    }

    /// Actions needed to bring the surface in line with `state`.
    ///
    /// Does not touch the surface; calling it again before
    /// [`apply`](Self::apply) returns the same list, and after it an empty one.
    #[must_use]
    pub fn decide(&self, state: &DetectionState) -> Vec<EnforcementAction> {
        let applied = self.applied.lock().map(|a| a.clone()).unwrap_or_default();
        let mut actions = Vec::new();

        match self.policy {
            EnforcementPolicy::Soft => {
                let want = state.is_blocked && self.choice() != Some(UserChoice::Continued);
                if want && !applied.modal {
                    actions.push(EnforcementAction::ShowModal);
                } else if !want && applied.modal {
                    actions.push(EnforcementAction::HideModal);
                }
            }
            EnforcementPolicy::Redirect => {
                let on_interstitial = path_is_under(&state.current_path, &self.interstitial_path);
                if state.is_blocked
                    && state.has_checked
                    && !on_interstitial
                    && applied.redirected_from.as_deref() != Some(state.current_path.as_str())
                {
                    actions.push(EnforcementAction::Redirect(interstitial_url(
                        &self.interstitial_path,
                        &state.current_path,
                    )));
                }
            }
            EnforcementPolicy::HardLock => {
                if state.is_blocked && !applied.locked {
                    actions.push(EnforcementAction::EngageLock {
                        container_id: self.container_id.clone(),
                    });
                    if !applied.modal {
                        actions.push(EnforcementAction::ShowModal);
                    }
                } else if !state.is_blocked && applied.locked {
                    actions.push(EnforcementAction::ReleaseLock);
                    if applied.modal {
                        actions.push(EnforcementAction::HideModal);
                    }
                }
            }
        }

        actions
    }

    /// Decide and perform the actions for `state`.
    ///
    /// Stops at the first surface error; actions performed before it stay
    /// recorded so they are not repeated.
    pub async fn apply(&self, state: &DetectionState) -> Result<Vec<EnforcementAction>> {
        if !state.is_blocked {
            self.record(|a| a.redirected_from = None);
        }

        let actions = self.decide(state);
        for action in &actions {
            self.perform(action).await?;
            if let EnforcementAction::Redirect(_) = action {
                let from = state.current_path.clone();
                self.record(|a| a.redirected_from = Some(from));
            }
        }
        if !actions.is_empty() {
            tracing::info!(policy = ?self.policy, ?actions, "enforcement applied");
        }
        Ok(actions)
    }

    /// Record the visitor's answer to the soft modal.
    ///
    /// `Disabled` hides the modal and runs a fresh check through `controller`;
    /// `Continued` hides the modal and keeps it hidden.
    pub async fn choose(
        &self,
        choice: UserChoice,
        controller: &DetectionController,
    ) -> Result<Option<CheckOutcome>> {
        if let Err(e) = self.durable.set(USER_CHOICE_KEY, choice.as_str()).await {
            tracing::warn!("Could not persist modal choice: {}", e);
        }
        if let Ok(mut current) = self.choice.lock() {
            *current = Some(choice);
        }
        tracing::debug!(choice = choice.as_str(), "modal choice recorded");

        if self.applied.lock().map(|a| a.modal).unwrap_or(false) {
            self.perform(&EnforcementAction::HideModal).await?;
        }

        match choice {
            UserChoice::Disabled => {
                let outcome = controller.retry().await;
                self.apply(&controller.state()).await?;
                Ok(Some(outcome))
            }
            UserChoice::Continued => Ok(None),
        }
    }

    /// Run the interstitial page: re-check on behalf of the `return` path in
    /// `query` and navigate back there once the page is clear.
    ///
    /// A blocked re-check leaves the visitor on the interstitial.
    pub async fn resolve_interstitial(
        &self,
        query: &str,
        controller: &DetectionController,
    ) -> Result<InterstitialOutcome> {
        let return_path = return_target(query);
        let detection = controller.recheck_for_return(&return_path).await;
        self.apply(&controller.state()).await?;

        let returned = !detection.detected;
        if returned {
            self.surface.navigate(&return_path).await?;
            tracing::info!(return_path = %return_path, "page clear, returning from interstitial");
        } else {
            tracing::debug!(return_path = %return_path, "still blocked, staying on interstitial");
        }

        Ok(InterstitialOutcome {
            return_path,
            detection,
            returned,
        })
    }

    /// Apply every state `store` publishes until [`shutdown`](Self::shutdown).
    pub fn watch(self: &Arc<Self>, store: &DetectionStore) -> JoinHandle<()> {
        let mut rx = store.subscribe();
        let enforcer = Arc::clone(self);
        let token = self.shutdown.clone();

        tokio::spawn(async move {
            enforcer.restore_choice().await;
            loop {
                let state = rx.borrow_and_update().clone();
                if let Err(e) = enforcer.apply(&state).await {
                    tracing::warn!("Enforcement failed: {}", e);
                }
                tokio::select! {
                    () = token.cancelled() => break,
                    changed = rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
            tracing::debug!("enforcement watcher stopped");
        })
    }

    /// Stop watching and undo the lock and modal.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown.cancel();
        let applied = self.applied.lock().map(|a| a.clone()).unwrap_or_default();
        if applied.locked {
            self.perform(&EnforcementAction::ReleaseLock).await?;
        }
        if applied.modal {
            self.perform(&EnforcementAction::HideModal).await?;
        }
        Ok(())
    }

    async fn perform(&self, action: &EnforcementAction) -> Result<()> {
        match action {
            EnforcementAction::ShowModal => {
                self.surface.show_modal().await?;
                self.record(|a| a.modal = true);
            }
            EnforcementAction::HideModal => {
                self.surface.hide_modal().await?;
                self.record(|a| a.modal = false);
            }
            EnforcementAction::Redirect(url) => {
                self.surface.navigate(url).await?;
            }
            EnforcementAction::EngageLock { container_id } => {
                self.surface.engage_lock(container_id).await?;
                self.record(|a| a.locked = true);
            }
            EnforcementAction::ReleaseLock => {
                self.surface.release_lock().await?;
                self.record(|a| a.locked = false);
            }
        }
        Ok(())
    }

    fn record(&self, change: impl FnOnce(&mut Applied)) {
        if let Ok(mut applied) = self.applied.lock() {
            change(&mut applied);
        }
    }
}

/// Interstitial URL that returns to `return_to` once the page is clear.
#[must_use]
pub fn interstitial_url(interstitial_path: &str, return_to: &str) -> String {
    format!(
        "{interstitial_path}?return={}",
        urlencoding::encode(return_to)
    )
}

/// Path to send the visitor back to, read from the interstitial's query.
///
/// Only same-origin paths are honored; anything else yields `/`.
#[must_use]
pub fn return_target(query: &str) -> String {
    query
        .trim_start_matches('?')
        .split('&')
        .find_map(|pair| pair.strip_prefix("return="))
        .and_then(|raw| urlencoding::decode(raw).ok())
        .map(|decoded| decoded.into_owned())
        .filter(|path| {
            path.starts_with('/') && !path.starts_with("//") && !path.starts_with("/\\")
        })
        .unwrap_or_else(|| "/".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interstitial_url_encodes_return() {
        assert_eq!(
            interstitial_url("/adblock-detected", "/posts/42?ref=home"),
            "/adblock-detected?return=%2Fposts%2F42%3Fref%3Dhome"
        );
    }

    #[test]
    fn test_return_target_round_trip() {
        let url = interstitial_url("/adblock-detected", "/posts/42?ref=home");
        let query = url.split_once('?').map(|(_, q)| q).unwrap();
        assert_eq!(return_target(query), "/posts/42?ref=home");
    }

    #[test]
    fn test_return_target_rejects_other_origins() {
        assert_eq!(return_target("return=https%3A%2F%2Fevil.example%2F"), "/");
        assert_eq!(return_target("return=%2F%2Fevil.example"), "/");
        assert_eq!(return_target("return=%2F%5Cevil.example"), "/");
        assert_eq!(return_target("other=1"), "/");
        assert_eq!(return_target(""), "/");
    }

    #[test]
    fn test_action_serialization() {
        let show = serde_json::to_value(EnforcementAction::ShowModal).unwrap();
        assert_eq!(show, "show-modal");

        let redirect =
            serde_json::to_value(EnforcementAction::Redirect("/adblock-detected".into())).unwrap();
        assert_eq!(redirect["redirect"], "/adblock-detected");
    }

    #[test]
    fn test_return_target_among_other_params() {
        assert_eq!(return_target("?utm=x&return=%2Fpricing"), "/pricing");
    }
}
