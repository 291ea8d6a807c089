//! Observable detection state.

use adwatch_core::DetectionState;
use tokio::sync::watch;

/// Shared [`DetectionState`] that publishes every mutation.
///
/// Any number of surfaces may subscribe; only the controller in this crate
/// can write.
#[derive(Debug)]
pub struct DetectionStore {
    tx: watch::Sender<DetectionState>,
}

impl DetectionStore {
    /// Store starting at the empty path.
    #[must_use]
    pub fn new() -> Self {
        Self::with_state(DetectionState::default())
    }

    /// Store starting from `state`.
    #[must_use]
    pub fn with_state(state: DetectionState) -> Self {
        let (tx, _rx) = watch::channel(state);
        Self { tx }
    }

    /// Receiver that observes every published state.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<DetectionState> {
        self.tx.subscribe()
    }

    /// Copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> DetectionState {
        self.tx.borrow().clone()
    }

    /// Mutate the state and notify subscribers.
    pub(crate) fn update(&self, mutate: impl FnOnce(&mut DetectionState)) {
        self.tx.send_modify(mutate);
    }
}

impl Default for DetectionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_see_updates() {
        let store = DetectionStore::new();
        let mut rx = store.subscribe();

        store.update(|s| {
            s.current_path = "/a".to_string();
            s.is_detecting = true;
        });

        rx.changed().await.unwrap();
        let seen = rx.borrow_and_update().clone();
        assert_eq!(seen.current_path, "/a");
        assert!(seen.is_detecting);
        assert_eq!(store.snapshot(), seen);
    }

    #[test]
    fn test_update_without_subscribers() {
        let store = DetectionStore::new();
        store.update(|s| s.is_blocked = true);
        assert!(store.snapshot().is_blocked);
    }
}
