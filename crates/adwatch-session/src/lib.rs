//! adwatch Session - when to probe, and what to do with the verdict.
//!
//! The [`DetectionController`] decides whether a navigation triggers a probe
//! run (disabled, excluded, memoized, cooling down) and writes the outcome to
//! the [`DetectionStore`]. The [`Enforcer`] watches the store and drives an
//! [`EnforcementSurface`] according to the configured policy.
//!
//! # Example
//!
//! ```rust,no_run
//! use adwatch_core::{DetectionConfig, MemoryStore};
//! use adwatch_probe::{Aggregator, NoBlocker, ProbeRegistry, SimulatedEnvironment};
//! use adwatch_session::DetectionController;
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let env = Arc::new(SimulatedEnvironment::new(NoBlocker));
//! let aggregator = Aggregator::new(Arc::new(ProbeRegistry::standard()), env);
//! let controller = Arc::new(DetectionController::new(
//!     DetectionConfig::default(),
//!     aggregator,
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(MemoryStore::new()),
//! ));
//!
//! controller.navigate("/articles/1").await.ok();
//! assert!(controller.store().snapshot().has_checked);
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod controller;
pub mod debounce;
pub mod enforcement;
pub mod error;
pub mod store;

pub use controller::{CheckOutcome, DetectionController};
pub use debounce::Debouncer;
pub use enforcement::{
    interstitial_url, return_target, EnforcementAction, EnforcementSurface, Enforcer,
    InterstitialOutcome,
};
pub use error::{Result, SessionError};
pub use store::DetectionStore;
