//! adwatch Probe - heuristic checks for ad-blocking behavior.
//!
//! This crate contains the probe library, the registry that maps configured
//! method names to probes, and the aggregator that runs a batch of probes
//! concurrently and reduces them to a verdict.
//!
//! Probes never touch the DOM directly. They talk to a [`ProbeEnvironment`],
//! which the browser crate implements on top of a real page and which
//! [`SimulatedEnvironment`] implements in memory for tests and dry runs.
//!
//! # Example
//!
//! ```rust,no_run
//! use adwatch_probe::{Aggregator, DetectionOptions, ProbeRegistry, RulePolicy, SimulatedEnvironment};
//! use std::sync::Arc;
//!
//! # async fn demo() {
//! let env = Arc::new(SimulatedEnvironment::new(RulePolicy::new().hide_class("adsbox")));
//! let aggregator = Aggregator::new(Arc::new(ProbeRegistry::standard()), env);
//! let detection = aggregator
//!     .run_detection(&["bait-element".to_string()], &DetectionOptions::default())
//!     .await;
//! assert!(detection.detected);
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod aggregator;
pub mod environment;
pub mod error;
pub mod filter_list;
pub mod probe;
pub mod probes;
pub mod registry;
pub mod simulated;

// Re-export commonly used types
pub use aggregator::{Aggregator, Detection, DetectionOptions};
pub use environment::{BaitElement, ElementMetrics, ProbeEnvironment, ScriptLoad};
pub use error::{ProbeError, Result};
pub use filter_list::FilterListPolicy;
pub use probe::{run_probe, Probe, ProbeContext, ProbeScope};
pub use registry::ProbeRegistry;
pub use simulated::{BlockingPolicy, NetworkBlockMode, NoBlocker, RulePolicy, SimulatedEnvironment};
