//! adwatch Core - Foundation crate for the adwatch ad-blocker detection engine.
//!
//! This crate provides the shared data model, error handling, configuration
//! management and storage abstractions that all other adwatch crates depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths
//! - [`types`] - Probe results, verdicts, detection state and policy enums
//! - [`storage`] - Key/value storage trait, storage keys, memory and file stores
//! - [`clock`] - Wall-clock abstraction used for cooldown accounting
//!
//! # Example
//!
//! ```rust
//! use adwatch_core::{AppConfig, ProbeMethod};
//!
//! let config = AppConfig::default();
//! assert!(config.detection.enabled);
//! assert!(config.detection.methods.contains(&ProbeMethod::BaitElement.to_string()));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod clock;
pub mod config;
pub mod error;
pub mod storage;
pub mod types;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AppConfig, BrowserSettings, DetectionConfig};
pub use error::{AdwatchError, ConfigError, ConfigResult, Result, StorageError};
pub use storage::{
    session_memo_key, FileStore, KeyValueStore, MemoryStore, LAST_DETECTION_KEY, MEMO_SENTINEL,
    USER_CHOICE_KEY,
};
pub use types::{
    DetectionState, EnforcementPolicy, ProbeMethod, ProbeResult, UserChoice, VerdictDetail,
};
