//! Browser backend for adwatch.
//!
//! Drives a Chromium page over CDP and exposes it as the three seams the
//! engine needs: a [`ProbeEnvironment`](adwatch_probe::ProbeEnvironment) for
//! the probes, [`PageStorage`] for the memo and cooldown keys, and a
//! [`PageSurface`] for enforcement.

pub mod engine;
pub mod environment;
pub mod error;
pub mod fingerprint;
pub mod script;
pub mod storage;
pub mod surface;

pub use engine::BrowserEngine;
pub use environment::ChromiumEnvironment;
pub use error::{BrowserError, Result};
pub use fingerprint::FingerprintConfig;
pub use storage::{PageStorage, StorageArea};
pub use surface::PageSurface;
