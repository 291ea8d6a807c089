//! Configuration management for adwatch.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult, Result};
use crate::types::{EnforcementPolicy, ProbeMethod};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main application configuration.
///
/// This is loaded from `~/.config/adwatch/config.toml` (or platform equivalent).
/// If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Detection engine settings
    pub detection: DetectionConfig,
    /// Headless browser settings
    pub browser: BrowserSettings,
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from an explicit path, falling back to defaults if
    /// the file does not exist.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        let config: Self = if path.exists() {
            tracing::debug!("Loading config from {}", path.display());
            let contents = fs::read_to_string(path)?;
            toml::from_str(&contents)?
        } else {
            tracing::debug!("Config file not found, using defaults");
            Self::default()
        };
        config.detection.validate()?;
        Ok(config)
    }

    /// Configuration a front end should run with.
    ///
    /// Reads `path` when given, the platform config file otherwise, then
    /// applies environment overrides and validates the result:
    /// - `ADWATCH_ENABLED`: Override detection enabled status (true/false)
    /// - `ADWATCH_COOLDOWN_MS`: Override the inter-run cooldown
    /// - `ADWATCH_CHECK_DELAY_MS`: Override the post-navigation delay
    /// - `ADWATCH_POLICY`: Override the enforcement policy
    /// - `ADWATCH_HEADLESS`: Override browser headless mode (true/false)
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        Self::resolve_with(path, |key| std::env::var(key).ok())
    }

    /// [`resolve`](Self::resolve) with an explicit variable lookup.
    pub fn resolve_with<F>(path: Option<&Path>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match path {
            Some(path) => Self::load_from(path)?,
            None => Self::load()?,
        };
        config.apply_env(lookup);
        config.detection.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup.
    ///
    /// Unparseable values are ignored, matching how missing variables behave.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(enabled) = lookup("ADWATCH_ENABLED").and_then(|v| v.parse().ok()) {
            self.detection.enabled = enabled;
            tracing::debug!("Override detection.enabled from env: {}", enabled);
        }

        if let Some(ms) = lookup("ADWATCH_COOLDOWN_MS").and_then(|v| v.parse().ok()) {
            self.detection.cooldown_ms = ms;
            tracing::debug!("Override detection.cooldown_ms from env: {}", ms);
        }

        if let Some(ms) = lookup("ADWATCH_CHECK_DELAY_MS").and_then(|v| v.parse().ok()) {
            self.detection.check_delay_ms = ms;
            tracing::debug!("Override detection.check_delay_ms from env: {}", ms);
        }

        if let Some(policy) = lookup("ADWATCH_POLICY").and_then(|v| v.parse().ok()) {
            self.detection.policy = policy;
            tracing::debug!("Override detection.policy from env: {:?}", policy);
        }

        if let Some(headless) = lookup("ADWATCH_HEADLESS").and_then(|v| v.parse().ok()) {
            self.browser.headless = headless;
            tracing::debug!("Override browser.headless from env: {}", headless);
        }
    }

    /// Save configuration to disk.
    ///
    /// Creates the config directory if it doesn't exist.
    pub fn save(&self) -> ConfigResult<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to an explicit path.
    pub fn save_to(&self, config_path: &Path) -> ConfigResult<()> {
        let config_dir = config_path
            .parent()
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "config_path".to_string(),
                reason: "no parent directory".to_string(),
            })?;

        fs::create_dir_all(config_dir)?;
        tracing::debug!("Saving config to {}", config_path.display());

        let contents = toml::to_string_pretty(self)?;
        fs::write(config_path, contents)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/adwatch/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs = ProjectDirs::from("dev", "adwatch", "adwatch").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Get the data directory path.
    ///
    /// Uses XDG base directories: `~/.local/share/adwatch`
    pub fn data_dir() -> ConfigResult<PathBuf> {
        let dirs = ProjectDirs::from("dev", "adwatch", "adwatch").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.data_dir().to_path_buf())
    }
}

/// Detection engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Master switch; when false nothing is ever checked
    pub enabled: bool,
    /// Debounce delay between a navigation and its detection run
    pub check_delay_ms: u64,
    /// Minimum interval between two detection runs
    pub cooldown_ms: u64,
    /// Paths that are never probed (the interstitial must be listed here)
    pub exclude_paths: Vec<String>,
    /// Emit per-probe diagnostic logs
    pub enable_logging: bool,
    /// Probe names to run, see [`ProbeMethod`]
    pub methods: Vec<String>,
    /// Upper bound for each probe
    pub per_probe_timeout_ms: u64,
    /// Upper bound for the real-content probe, which waits on a live ad network
    pub real_content_timeout_ms: u64,
    /// How a positive verdict is enforced
    pub policy: EnforcementPolicy,
    /// Route of the redirect interstitial
    pub interstitial_path: String,
    /// Element id of the modal container left visible by the hard lock
    pub modal_container_id: String,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            check_delay_ms: 1000,
            cooldown_ms: 5000,
            exclude_paths: vec!["/adblock-detected".to_string()],
            enable_logging: false,
            methods: ProbeMethod::defaults(),
            per_probe_timeout_ms: 3000,
            real_content_timeout_ms: 5000,
            policy: EnforcementPolicy::default(),
            interstitial_path: "/adblock-detected".to_string(),
            modal_container_id: "adwatch-modal".to_string(),
        }
    }
}

impl DetectionConfig {
    /// Check values that would make the engine misbehave.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.per_probe_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "per_probe_timeout_ms".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if !self.interstitial_path.starts_with('/') {
            return Err(ConfigError::InvalidValue {
                field: "interstitial_path".to_string(),
                reason: format!("must start with '/', got '{}'", self.interstitial_path),
            });
        }
        Ok(())
    }

    /// Debounce delay as a [`Duration`].
    #[must_use]
    pub fn check_delay(&self) -> Duration {
        Duration::from_millis(self.check_delay_ms)
    }

    /// Per-probe timeout as a [`Duration`].
    #[must_use]
    pub fn per_probe_timeout(&self) -> Duration {
        Duration::from_millis(self.per_probe_timeout_ms)
    }

    /// Real-content probe timeout as a [`Duration`].
    #[must_use]
    pub fn real_content_timeout(&self) -> Duration {
        Duration::from_millis(self.real_content_timeout_ms)
    }

    /// Whether `path` is excluded from detection.
    ///
    /// Matches the exact path, or the path followed by `/` or a query string.
    #[must_use]
    pub fn is_excluded(&self, path: &str) -> bool {
        self.exclude_paths
            .iter()
            .any(|excluded| path_is_under(path, excluded))
    }
}

/// Whether `path` is `base` or lies beneath it.
///
/// `/a` covers `/a`, `/a/b` and `/a?x=1` but not `/ab`.
#[must_use]
pub fn path_is_under(path: &str, base: &str) -> bool {
    path == base
        || path
            .strip_prefix(base)
            .is_some_and(|rest| rest.starts_with('/') || rest.starts_with('?'))
}

/// Browser automation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    /// Run browser in headless mode
    pub headless: bool,
    /// Browser window width
    pub window_width: u32,
    /// Browser window height
    pub window_height: u32,
    /// Navigation timeout in seconds
    pub navigation_timeout_secs: u64,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: 1920,
            window_height: 1080,
            navigation_timeout_secs: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AdwatchError;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert!(config.detection.enabled);
        assert_eq!(config.detection.cooldown_ms, 5000);
        assert_eq!(config.detection.check_delay_ms, 1000);
        assert_eq!(config.detection.policy, EnforcementPolicy::Redirect);
        assert!(config.browser.headless);
        assert!(config.detection.validate().is_ok());
    }

    #[test]
    fn test_config_save_load() {
        let tmp = TempDir::new().expect("create temp dir");
        let config_path = tmp.path().join("nested").join("config.toml");

        let mut config = AppConfig::default();
        config.detection.cooldown_ms = 10_000;
        config.detection.policy = EnforcementPolicy::HardLock;
        config.save_to(&config_path).expect("save config");

        let loaded = AppConfig::load_from(&config_path).expect("load config");
        assert_eq!(loaded.detection.cooldown_ms, 10_000);
        assert_eq!(loaded.detection.policy, EnforcementPolicy::HardLock);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let tmp = TempDir::new().expect("create temp dir");
        let loaded = AppConfig::load_from(&tmp.path().join("absent.toml")).expect("load");
        assert_eq!(loaded.detection, DetectionConfig::default());
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[detection]
cooldown_ms = 0
methods = ["bait-element"]
policy = "soft"
"#;

        let config: AppConfig = toml::from_str(toml_str).expect("parse partial config");
        assert_eq!(config.detection.cooldown_ms, 0);
        assert_eq!(config.detection.methods, vec!["bait-element".to_string()]);
        assert_eq!(config.detection.policy, EnforcementPolicy::Soft);
        // These should be defaults
        assert_eq!(config.detection.per_probe_timeout_ms, 3000);
        assert!(config.browser.headless);
    }

    #[test]
    fn test_unknown_policy_rejected() {
        let toml_str = r#"
[detection]
policy = "nag-screen"
"#;
        assert!(toml::from_str::<AppConfig>(toml_str).is_err());
    }

    #[test]
    fn test_validation() {
        let mut config = DetectionConfig {
            per_probe_timeout_ms: 0,
            ..DetectionConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));

        config.per_probe_timeout_ms = 100;
        config.interstitial_path = "adblock".to_string();
        assert!(config.validate().is_err());

        config.methods.clear();
        config.interstitial_path = "/adblock".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("ADWATCH_ENABLED", "false"),
            ("ADWATCH_COOLDOWN_MS", "250"),
            ("ADWATCH_CHECK_DELAY_MS", "not-a-number"),
            ("ADWATCH_POLICY", "soft"),
            ("ADWATCH_HEADLESS", "false"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_env(|key| vars.get(key).map(ToString::to_string));

        assert!(!config.detection.enabled);
        assert_eq!(config.detection.cooldown_ms, 250);
        assert_eq!(config.detection.check_delay_ms, 1000);
        assert_eq!(config.detection.policy, EnforcementPolicy::Soft);
        assert!(!config.browser.headless);
    }

    #[test]
    fn test_resolve_applies_overrides_to_file() {
        let tmp = TempDir::new().expect("create temp dir");
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[detection]\ncooldown_ms = 9000\npolicy = \"soft\"\n").unwrap();

        let config = AppConfig::resolve_with(Some(&path), |key| {
            (key == "ADWATCH_POLICY").then(|| "hard-lock".to_string())
        })
        .expect("resolve");
        assert_eq!(config.detection.cooldown_ms, 9000);
        assert_eq!(config.detection.policy, EnforcementPolicy::HardLock);
    }

    #[test]
    fn test_resolve_reports_bad_file_as_config_error() {
        let tmp = TempDir::new().expect("create temp dir");
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[detection]\nper_probe_timeout_ms = 0\n").unwrap();

        let err = AppConfig::resolve_with(Some(&path), |_| None).unwrap_err();
        assert!(matches!(
            err,
            AdwatchError::Config(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_exclusion_matching() {
        let config = DetectionConfig {
            exclude_paths: vec!["/adblock-detected".to_string(), "/admin".to_string()],
            ..DetectionConfig::default()
        };
        assert!(config.is_excluded("/adblock-detected"));
        assert!(config.is_excluded("/adblock-detected?return=%2Fblog"));
        assert!(config.is_excluded("/admin/users"));
        assert!(!config.is_excluded("/administrator"));
        assert!(!config.is_excluded("/blog"));
    }
}
