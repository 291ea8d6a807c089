//! Name-to-probe lookup.

use crate::probe::Probe;
use crate::probes::{
    BaitClassProbe, BaitElementProbe, ContainerMutationProbe, EnhancedProbe, RealContentProbe,
    ScriptLoadProbe,
};
use adwatch_core::DetectionConfig;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Probes indexed by method name.
///
/// Built once at startup; configuration picks a subset by name.
#[derive(Clone, Default)]
pub struct ProbeRegistry {
    probes: HashMap<String, Arc<dyn Probe>>,
}

impl ProbeRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding all six built-in probes with default settings.
    #[must_use]
    pub fn standard() -> Self {
        Self::from_config(&DetectionConfig::default())
    }

    /// Registry holding all built-in probes, tuned by `config`.
    #[must_use]
    pub fn from_config(config: &DetectionConfig) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(BaitElementProbe));
        registry.register(Arc::new(BaitClassProbe));
        registry.register(Arc::new(ScriptLoadProbe::default()));
        registry.register(Arc::new(ContainerMutationProbe));
        registry.register(Arc::new(EnhancedProbe));
        registry.register(Arc::new(
            RealContentProbe::default().with_timeout(config.real_content_timeout()),
        ));
        registry
    }

    /// Add a probe, replacing any probe with the same method name.
    pub fn register(&mut self, probe: Arc<dyn Probe>) -> &mut Self {
        let method = probe.method().to_string();
        debug!(method = %method, "registering probe");
        self.probes.insert(method, probe);
        self
    }

    /// Look up a probe by method name.
    #[must_use]
    pub fn get(&self, method: &str) -> Option<Arc<dyn Probe>> {
        self.probes.get(method).cloned()
    }

    /// Registered method names, sorted.
    #[must_use]
    pub fn methods(&self) -> Vec<String> {
        let mut names: Vec<String> = self.probes.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered probes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.probes.len()
    }

    /// True when no probe is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adwatch_core::ProbeMethod;
    use std::time::Duration;

    #[test]
    fn test_standard_registry_has_every_method() {
        let registry = ProbeRegistry::standard();
        assert_eq!(registry.len(), ProbeMethod::all().len());
        for method in ProbeMethod::all() {
            assert!(registry.get(method.as_str()).is_some(), "missing {method}");
        }
        assert!(registry.get("popunder").is_none());
    }

    #[test]
    fn test_config_tunes_real_content_timeout() {
        let config = DetectionConfig {
            real_content_timeout_ms: 8000,
            ..DetectionConfig::default()
        };
        let registry = ProbeRegistry::from_config(&config);
        let probe = registry.get("real-content").unwrap();
        assert_eq!(probe.timeout(Duration::from_millis(100)), Duration::from_millis(8000));
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = ProbeRegistry::new();
        registry
            .register(Arc::new(BaitElementProbe))
            .register(Arc::new(BaitElementProbe));
        assert_eq!(registry.methods(), vec!["bait-element".to_string()]);
    }
}
