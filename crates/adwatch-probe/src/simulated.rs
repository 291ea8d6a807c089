//! In-memory probe environment.
//!
//! [`SimulatedEnvironment`] keeps a flat table of inserted elements and asks a
//! [`BlockingPolicy`] how a blocker would treat each one. It is what the unit
//! tests run against, and what `adwatch simulate` uses to check bait elements
//! against a filter list without a browser.

use crate::environment::{BaitElement, ElementMetrics, ProbeEnvironment, ScriptLoad};
use crate::error::{ProbeError, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Width and height a filled ad slot renders at.
const FILLED_SLOT: (f64, f64) = (300.0, 250.0);

/// How a blocker treats page content.
pub trait BlockingPolicy: Send + Sync {
    /// A cosmetic rule hides the element (`display: none`).
    fn hides(&self, element: &BaitElement) -> bool;

    /// The blocker removes the element's markup from the document.
    fn strips(&self, _element: &BaitElement) -> bool {
        false
    }

    /// A network rule blocks the request.
    fn blocks_request(&self, url: &str) -> bool;
}

/// Browser without any blocker.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoBlocker;

impl BlockingPolicy for NoBlocker {
    fn hides(&self, _element: &BaitElement) -> bool {
        false
    }

    fn blocks_request(&self, _url: &str) -> bool {
        false
    }
}

/// Blocker described by explicit class, id and host lists.
#[derive(Debug, Default, Clone)]
pub struct RulePolicy {
    hidden_classes: HashSet<String>,
    hidden_ids: HashSet<String>,
    stripped_classes: HashSet<String>,
    blocked_hosts: Vec<String>,
}

impl RulePolicy {
    /// Policy that blocks nothing until rules are added.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Hide elements carrying `class`.
    #[must_use]
    pub fn hide_class(mut self, class: impl Into<String>) -> Self {
        self.hidden_classes.insert(class.into());
        self
    }

    /// Hide elements whose id starts with `id_prefix`.
    #[must_use]
    pub fn hide_id(mut self, id_prefix: impl Into<String>) -> Self {
        self.hidden_ids.insert(id_prefix.into());
        self
    }

    /// Remove elements carrying `class` from the document.
    #[must_use]
    pub fn strip_class(mut self, class: impl Into<String>) -> Self {
        self.stripped_classes.insert(class.into());
        self
    }

    /// Block requests to `host` and its subdomains.
    #[must_use]
    pub fn block_host(mut self, host: impl Into<String>) -> Self {
        self.blocked_hosts.push(host.into());
        self
    }
}

impl BlockingPolicy for RulePolicy {
    fn hides(&self, element: &BaitElement) -> bool {
        element.classes.iter().any(|c| self.hidden_classes.contains(c))
            || self.hidden_ids.iter().any(|p| element.id.starts_with(p.as_str()))
    }

    fn strips(&self, element: &BaitElement) -> bool {
        element
            .classes
            .iter()
            .any(|c| self.stripped_classes.contains(c))
    }

    fn blocks_request(&self, url: &str) -> bool {
        let Some(host) = url::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
        else {
            return false;
        };
        self.blocked_hosts
            .iter()
            .any(|blocked| host == *blocked || host.ends_with(&format!(".{blocked}")))
    }
}

/// What a blocked request looks like to the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NetworkBlockMode {
    /// The request errors out
    #[default]
    Error,
    /// The request never settles
    Silent,
}

#[derive(Debug, Clone)]
struct Node {
    element: BaitElement,
    parent: Option<String>,
    hidden: bool,
    filled: bool,
}

/// Probe environment backed by an in-memory element table.
pub struct SimulatedEnvironment {
    policy: Arc<dyn BlockingPolicy>,
    nodes: Mutex<HashMap<String, Node>>,
    loaded_scripts: Mutex<Vec<String>>,
    network_mode: NetworkBlockMode,
    ad_inventory: bool,
    available: bool,
    inserts: AtomicUsize,
}

impl SimulatedEnvironment {
    /// Environment governed by `policy`.
    pub fn new(policy: impl BlockingPolicy + 'static) -> Self {
        Self::with_policy(Arc::new(policy))
    }

    /// Environment governed by a shared policy.
    #[must_use]
    pub fn with_policy(policy: Arc<dyn BlockingPolicy>) -> Self {
        Self {
            policy,
            nodes: Mutex::new(HashMap::new()),
            loaded_scripts: Mutex::new(Vec::new()),
            network_mode: NetworkBlockMode::default(),
            ad_inventory: true,
            available: true,
            inserts: AtomicUsize::new(0),
        }
    }

    /// Choose how blocked requests behave.
    #[must_use]
    pub fn network_mode(mut self, mode: NetworkBlockMode) -> Self {
        self.network_mode = mode;
        self
    }

    /// Whether the ad network has an ad to serve.
    #[must_use]
    pub fn ad_inventory(mut self, available: bool) -> Self {
        self.ad_inventory = available;
        self
    }

    /// Make [`ProbeEnvironment::is_available`] fail.
    #[must_use]
    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    /// Elements currently in the document.
    #[must_use]
    pub fn element_count(&self) -> usize {
        self.nodes.lock().map(|n| n.len()).unwrap_or(0)
    }

    /// Total `insert` calls so far, including stripped elements.
    #[must_use]
    pub fn insert_count(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    fn lock_nodes(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Node>>> {
        self.nodes
            .lock()
            .map_err(|_| ProbeError::Dom("element table poisoned".to_string()))
    }

    fn register(
        &self,
        nodes: &mut HashMap<String, Node>,
        element: &BaitElement,
        parent: Option<&str>,
        parent_hidden: bool,
    ) {
        if self.policy.strips(element) {
            return;
        }
        let hidden = parent_hidden || self.policy.hides(element);
        let mut shallow = element.clone();
        shallow.children.clear();
        nodes.insert(
            element.id.clone(),
            Node {
                element: shallow,
                parent: parent.map(str::to_string),
                hidden,
                filled: false,
            },
        );
        for child in &element.children {
            self.register(nodes, child, Some(&element.id), hidden);
        }
    }

    fn ad_script_loaded(&self) -> bool {
        self.loaded_scripts
            .lock()
            .map(|s| s.iter().any(|url| url.contains("adsbygoogle")))
            .unwrap_or(false)
    }
}

#[async_trait]
impl ProbeEnvironment for SimulatedEnvironment {
    async fn is_available(&self) -> Result<()> {
        if self.available {
            Ok(())
        } else {
            Err(ProbeError::Unavailable("simulated page closed".to_string()))
        }
    }

    async fn insert(&self, element: &BaitElement) -> Result<()> {
        if element.id.is_empty() {
            return Err(ProbeError::InvalidBait("element id is empty".to_string()));
        }
        self.inserts.fetch_add(1, Ordering::SeqCst);
        let mut nodes = self.lock_nodes()?;
        self.register(&mut nodes, element, None, false);
        Ok(())
    }

    async fn measure(&self, id: &str) -> Result<Option<ElementMetrics>> {
        let nodes = self.lock_nodes()?;
        let Some(node) = nodes.get(id) else {
            return Ok(None);
        };
        if node.hidden {
            return Ok(Some(ElementMetrics::hidden()));
        }

        let child_count = nodes
            .values()
            .filter(|n| n.parent.as_deref() == Some(id))
            .count();
        let has_content = node.filled || child_count > 0 || !node.element.text.is_empty();
        let (width, height) = if node.filled {
            FILLED_SLOT
        } else {
            let fallback = if has_content { 1.0 } else { 0.0 };
            (
                node.element.style_px("width").unwrap_or(fallback),
                node.element.style_px("height").unwrap_or(fallback),
            )
        };

        let mut metrics = ElementMetrics::visible(width, height);
        metrics.child_count = child_count;
        metrics.has_content = has_content;
        Ok(Some(metrics))
    }

    async fn remove(&self, id: &str) -> Result<()> {
        let mut nodes = self.lock_nodes()?;
        let mut doomed = vec![id.to_string()];
        while let Some(current) = doomed.pop() {
            nodes.remove(&current);
            doomed.extend(
                nodes
                    .iter()
                    .filter(|(_, n)| n.parent.as_deref() == Some(current.as_str()))
                    .map(|(k, _)| k.clone()),
            );
        }
        Ok(())
    }

    async fn load_script(&self, id: &str, url: &str) -> Result<ScriptLoad> {
        if id.is_empty() {
            return Err(ProbeError::InvalidBait("script id is empty".to_string()));
        }
        self.lock_nodes()?.insert(
            id.to_string(),
            Node {
                element: BaitElement::new("script", id).attr("src", url),
                parent: None,
                hidden: false,
                filled: false,
            },
        );

        let outcome = if self.policy.blocks_request(url) {
            match self.network_mode {
                NetworkBlockMode::Error => ScriptLoad::Failed,
                NetworkBlockMode::Silent => std::future::pending().await,
            }
        } else {
            if let Ok(mut loaded) = self.loaded_scripts.lock() {
                loaded.push(url.to_string());
            }
            ScriptLoad::Loaded
        };

        // A settled load takes its element out, as the page does.
        self.lock_nodes()?.remove(id);
        Ok(outcome)
    }

    async fn request_ad_fill(&self, id: &str) -> Result<()> {
        if !self.ad_script_loaded() || !self.ad_inventory {
            return Ok(());
        }
        let mut nodes = self.lock_nodes()?;
        if let Some(node) = nodes.get_mut(id) {
            node.filled = true;
        }
        Ok(())
    }
}
