//! The probe environment: the narrow slice of a browser page that probes need.
//!
//! A probe inserts bait elements, waits, measures them, and removes them, or
//! tries to load a script. Everything a probe observes goes through
//! [`ProbeEnvironment`], so probes can run against a real page or against
//! [`SimulatedEnvironment`](crate::simulated::SimulatedEnvironment).

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Access to a live (or simulated) document.
#[async_trait]
pub trait ProbeEnvironment: Send + Sync {
    /// Check that the document can be probed at all.
    ///
    /// # Errors
    /// Returns error if the page is closed, detached, or not yet loaded.
    async fn is_available(&self) -> Result<()>;

    /// Append `element` (and its children) to the document body.
    async fn insert(&self, element: &BaitElement) -> Result<()>;

    /// Measure the element with DOM id `id`.
    ///
    /// Returns `None` when the element is no longer in the document.
    async fn measure(&self, id: &str) -> Result<Option<ElementMetrics>>;

    /// Remove the element with DOM id `id`. Removing a missing element is a no-op.
    async fn remove(&self, id: &str) -> Result<()>;

    /// Load a script by URL through a `<script>` element with DOM id `id`.
    ///
    /// May never resolve when a blocker silently drops the request; callers
    /// race it against a timer. The element is removed once the load settles;
    /// a load that never settles leaves it in place until [`remove`] is called.
    ///
    /// [`remove`]: ProbeEnvironment::remove
    async fn load_script(&self, id: &str, url: &str) -> Result<ScriptLoad>;

    /// Ask the ad network to fill the ad slot with DOM id `id`.
    async fn request_ad_fill(&self, id: &str) -> Result<()>;
}

/// Outcome of a script load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptLoad {
    /// The `load` event fired
    Loaded,
    /// The `error` event fired
    Failed,
}

/// An element tree to insert into the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaitElement {
    /// Tag name, e.g. `div` or `ins`
    pub tag: String,
    /// DOM id; every bait element has one so it can be measured and removed
    pub id: String,
    /// Class names
    pub classes: Vec<String>,
    /// Extra attributes
    pub attributes: Vec<(String, String)>,
    /// Inline style
    pub style: String,
    /// Text content
    pub text: String,
    /// Nested elements
    pub children: Vec<BaitElement>,
}

impl BaitElement {
    /// Create an empty element.
    #[must_use]
    pub fn new(tag: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            id: id.into(),
            classes: Vec::new(),
            attributes: Vec::new(),
            style: String::new(),
            text: String::new(),
            children: Vec::new(),
        }
    }

    /// Add a class.
    #[must_use]
    pub fn class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    /// Add several classes.
    #[must_use]
    pub fn classes<I, S>(mut self, classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.classes.extend(classes.into_iter().map(Into::into));
        self
    }

    /// Add an attribute.
    #[must_use]
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    /// Set the inline style.
    #[must_use]
    pub fn style(mut self, style: impl Into<String>) -> Self {
        self.style = style.into();
        self
    }

    /// Set the text content.
    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Append a child element.
    #[must_use]
    pub fn child(mut self, child: BaitElement) -> Self {
        self.children.push(child);
        self
    }

    /// This element and all descendants, depth first.
    #[must_use]
    pub fn descendants(&self) -> Vec<&BaitElement> {
        let mut out = vec![self];
        for child in &self.children {
            out.extend(child.descendants());
        }
        out
    }

    /// Read a `width`/`height` pixel value from the inline style.
    #[must_use]
    pub fn style_px(&self, property: &str) -> Option<f64> {
        self.style.split(';').find_map(|decl| {
            let (name, value) = decl.split_once(':')?;
            if name.trim() != property {
                return None;
            }
            value.trim().strip_suffix("px")?.trim().parse().ok()
        })
    }
}

/// Rendering facts about an element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementMetrics {
    /// Layout box width (`offsetWidth`)
    pub box_width: f64,
    /// Layout box height (`offsetHeight`)
    pub box_height: f64,
    /// Computed `display`
    pub display: String,
    /// Computed `visibility`
    pub visibility: String,
    /// Computed `height` in pixels
    pub computed_height: f64,
    /// Number of element children
    pub child_count: usize,
    /// Whether the element has any inner markup or text
    pub has_content: bool,
}

impl ElementMetrics {
    /// Metrics of a plainly visible element of the given size.
    #[must_use]
    pub fn visible(width: f64, height: f64) -> Self {
        Self {
            box_width: width,
            box_height: height,
            display: "block".to_string(),
            visibility: "visible".to_string(),
            computed_height: height,
            child_count: 0,
            has_content: false,
        }
    }

    /// Metrics of an element hidden by a `display: none` rule.
    #[must_use]
    pub fn hidden() -> Self {
        Self {
            box_width: 0.0,
            box_height: 0.0,
            display: "none".to_string(),
            visibility: "visible".to_string(),
            computed_height: 0.0,
            child_count: 0,
            has_content: false,
        }
    }

    /// The layout box has zero area.
    #[must_use]
    pub fn is_collapsed(&self) -> bool {
        self.box_width <= 0.0 || self.box_height <= 0.0
    }

    /// Computed style hides the element.
    #[must_use]
    pub fn is_style_hidden(&self) -> bool {
        self.display == "none" || self.visibility == "hidden" || self.computed_height <= 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_and_descendants() {
        let bait = BaitElement::new("div", "outer")
            .classes(["ad-container", "ads"])
            .child(BaitElement::new("div", "inner").text("Advertisement"));

        assert_eq!(bait.classes, vec!["ad-container", "ads"]);
        let ids: Vec<_> = bait.descendants().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["outer", "inner"]);
    }

    #[test]
    fn test_style_px() {
        let bait = BaitElement::new("div", "b").style("position:absolute; width: 1px; height:250px");
        assert_eq!(bait.style_px("width"), Some(1.0));
        assert_eq!(bait.style_px("height"), Some(250.0));
        assert_eq!(bait.style_px("top"), None);
    }

    #[test]
    fn test_metrics_predicates() {
        assert!(!ElementMetrics::visible(1.0, 1.0).is_collapsed());
        assert!(ElementMetrics::visible(300.0, 0.0).is_collapsed());
        assert!(ElementMetrics::hidden().is_style_hidden());

        let mut invisible = ElementMetrics::visible(1.0, 1.0);
        invisible.visibility = "hidden".to_string();
        assert!(invisible.is_style_hidden());
        assert!(!invisible.is_collapsed());
    }
}
