//! [`ProbeEnvironment`] backed by a live Chromium page.

use crate::script;
use adwatch_probe::{BaitElement, ElementMetrics, ProbeEnvironment, ProbeError, ScriptLoad};
use async_trait::async_trait;
use chromiumoxide::Page;

/// Runs probes inside a loaded page.
#[derive(Clone)]
pub struct ChromiumEnvironment {
    page: Page,
}

impl ChromiumEnvironment {
    /// Probe `page`.
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    /// Page the probes run in.
    pub fn page(&self) -> &Page {
        &self.page
    }
}

#[async_trait]
impl ProbeEnvironment for ChromiumEnvironment {
    async fn is_available(&self) -> adwatch_probe::Result<()> {
        let ready: bool = script::evaluate(&self.page, script::is_available()).await?;
        if ready {
            Ok(())
        } else {
            Err(ProbeError::Unavailable("document has no body yet".to_string()))
        }
    }

    async fn insert(&self, element: &BaitElement) -> adwatch_probe::Result<()> {
        let _: bool = script::evaluate(&self.page, script::insert(element)).await?;
        Ok(())
    }

    async fn measure(&self, id: &str) -> adwatch_probe::Result<Option<ElementMetrics>> {
        Ok(script::evaluate(&self.page, script::measure(id)).await?)
    }

    async fn remove(&self, id: &str) -> adwatch_probe::Result<()> {
        let _: bool = script::evaluate(&self.page, script::remove(id)).await?;
        Ok(())
    }

    async fn load_script(&self, id: &str, url: &str) -> adwatch_probe::Result<ScriptLoad> {
        script::evaluate(&self.page, script::load_script(id, url))
            .await
            .map_err(|e| ProbeError::Script {
                url: url.to_string(),
                reason: e.to_string(),
            })
    }

    async fn request_ad_fill(&self, id: &str) -> adwatch_probe::Result<()> {
        let found: bool = script::evaluate(&self.page, script::request_ad_fill(id)).await?;
        if found {
            Ok(())
        } else {
            Err(ProbeError::Dom(format!("ad slot {id} is not in the document")))
        }
    }
}
