//! [`EnforcementSurface`] that acts on a live page.

use crate::script;
use adwatch_core::UserChoice;
use adwatch_session::EnforcementSurface;
use async_trait::async_trait;
use chromiumoxide::Page;

/// Shows the modal, redirects and locks a Chromium page.
#[derive(Clone)]
pub struct PageSurface {
    page: Page,
    container_id: String,
}

impl PageSurface {
    /// Surface whose modal uses the element id `container_id`.
    pub fn new(page: Page, container_id: impl Into<String>) -> Self {
        Self {
            page,
            container_id: container_id.into(),
        }
    }

    /// Answer the visitor gave in the modal since the last call, if any.
    pub async fn take_choice(&self) -> crate::Result<Option<UserChoice>> {
        let raw: Option<String> = script::evaluate(&self.page, script::take_choice()).await?;
        Ok(raw.as_deref().and_then(UserChoice::parse))
    }
}

#[async_trait]
impl EnforcementSurface for PageSurface {
    async fn show_modal(&self) -> adwatch_session::Result<()> {
        let _: bool = script::evaluate(&self.page, script::show_modal(&self.container_id)).await?;
        Ok(())
    }

    async fn hide_modal(&self) -> adwatch_session::Result<()> {
        let _: bool = script::evaluate(&self.page, script::hide_modal(&self.container_id)).await?;
        Ok(())
    }

    async fn navigate(&self, url: &str) -> adwatch_session::Result<()> {
        tracing::info!(url, "redirecting page");
        let _: bool = script::evaluate(&self.page, script::navigate(url)).await?;
        Ok(())
    }

    async fn engage_lock(&self, container_id: &str) -> adwatch_session::Result<()> {
        let _: bool = script::evaluate(&self.page, script::engage_lock(container_id)).await?;
        Ok(())
    }

    async fn release_lock(&self) -> adwatch_session::Result<()> {
        let _: bool = script::evaluate(&self.page, script::release_lock()).await?;
        Ok(())
    }
}
