use crate::error::{BrowserError, Result};
use crate::fingerprint::FingerprintConfig;
use adwatch_core::BrowserSettings;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Chromium instance used to load pages for detection
pub struct BrowserEngine {
    browser: Browser,
    handler: JoinHandle<()>,
    fingerprint: FingerprintConfig,
    navigation_timeout: Duration,
}

impl BrowserEngine {
    /// Launch Chromium with default settings
    pub async fn new() -> Result<Self> {
        Self::launch(&BrowserSettings::default()).await
    }

    /// Launch Chromium as described by `settings`
    pub async fn launch(settings: &BrowserSettings) -> Result<Self> {
        Self::with_fingerprint(settings, FingerprintConfig::from_settings(settings)).await
    }

    /// Launch Chromium with a specific fingerprint
    pub async fn with_fingerprint(
        settings: &BrowserSettings,
        fingerprint: FingerprintConfig,
    ) -> Result<Self> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .window_size(fingerprint.viewport_width, fingerprint.viewport_height)
            .arg(format!("--user-agent={}", fingerprint.user_agent));
        if !settings.headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(BrowserError::ChromiumError)?;

        let (browser, mut handler) = Browser::launch(config).await?;

        // Drive the CDP connection until the browser goes away
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("CDP handler error: {}", e);
                }
            }
        });

        tracing::info!(
            headless = settings.headless,
            width = fingerprint.viewport_width,
            height = fingerprint.viewport_height,
            "browser launched"
        );

        Ok(Self {
            browser,
            handler,
            fingerprint,
            navigation_timeout: Duration::from_secs(settings.navigation_timeout_secs),
        })
    }

    /// Fingerprint the browser was launched with
    pub fn fingerprint(&self) -> &FingerprintConfig {
        &self.fingerprint
    }

    /// Open `url` in a new tab and wait for it to load
    pub async fn open(&self, url: &str) -> Result<Page> {
        let parsed = url::Url::parse(url)
            .map_err(|e| BrowserError::NavigationError(format!("Invalid URL: {e}")))?;

        let page = self.browser.new_page("about:blank").await?;
        let load = async {
            page.goto(parsed.as_str()).await?;
            page.wait_for_navigation().await?;
            Ok::<_, BrowserError>(())
        };
        match tokio::time::timeout(self.navigation_timeout, load).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(BrowserError::Timeout(format!(
                    "loading {url} took longer than {:?}",
                    self.navigation_timeout
                )))
            }
        }

        tracing::debug!(url = %parsed, "page loaded");
        Ok(page)
    }

    /// Close the browser and stop the CDP handler
    pub async fn close(mut self) -> Result<()> {
        self.browser.close().await?;
        self.handler.abort();
        Ok(())
    }
}

/// Path plus query of `url`, the form detection state keys pages by
pub fn page_path(url: &str) -> Result<String> {
    let url = url::Url::parse(url)
        .map_err(|e| BrowserError::NavigationError(format!("Invalid URL: {e}")))?;

    Ok(match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_path() {
        assert_eq!(page_path("https://example.com").unwrap(), "/");
        assert_eq!(
            page_path("https://example.com/blog/post?id=3#top").unwrap(),
            "/blog/post?id=3"
        );
    }

    #[test]
    fn test_page_path_invalid() {
        assert!(page_path("not-a-url").is_err());
    }
}
