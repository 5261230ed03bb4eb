use crate::cdp::CdpClient;
use crate::query::query_once;
use async_trait::async_trait;
use chromiumoxide::Page;
use chromiumoxide::page::ScreenshotParams;
use lodestar_common::{DriverError, Locator, NavigationResult, ProbeResult, WaitPolicy};
use lodestar_engine::driver::Driver;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Delay between visibility polls.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Quiet period without new resource loads that counts as network idle.
const NETWORK_IDLE_WINDOW: Duration = Duration::from_millis(500);

const RESOURCE_COUNT_JS: &str = "performance.getEntriesByType('resource').length";

/// [`Driver`] backed by a local Chromium over the DevTools protocol.
pub struct HeadlessDriver {
    client: Option<CdpClient>,
    visible: bool,
}

impl HeadlessDriver {
    pub fn new() -> Self {
        Self {
            client: None,
            visible: false,
        }
    }

    pub fn new_with_visibility(visible: bool) -> Self {
        Self {
            client: None,
            visible,
        }
    }

    fn page(&self) -> Result<&Page, DriverError> {
        self.client
            .as_ref()
            .map(|c| &c.page)
            .ok_or(DriverError::NotReady)
    }

    async fn navigation_result(page: &Page) -> Result<NavigationResult, DriverError> {
        let title = page
            .get_title()
            .await
            .unwrap_or_default()
            .unwrap_or_default();
        let url = page
            .url()
            .await
            .map_err(|e| DriverError::Navigation(e.to_string()))?
            .unwrap_or_default();
        Ok(NavigationResult {
            url,
            title,
            status: 200,
        })
    }

    async fn wait_for_network_idle(page: &Page) -> Result<(), DriverError> {
        let mut last: i64 = -1;
        loop {
            let count: i64 = page
                .evaluate(RESOURCE_COUNT_JS)
                .await
                .map_err(|e| DriverError::Script(e.to_string()))?
                .into_value()
                .map_err(|e| DriverError::Serialization(e.to_string()))?;
            if count == last {
                return Ok(());
            }
            last = count;
            tokio::time::sleep(NETWORK_IDLE_WINDOW).await;
        }
    }
}

impl Default for HeadlessDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Driver for HeadlessDriver {
    async fn launch(&mut self) -> Result<(), DriverError> {
        info!("Launching headless driver (Chromium)...");
        self.client = Some(CdpClient::launch(self.visible).await?);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        if let Some(client) = self.client.take() {
            client.close().await?;
        }
        Ok(())
    }

    async fn navigate(
        &mut self,
        url: &str,
        wait: WaitPolicy,
        timeout: Duration,
    ) -> Result<NavigationResult, DriverError> {
        let page = self.page()?;
        info!("Navigating to: {} (wait: {:?})", url, wait);

        let navigation = async {
            // goto resolves on the load event, which is never earlier than DOMContentLoaded.
            page.goto(url)
                .await
                .map_err(|e| DriverError::Navigation(e.to_string()))?;
            if wait == WaitPolicy::NetworkIdle {
                Self::wait_for_network_idle(page).await?;
            }
            Ok::<_, DriverError>(())
        };
        tokio::time::timeout(timeout, navigation)
            .await
            .map_err(|_| DriverError::Timeout {
                operation: format!("navigate to {}", url),
            })??;

        Self::navigation_result(page).await
    }

    async fn wait_for_visible(
        &mut self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<ProbeResult, DriverError> {
        let page = self.page()?;
        let deadline = Instant::now() + timeout;

        loop {
            match query_once(page, locator).await {
                Ok(result) => {
                    if let Some(handle) = result.into_handle(locator) {
                        return Ok(ProbeResult::Found(handle));
                    }
                }
                Err(DriverError::NotReady) => {
                    debug!("Page context unavailable while probing {}, retrying", locator);
                }
                Err(e) => return Err(e),
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(ProbeResult::NotFound);
            }
            tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    async fn markup(&mut self) -> Result<String, DriverError> {
        self.page()?
            .content()
            .await
            .map_err(|e| DriverError::Script(format!("Failed to read page content: {}", e)))
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>, DriverError> {
        self.page()?
            .screenshot(ScreenshotParams::builder().build())
            .await
            .map_err(|e| DriverError::Other(format!("Screenshot failed: {}", e)))
    }
}
