use async_trait::async_trait;
pub use lodestar_common::error::DriverError;
use lodestar_common::{Locator, NavigationResult, ProbeResult, WaitPolicy};
use std::time::Duration;

/// The narrow interface the resolver needs from a browser-automation driver.
///
/// A driver owns exactly one page. All calls take `&mut self`, so a resolver
/// holding the driver can never issue overlapping queries against the page.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Launch the driver (start browser, connect to remote, etc.)
    async fn launch(&mut self) -> Result<(), DriverError> {
        Ok(())
    }

    /// Close the driver and cleanup resources.
    async fn close(&mut self) -> Result<(), DriverError> {
        Ok(())
    }

    /// Navigate to a URL, waiting for `wait` to be satisfied within `timeout`.
    async fn navigate(
        &mut self,
        url: &str,
        wait: WaitPolicy,
        timeout: Duration,
    ) -> Result<NavigationResult, DriverError>;

    /// Wait up to `timeout` for `locator` to match a *visible* element.
    ///
    /// Returns `Ok(ProbeResult::NotFound)` when nothing visible matched in time.
    /// `Err` is reserved for driver failures (invalid query, lost connection).
    async fn wait_for_visible(
        &mut self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<ProbeResult, DriverError>;

    /// Current page markup.
    async fn markup(&mut self) -> Result<String, DriverError>;

    /// Capture a PNG screenshot of the current viewport.
    async fn screenshot(&mut self) -> Result<Vec<u8>, DriverError> {
        Err(DriverError::NotSupported("screenshot".into()))
    }
}
