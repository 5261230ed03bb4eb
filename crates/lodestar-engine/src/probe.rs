//! Locator Probe
//!
//! Tries one concrete locator against the live page. Every failure mode of the
//! driver (error, hang, timeout) collapses into `ProbeResult::NotFound` so that
//! callers only ever branch on the sum type.

use crate::driver::Driver;
use lodestar_common::{Locator, ProbeResult};
use std::time::Duration;
use tracing::{debug, warn};

/// Overall element-find timeout.
pub const DEFAULT_FIND_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Probe timeout used while self-healing. Heals fail fast to keep the retry budget small.
pub const HEALING_PROBE_TIMEOUT: Duration = Duration::from_millis(5_000);

/// Extra time granted to the driver on top of the probe timeout before the
/// call is abandoned as hung.
const DRIVER_GRACE: Duration = Duration::from_millis(1_000);

/// Probe a single locator, waiting up to `timeout` for a visible match.
pub async fn probe<D: Driver + ?Sized>(
    driver: &mut D,
    locator: &Locator,
    timeout: Duration,
) -> ProbeResult {
    match tokio::time::timeout(timeout + DRIVER_GRACE, driver.wait_for_visible(locator, timeout))
        .await
    {
        Ok(Ok(ProbeResult::Found(handle))) => {
            if handle.is_ambiguous() {
                warn!(
                    "Locator {} matched {} visible elements, using the first",
                    locator, handle.match_count
                );
            }
            ProbeResult::Found(handle)
        }
        Ok(Ok(ProbeResult::NotFound)) => {
            debug!("Locator {} not found within {:?}", locator, timeout);
            ProbeResult::NotFound
        }
        Ok(Err(e)) => {
            debug!("Probe of {} failed: {}", locator, e);
            ProbeResult::NotFound
        }
        Err(_) => {
            warn!("Driver hung probing {}, treating as not found", locator);
            ProbeResult::NotFound
        }
    }
}
