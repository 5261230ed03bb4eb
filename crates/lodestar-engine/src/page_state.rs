//! Screenshot-based page state validation.

use crate::ai::{AiError, SuggestionAdapter};
use crate::driver::{Driver, DriverError};
use lodestar_common::VisualVerdict;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

pub const SCREENSHOT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum PageStateError {
    #[error("Failed to capture screenshot: {0}")]
    Screenshot(#[from] DriverError),

    #[error("Screenshot analysis failed: {0}")]
    Ai(#[from] AiError),

    #[error("Page state validation failed: {}", .verdict.issues.join(", "))]
    Mismatch {
        expected: String,
        verdict: VisualVerdict,
    },
}

impl PageStateError {
    pub fn verdict(&self) -> Option<&VisualVerdict> {
        match self {
            PageStateError::Mismatch { verdict, .. } => Some(verdict),
            PageStateError::Screenshot(_) | PageStateError::Ai(_) => None,
        }
    }
}

/// Screenshot the page and check it against `expected`.
///
/// A verdict that does not match is an error carrying the listed issues.
pub async fn validate_page_state<D: Driver + ?Sized>(
    driver: &mut D,
    adapter: &SuggestionAdapter,
    expected: &str,
) -> Result<VisualVerdict, PageStateError> {
    info!("Validating page state: {}", expected);

    let screenshot = tokio::time::timeout(SCREENSHOT_TIMEOUT, driver.screenshot())
        .await
        .map_err(|_| DriverError::Timeout {
            operation: "screenshot".to_string(),
        })??;
    let verdict = adapter.analyze_screenshot(&screenshot, expected).await?;

    if !verdict.matches {
        warn!("Page does not match '{}': {:?}", expected, verdict.issues);
        return Err(PageStateError::Mismatch {
            expected: expected.to_string(),
            verdict,
        });
    }
    info!("Page state validated successfully");
    Ok(verdict)
}
