//! Element queries evaluated inside the page.

use chromiumoxide::Page;
use lodestar_common::{DriverError, ElementHandle, Locator, LocatorKind};
use serde::Deserialize;
use std::time::Duration;

const QUERY_JS: &str = include_str!("query.js");

/// Upper bound for one in-page evaluation. A blocking dialog would otherwise hang the call.
const EVAL_TIMEOUT: Duration = Duration::from_secs(10);

/// Check if an error indicates the page context is unavailable (e.g., during navigation).
pub(crate) fn is_context_error(err: &str) -> bool {
    err.contains("Cannot find context")
        || err.contains("Execution context was destroyed")
        || err.contains("-32000")
}

/// Result of one in-page query: visible matches only.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct QueryResult {
    pub count: usize,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    /// Set when the page rejected the query (bad CSS or XPath syntax).
    #[serde(default)]
    pub invalid: Option<String>,
}

impl QueryResult {
    pub fn into_handle(self, locator: &Locator) -> Option<ElementHandle> {
        (self.count > 0).then(|| ElementHandle {
            locator: locator.clone(),
            match_count: self.count,
            tag: self.tag,
            text: self.text,
        })
    }
}

/// Name the injected script uses for a locator kind.
pub fn kind_name(kind: LocatorKind) -> &'static str {
    match kind {
        LocatorKind::Css => "css",
        LocatorKind::Xpath => "xpath",
        LocatorKind::Text => "text",
        LocatorKind::Role => "role",
        LocatorKind::Placeholder => "placeholder",
        LocatorKind::Label => "label",
        LocatorKind::TestId => "test_id",
    }
}

/// Expression that installs the query helper if needed and runs one query.
pub fn query_expression(locator: &Locator) -> Result<String, DriverError> {
    let kind = serde_json::to_string(kind_name(locator.kind()))?;
    let value = serde_json::to_string(locator.value())?;
    Ok(format!(
        "(() => {{ {}\nreturn window.__lodestar.query({}, {}); }})()",
        QUERY_JS, kind, value
    ))
}

/// Run one query. Context errors (page mid-navigation) surface as `DriverError::NotReady`.
pub async fn query_once(page: &Page, locator: &Locator) -> Result<QueryResult, DriverError> {
    let expression = query_expression(locator)?;
    let result: QueryResult = match tokio::time::timeout(EVAL_TIMEOUT, page.evaluate(expression.as_str()))
        .await
    {
        Err(_) => {
            return Err(DriverError::Timeout {
                operation: format!("query {}", locator),
            });
        }
        Ok(Err(e)) => {
            let err_str = e.to_string();
            if is_context_error(&err_str) {
                return Err(DriverError::NotReady);
            }
            return Err(DriverError::Script(err_str));
        }
        Ok(Ok(remote)) => remote
            .into_value()
            .map_err(|e| DriverError::Serialization(format!("Failed to get result: {}", e)))?,
    };

    if let Some(reason) = &result.invalid {
        return Err(DriverError::InvalidLocator {
            locator: format!("{} ({})", locator, reason),
        });
    }
    Ok(result)
}
