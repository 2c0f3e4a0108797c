use crate::adapters::browser::{BrowserPage, ElementHandle};
use crate::utils::error::Result;
use std::time::Duration;

/// One candidate in a selector fallback chain. Candidate lists are kept in
/// order, oldest/most-specific markup first, so a carrier-side redesign
/// degrades to the next candidate instead of breaking the flow outright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    Css(&'static str),
    XPath(&'static str),
}

impl Locator {
    /// WebDriver location strategy name.
    pub fn using(&self) -> &'static str {
        match self {
            Locator::Css(_) => "css selector",
            Locator::XPath(_) => "xpath",
        }
    }

    pub fn value(&self) -> &'static str {
        match self {
            Locator::Css(v) => v,
            Locator::XPath(v) => v,
        }
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Locator::Css(v) => write!(f, "css:{}", v),
            Locator::XPath(v) => write!(f, "xpath:{}", v),
        }
    }
}

/// Evaluates a fallback chain once: each candidate gets one bounded lookup,
/// the first hit wins. A candidate that errors or times out just yields to
/// the next one.
pub async fn find_any<P: BrowserPage + ?Sized>(
    page: &P,
    candidates: &[Locator],
    per_candidate: Duration,
) -> Result<Option<ElementHandle>> {
    for locator in candidates {
        match tokio::time::timeout(per_candidate, page.find(locator)).await {
            Ok(Ok(Some(element))) => {
                tracing::trace!("Locator hit: {}", locator);
                return Ok(Some(element));
            }
            Ok(Ok(None)) => continue,
            Ok(Err(e)) => {
                tracing::debug!("Locator {} errored, trying next: {}", locator, e);
                continue;
            }
            Err(_) => {
                tracing::trace!("Locator {} timed out after {:?}", locator, per_candidate);
                continue;
            }
        }
    }
    Ok(None)
}

/// Bounded polling loop over a fallback chain, for stage transitions that
/// render asynchronously. Returns `None` once the total budget is spent.
pub async fn wait_for_any<P: BrowserPage + ?Sized>(
    page: &P,
    candidates: &[Locator],
    total: Duration,
    poll_interval: Duration,
) -> Result<Option<ElementHandle>> {
    let deadline = tokio::time::Instant::now() + total;
    loop {
        if let Some(element) = find_any(page, candidates, poll_interval).await? {
            return Ok(Some(element));
        }
        if tokio::time::Instant::now() + poll_interval > deadline {
            return Ok(None);
        }
        tokio::time::sleep(poll_interval).await;
    }
}
