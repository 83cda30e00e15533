//! Page navigation
//!
//! Loads a URL with retries and waits for the load event before capture
//! starts.

use crate::error::{Error, NavigationError, Result};
use chromiumoxide::Page;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Resolves once the document has fired `load`
const LOAD_SCRIPT: &str = r#"
    new Promise(resolve => {
        if (document.readyState === 'complete') {
            resolve(true);
        } else {
            window.addEventListener('load', () => resolve(true));
        }
    })
"#;

/// Options for page navigation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationOptions {
    /// Per-attempt timeout in milliseconds (default: 30000)
    pub timeout_ms: u64,
    /// Extra attempts after the first (default: 2)
    pub retries: u32,
    /// Pause between attempts in ms (default: 1000)
    pub retry_delay_ms: u64,
}

impl Default for NavigationOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 30000,
            retries: 2,
            retry_delay_ms: 1000,
        }
    }
}

impl NavigationOptions {
    fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Check that `url` is something the browser can capture
pub fn validate_url(url: &str) -> std::result::Result<url::Url, NavigationError> {
    let parsed = url::Url::parse(url)
        .map_err(|e| NavigationError::InvalidUrl(format!("{}: {}", url, e)))?;
    match parsed.scheme() {
        "http" | "https" | "file" => Ok(parsed),
        scheme => Err(NavigationError::InvalidUrl(format!(
            "unsupported scheme '{}' in {}",
            scheme, url
        ))),
    }
}

/// Page navigator
pub struct PageNavigator;

impl PageNavigator {
    /// Load `url` in `page`, retrying failed attempts.
    ///
    /// Returns the URL the page ended up on after redirects.
    #[instrument(skip(page, options))]
    pub async fn goto(page: &Page, url: &str, options: NavigationOptions) -> Result<String> {
        let url = validate_url(url)?;
        info!("Navigating to: {}", url);

        let mut last_error = None;
        for attempt in 0..=options.retries {
            if attempt > 0 {
                warn!("Navigation retry {} of {}", attempt, options.retries);
                tokio::time::sleep(Duration::from_millis(options.retry_delay_ms)).await;
            }
            match Self::load(page, url.as_str(), &options).await {
                Ok(landed) => return Ok(landed),
                Err(e) => {
                    warn!("Navigation attempt {} failed: {}", attempt + 1, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            NavigationError::LoadFailed(format!("no attempt made for {}", url)).into()
        }))
    }

    async fn load(page: &Page, url: &str, options: &NavigationOptions) -> Result<String> {
        let timed_out = |_| NavigationError::Timeout(options.timeout_ms);

        tokio::time::timeout(options.timeout(), page.goto(url))
            .await
            .map_err(timed_out)?
            .map_err(|e| NavigationError::LoadFailed(e.to_string()))?;

        tokio::time::timeout(options.timeout(), page.evaluate(LOAD_SCRIPT))
            .await
            .map_err(timed_out)?
            .map_err(|e| Error::cdp(e.to_string()))?;

        let landed = page
            .url()
            .await
            .map_err(|e| Error::cdp(e.to_string()))?
            .unwrap_or_else(|| url.to_string());
        debug!("Loaded {} -> {}", url, landed);
        Ok(landed)
    }
}
