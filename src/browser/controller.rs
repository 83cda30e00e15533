//! Browser lifecycle
//!
//! One Chromium process per controller. The CDP event stream is drained on
//! a background task for as long as the browser lives.

use crate::browser::navigation::{NavigationOptions, PageNavigator};
use crate::error::{BrowserError, Result};
use chromiumoxide::browser::{Browser, BrowserConfig as CdpBrowserConfig};
use chromiumoxide::handler::viewport::Viewport as CdpViewport;
use chromiumoxide::Page;
use futures::StreamExt;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// How long `close` waits for the event task after the browser exits
const EVENT_DRAIN_LIMIT: Duration = Duration::from_secs(5);

/// Chromium launch settings
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// Run without a window (default: true)
    pub headless: bool,
    /// Viewport width in CSS pixels (default: 1280)
    pub width: u32,
    /// Viewport height in CSS pixels (default: 800)
    pub height: u32,
    /// Device pixel ratio; `None` leaves the browser default
    pub device_scale_factor: Option<f64>,
    /// Keep Chromium's sandbox on (default: true)
    pub sandbox: bool,
    /// Page load timeout in milliseconds (default: 30000)
    pub timeout_ms: u64,
    /// Chromium executable; `None` lets chromiumoxide find one
    pub chrome_path: Option<String>,
    /// Passed through to Chromium after the built-in flags
    pub extra_args: Vec<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            width: 1280,
            height: 800,
            device_scale_factor: None,
            sandbox: true,
            timeout_ms: 30000,
            chrome_path: None,
            extra_args: Vec::new(),
        }
    }
}

impl BrowserConfig {
    /// Start from the defaults
    pub fn builder() -> BrowserConfigBuilder {
        BrowserConfigBuilder::default()
    }

    /// Command-line flags handed to Chromium.
    ///
    /// Scrollbars are always hidden so every segment has the same layout
    /// width.
    pub fn chrome_args(&self) -> Vec<String> {
        let mut args = vec!["--hide-scrollbars".to_string()];
        if !self.sandbox {
            args.push("--no-sandbox".to_string());
        }
        args.extend(self.extra_args.iter().cloned());
        args
    }

    fn viewport(&self) -> CdpViewport {
        CdpViewport {
            width: self.width,
            height: self.height,
            device_scale_factor: self.device_scale_factor,
            emulating_mobile: false,
            is_landscape: self.width >= self.height,
            has_touch: false,
        }
    }

    fn to_cdp(&self) -> Result<CdpBrowserConfig> {
        let mut builder = CdpBrowserConfig::builder().viewport(self.viewport());
        if !self.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &self.chrome_path {
            builder = builder.chrome_executable(path);
        }
        for arg in self.chrome_args() {
            builder = builder.arg(arg);
        }
        builder
            .build()
            .map_err(|e| BrowserError::ConfigError(e.to_string()).into())
    }
}

/// Builder for [`BrowserConfig`]
#[derive(Debug, Default)]
pub struct BrowserConfigBuilder {
    config: BrowserConfig,
}

impl BrowserConfigBuilder {
    /// Run with or without a window
    pub fn headless(mut self, headless: bool) -> Self {
        self.config.headless = headless;
        self
    }

    /// Viewport size in CSS pixels
    pub fn viewport(mut self, width: u32, height: u32) -> Self {
        self.config.width = width;
        self.config.height = height;
        self
    }

    /// Device pixel ratio
    pub fn device_scale_factor(mut self, scale: f64) -> Self {
        self.config.device_scale_factor = Some(scale);
        self
    }

    /// Turn Chromium's sandbox on or off
    pub fn sandbox(mut self, sandbox: bool) -> Self {
        self.config.sandbox = sandbox;
        self
    }

    /// Page load timeout
    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.config.timeout_ms = ms;
        self
    }

    /// Chromium executable
    pub fn chrome_path<S: Into<String>>(mut self, path: S) -> Self {
        self.config.chrome_path = Some(path.into());
        self
    }

    /// Extra Chromium flag
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.config.extra_args.push(arg.into());
        self
    }

    /// Finish
    pub fn build(self) -> BrowserConfig {
        self.config
    }
}

/// A running Chromium instance
pub struct BrowserController {
    browser: Browser,
    events: JoinHandle<()>,
    config: BrowserConfig,
}

impl BrowserController {
    /// Start Chromium with `config`
    #[instrument(skip(config), fields(headless = config.headless))]
    pub async fn launch(config: BrowserConfig) -> Result<Self> {
        let (browser, mut handler) = Browser::launch(config.to_cdp()?)
            .await
            .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;

        let events = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    warn!("CDP event stream stopped: {}", e);
                    break;
                }
            }
            debug!("CDP event stream drained");
        });

        info!(
            "Browser started with a {}x{} viewport",
            config.width, config.height
        );
        Ok(Self {
            browser,
            events,
            config,
        })
    }

    /// Open a tab on `url` and wait for it to finish loading
    #[instrument(skip(self))]
    pub async fn open(&self, url: &str) -> Result<Page> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::PageCreationFailed(e.to_string()))?;

        let options = NavigationOptions {
            timeout_ms: self.config.timeout_ms,
            ..Default::default()
        };
        let landed = PageNavigator::goto(&page, url, options).await?;
        debug!("Tab ready at {}", landed);
        Ok(page)
    }

    /// Launch settings this browser was started with
    pub fn config(&self) -> &BrowserConfig {
        &self.config
    }

    /// Shut Chromium down
    #[instrument(skip(self))]
    pub async fn close(mut self) -> Result<()> {
        self.browser.close().await?;
        if tokio::time::timeout(EVENT_DRAIN_LIMIT, self.events)
            .await
            .is_err()
        {
            debug!("CDP event task still running after close");
        }
        info!("Browser closed");
        Ok(())
    }
}
