//! Browser automation module
//!
//! This module provides browser control through ChromiumOxide: lifecycle
//! management, navigation, and the CDP implementation of the capture
//! surface.

pub mod controller;
pub mod navigation;
pub mod surface;

pub use controller::{BrowserConfig, BrowserConfigBuilder, BrowserController};
pub use navigation::{validate_url, NavigationOptions, PageNavigator};
pub use surface::CdpSurface;

use crate::capture::{CaptureFacade, PipelineConfig, StitchedImage};
use crate::error::Result;
use crate::settings::CaptureSettings;
use tracing::{instrument, warn};

/// Launch a browser, load `url`, capture it per `settings`, and shut the
/// browser down again.
#[instrument(skip(browser, pipeline))]
pub async fn capture_page(
    browser: &BrowserConfig,
    pipeline: &PipelineConfig,
    url: &str,
    settings: &CaptureSettings,
) -> Result<StitchedImage> {
    validate_url(url)?;
    let controller = BrowserController::launch(browser.clone()).await?;

    let outcome = async {
        let page = controller.open(url).await?;
        let surface = CdpSurface::new(page);
        CaptureFacade::with_config(&surface, pipeline.clone())
            .run(settings)
            .await
    }
    .await;

    if let Err(e) = controller.close().await {
        warn!("Failed to close browser: {}", e);
    }
    outcome
}
