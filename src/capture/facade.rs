//! Top-level capture entry point
//!
//! Chooses between a full scrolling capture and a single viewport capture,
//! and hands the result to the configured output action.

use crate::capture::orchestrator::{CaptureSegment, SegmentCapturer};
use crate::capture::resolver::ScrollTargetResolver;
use crate::capture::stitch::{StitchLayout, StitchedImage, Stitcher};
use crate::capture::surface::CaptureSurface;
use crate::capture::PipelineConfig;
use crate::error::{Error, Result};
use crate::output::{Delivered, ImageSink};
use crate::settings::{CaptureSettings, SettingsSource};
use tracing::{info, instrument, warn};

/// Runs capture sessions against one page
pub struct CaptureFacade<'a, S> {
    surface: &'a S,
    config: PipelineConfig,
}

impl<'a, S: CaptureSurface> CaptureFacade<'a, S> {
    /// Facade over `surface` with default timings
    pub fn new(surface: &'a S) -> Self {
        Self::with_config(surface, PipelineConfig::default())
    }

    /// Facade over `surface` with custom timings
    pub fn with_config(surface: &'a S, config: PipelineConfig) -> Self {
        Self { surface, config }
    }

    /// Pipeline timings in use
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Produce the final image for `settings`.
    ///
    /// With scrolling enabled: resolve the scroll target, settle, capture
    /// segments, stitch. Otherwise a single viewport capture.
    #[instrument(skip(self))]
    pub async fn run(&self, settings: &CaptureSettings) -> Result<StitchedImage> {
        if !settings.scrolling_enabled {
            return self.capture_viewport().await;
        }

        info!("Starting full-page capture");
        let outcome = async {
            let target = ScrollTargetResolver::resolve(self.surface).await?;
            SegmentCapturer::capture_all(self.surface, target, &self.config).await
        }
        .await;

        if let Err(e) = self.surface.clear_node_tags().await {
            warn!("Cleanup step 'clear node tags' failed: {}", e);
        }
        let run = outcome?;

        tokio::task::spawn_blocking(move || Stitcher::stitch_run(&run))
            .await
            .map_err(|e| Error::generic(format!("Stitching task failed: {}", e)))?
    }

    /// Capture exactly the visible viewport, after a settle delay
    #[instrument(skip(self))]
    pub async fn capture_viewport(&self) -> Result<StitchedImage> {
        info!("Capturing visible viewport");
        self.surface
            .settle(self.config.single_capture_delay)
            .await?;
        let viewport = self.surface.viewport().await?;
        let image = SegmentCapturer::capture_one(self.surface, 0, &self.config).await?;

        let segment = CaptureSegment {
            image,
            scroll_top: 0.0,
        };
        let layout = StitchLayout {
            css_width: viewport.width,
            viewport_height: viewport.height,
            final_offset: 0.0,
            clip: None,
        };
        tokio::task::spawn_blocking(move || Stitcher::stitch(&[segment], layout))
            .await
            .map_err(|e| Error::generic(format!("Stitching task failed: {}", e)))?
    }

    /// Fetch settings, capture, and deliver to the configured action
    #[instrument(skip(self, settings, sink))]
    pub async fn run_and_deliver<C, D>(&self, settings: &C, sink: &D) -> Result<Delivered>
    where
        C: SettingsSource,
        D: ImageSink,
    {
        let settings = settings.get_settings().await?;
        let image = self.run(&settings).await?;
        sink.deliver(&image, settings.default_action, settings.save_as)
            .await
    }
}
