//! Scrolling capture pipeline
//!
//! ```text
//! CaptureFacade ──▶ ScrollTargetResolver ──▶ SegmentCapturer ──▶ Stitcher
//!                                              │   ▲
//!                                   PageSettler┘   └OverlaySuppressor
//! ```
//!
//! Everything here is written against [`CaptureSurface`], so the whole
//! pipeline runs the same on a real browser page and on an in-memory page.

pub mod facade;
pub mod orchestrator;
pub mod overlay;
pub mod resolver;
pub mod settle;
pub mod stitch;
pub mod surface;

pub use facade::CaptureFacade;
pub use orchestrator::{CaptureRun, CaptureSegment, SegmentCapturer};
pub use overlay::{select_overlays, HiddenOverlaySet, OverlaySuppressor};
pub use resolver::{select_scroll_target, ScrollTarget, ScrollTargetResolver};
pub use settle::{PageSettler, SettleGuard};
pub use stitch::{plan_placements, Placement, StitchLayout, StitchedImage, Stitcher};
pub use surface::{
    CaptureSurface, ElementGeometry, NodeId, Overflow, Position, Rect, ScrollNode, StyleHandle,
    Viewport,
};

use std::time::Duration;

/// Timing knobs for the capture pipeline
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Minimum wait after each programmatic scroll, before the animation
    /// frame wait (default: 100ms)
    pub settle_delay: Duration,
    /// Minimum wait between hiding overlays and capturing (default: 0)
    pub repaint_delay: Duration,
    /// Upper bound for one visible-region capture (default: 30s)
    pub capture_timeout: Duration,
    /// Wait before the single capture when scrolling is disabled
    /// (default: 250ms)
    pub single_capture_delay: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(100),
            repaint_delay: Duration::ZERO,
            capture_timeout: Duration::from_secs(30),
            single_capture_delay: Duration::from_millis(250),
        }
    }
}

impl PipelineConfig {
    /// Config with every wait set to zero
    pub fn immediate() -> Self {
        Self {
            settle_delay: Duration::ZERO,
            repaint_delay: Duration::ZERO,
            single_capture_delay: Duration::ZERO,
            ..Default::default()
        }
    }

    /// Set the post-scroll settle delay
    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Set the capture timeout
    pub fn capture_timeout(mut self, timeout: Duration) -> Self {
        self.capture_timeout = timeout;
        self
    }
}
