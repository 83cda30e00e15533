//! Segment capture loop
//!
//! Drives the scroll target forward one viewport at a time and grabs the
//! visible region after each step. Every session-wide mutation (scrollbar
//! rule, animation rule, scroll position) is undone on every exit path.

use crate::capture::overlay::OverlaySuppressor;
use crate::capture::resolver::ScrollTarget;
use crate::capture::settle::PageSettler;
use crate::capture::surface::{CaptureSurface, Viewport};
use crate::capture::PipelineConfig;
use crate::error::{CaptureError, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use tracing::{debug, info, instrument, warn};

/// Hides scrollbars without changing scroll mechanics
pub const HIDE_SCROLLBARS_CSS: &str = "::-webkit-scrollbar { display: none !important; } \
html, body, * { scrollbar-width: none !important; }";

/// One captured viewport
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureSegment {
    /// Encoded image bytes (PNG)
    pub image: Vec<u8>,
    /// Actual scroll offset of the target when captured
    pub scroll_top: f64,
}

impl CaptureSegment {
    /// The image as a `data:` URL
    pub fn to_data_url(&self) -> String {
        format!("data:image/png;base64,{}", BASE64.encode(&self.image))
    }
}

/// Everything the stitcher needs from a capture session
#[derive(Debug, Clone)]
pub struct CaptureRun {
    /// Segments in capture order, strictly increasing `scroll_top`
    pub segments: Vec<CaptureSegment>,
    /// Last actual scroll offset observed
    pub final_offset: f64,
    /// Layout viewport during capture
    pub viewport: Viewport,
    /// The target, with its scroll height as measured after settling
    pub target: ScrollTarget,
}

/// Captures a scroll target as a sequence of viewport segments
pub struct SegmentCapturer;

impl SegmentCapturer {
    /// Settle the page, then capture it segment by segment.
    ///
    /// Any capture failure aborts the session and discards the segments
    /// taken so far. Original scroll position and injected styles are
    /// restored whatever the outcome.
    #[instrument(skip(surface, target, config), fields(node = ?target.node))]
    pub async fn capture_all<S: CaptureSurface>(
        surface: &S,
        mut target: ScrollTarget,
        config: &PipelineConfig,
    ) -> Result<CaptureRun> {
        let viewport = surface.viewport().await?;
        let scrollbars = surface.insert_style(HIDE_SCROLLBARS_CSS).await?;

        let outcome = Self::settle_and_capture(surface, &mut target, config).await;

        let restored = surface
            .scroll_to(target.node, target.original_scroll_top)
            .await;
        let unstyled = surface.remove_style(scrollbars).await;
        log_cleanup("restore scroll position", restored);
        log_cleanup("remove scrollbar style", unstyled);

        let (segments, final_offset) = outcome?;
        info!(
            "Captured {} segments, final offset {}",
            segments.len(),
            final_offset
        );

        Ok(CaptureRun {
            segments,
            final_offset,
            viewport,
            target,
        })
    }

    async fn settle_and_capture<S: CaptureSurface>(
        surface: &S,
        target: &mut ScrollTarget,
        config: &PipelineConfig,
    ) -> Result<(Vec<CaptureSegment>, f64)> {
        let guard =
            PageSettler::settle(surface, target, target.scroll_height, config.settle_delay).await?;

        let outcome = async {
            // Lazy content may have grown the page while settling.
            target.scroll_height = surface.scroll_height(target.node).await?;
            debug!("Settled scroll height: {}", target.scroll_height);
            Self::capture_segments(surface, target, config).await
        }
        .await;

        log_cleanup("remove animation style", guard.release(surface).await);
        outcome
    }

    async fn capture_segments<S: CaptureSurface>(
        surface: &S,
        target: &ScrollTarget,
        config: &PipelineConfig,
    ) -> Result<(Vec<CaptureSegment>, f64)> {
        let step = target.viewport_height;
        let total = target.scroll_height;

        if total <= step {
            info!("Page fits in one viewport, taking a single capture");
            surface.settle(config.settle_delay).await?;
            let image = Self::capture_one(surface, 0, config).await?;
            return Ok((
                vec![CaptureSegment {
                    image,
                    scroll_top: 0.0,
                }],
                0.0,
            ));
        }

        surface.scroll_to(target.node, 0.0).await?;
        surface.settle(config.settle_delay).await?;
        let mut last_offset = surface.scroll_top(target.node).await?;
        // Overlays are hidden here too: a bar at the bottom of the first
        // viewport would otherwise cover rows no later segment redraws.
        let image = Self::capture_without_overlays(surface, 0, config).await?;
        let mut segments = vec![CaptureSegment {
            image,
            scroll_top: last_offset,
        }];

        let mut requested = last_offset + step;
        while requested < total {
            surface.scroll_to(target.node, requested).await?;
            surface.settle(config.settle_delay).await?;

            let actual = surface.scroll_top(target.node).await?;
            if actual <= last_offset {
                debug!(
                    "Scroll stalled at {} (requested {}), bottom reached",
                    actual, requested
                );
                break;
            }

            let index = segments.len();
            let image = Self::capture_without_overlays(surface, index, config).await?;
            debug!("Segment {} captured at offset {}", index, actual);
            segments.push(CaptureSegment {
                image,
                scroll_top: actual,
            });

            last_offset = actual;
            requested += step;
        }

        Ok((segments, last_offset))
    }

    async fn capture_without_overlays<S: CaptureSurface>(
        surface: &S,
        index: usize,
        config: &PipelineConfig,
    ) -> Result<Vec<u8>> {
        let overlays = OverlaySuppressor::hide(surface).await?;

        let shot = async {
            surface.settle(config.repaint_delay).await?;
            Self::capture_one(surface, index, config).await
        }
        .await;

        let restored = overlays.restore(surface).await;
        match (shot, restored) {
            (Ok(image), Ok(())) => Ok(image),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), restored) => {
                log_cleanup("restore overlays", restored);
                Err(e)
            }
        }
    }

    /// Single call to the capture primitive, bounded by the capture timeout
    pub(crate) async fn capture_one<S: CaptureSurface>(
        surface: &S,
        index: usize,
        config: &PipelineConfig,
    ) -> Result<Vec<u8>> {
        let timeout_ms = config.capture_timeout.as_millis() as u64;
        let image = tokio::time::timeout(config.capture_timeout, surface.capture_visible())
            .await
            .map_err(|_| CaptureError::Timeout(timeout_ms))??;

        if image.is_empty() {
            return Err(CaptureError::EmptyPayload { segment: index }.into());
        }
        Ok(image)
    }
}

fn log_cleanup(step: &str, result: Result<()>) {
    if let Err(e) = result {
        warn!("Cleanup step '{}' failed: {}", step, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_data_url() {
        let segment = CaptureSegment {
            image: b"hello".to_vec(),
            scroll_top: 0.0,
        };
        assert_eq!(segment.to_data_url(), "data:image/png;base64,aGVsbG8=");
    }

    #[test]
    fn test_hide_scrollbars_css() {
        assert!(HIDE_SCROLLBARS_CSS.contains("::-webkit-scrollbar"));
        assert!(HIDE_SCROLLBARS_CSS.contains("scrollbar-width: none"));
    }
}
