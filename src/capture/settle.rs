//! Page preparation before segmented capture
//!
//! Scrolls once through the whole page with animations disabled so lazy
//! content mounts and the scroll height stops growing, then returns to the
//! top. The animation-disabling rule stays in place for the capture loop
//! and is removed through the returned [`SettleGuard`].

use crate::capture::resolver::ScrollTarget;
use crate::capture::surface::{CaptureSurface, StyleHandle};
use crate::error::Result;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Zero-duration transitions and animations, no smooth scrolling
pub const DISABLE_ANIMATIONS_CSS: &str = "*, *::before, *::after { \
    transition-duration: 0s !important; \
    transition-delay: 0s !important; \
    animation-duration: 0s !important; \
    animation-delay: 0s !important; \
    scroll-behavior: auto !important; \
} \
html, body { scroll-behavior: auto !important; }";

/// Keeps the animation-disabling rule alive until released
#[must_use = "the injected style leaks into the page unless released"]
#[derive(Debug)]
pub struct SettleGuard {
    style: StyleHandle,
}

impl SettleGuard {
    /// Remove the injected rule
    pub async fn release<S: CaptureSurface>(self, surface: &S) -> Result<()> {
        surface.remove_style(self.style).await
    }
}

/// Pre-scrolls the page to materialize lazy content
pub struct PageSettler;

impl PageSettler {
    /// Walk `target` from the top to `total_height` in viewport steps,
    /// settling after each one, then scroll back to the top.
    ///
    /// On error the injected rule is removed before returning.
    #[instrument(skip(surface, target), fields(viewport_height = target.viewport_height))]
    pub async fn settle<S: CaptureSurface>(
        surface: &S,
        target: &ScrollTarget,
        total_height: f64,
        delay: Duration,
    ) -> Result<SettleGuard> {
        let style = surface.insert_style(DISABLE_ANIMATIONS_CSS).await?;
        let guard = SettleGuard { style };

        match Self::walk(surface, target, total_height, delay).await {
            Ok(()) => {
                info!("Page settled");
                Ok(guard)
            }
            Err(e) => {
                if let Err(cleanup) = guard.release(surface).await {
                    warn!("Failed to remove animation style: {}", cleanup);
                }
                Err(e)
            }
        }
    }

    async fn walk<S: CaptureSurface>(
        surface: &S,
        target: &ScrollTarget,
        total_height: f64,
        delay: Duration,
    ) -> Result<()> {
        let step = target.viewport_height;
        if step > 0.0 {
            let mut y = 0.0;
            while y < total_height {
                surface.scroll_to(target.node, y).await?;
                surface.settle(delay).await?;
                y += step;
            }
            debug!("Pre-scrolled to {}", y - step);
        }

        surface.scroll_to(target.node, 0.0).await?;
        surface.settle(delay).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disable_animations_css() {
        assert!(DISABLE_ANIMATIONS_CSS.contains("transition-duration: 0s"));
        assert!(DISABLE_ANIMATIONS_CSS.contains("animation-duration: 0s"));
        assert!(DISABLE_ANIMATIONS_CSS.contains("scroll-behavior: auto"));
    }
}
