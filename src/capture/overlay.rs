//! Fixed and sticky overlay suppression
//!
//! Headers, cookie bars and floating buttons stay put while the page
//! scrolls, so they would show up in every segment. Before each capture
//! after the first, the visible ones are hidden and put back afterwards.

use crate::capture::surface::{CaptureSurface, ElementGeometry, NodeId, Position, StyleHandle};
use crate::error::Result;
use tracing::{debug, instrument, warn};

/// Marker class added to hidden overlays
pub const OVERLAY_MARKER_CLASS: &str = "scrollshot-hidden-overlay";

/// Pick the overlays to hide: fixed or sticky, non-empty, not already
/// hidden, and vertically intersecting the viewport.
pub fn select_overlays(elements: &[ElementGeometry], viewport_height: f64) -> Vec<NodeId> {
    elements
        .iter()
        .filter(|el| matches!(el.position, Position::Fixed | Position::Sticky))
        .filter(|el| !el.hidden && !el.rect.is_empty())
        .filter(|el| el.rect.top < viewport_height && el.rect.bottom() > 0.0)
        .map(|el| el.node)
        .collect()
}

fn overlay_rule() -> String {
    format!(".{OVERLAY_MARKER_CLASS} {{ visibility: hidden !important; }}")
}

/// Overlays hidden for one segment capture
///
/// Must be handed back to [`HiddenOverlaySet::restore`] whether or not the
/// capture succeeded.
#[must_use = "hidden overlays stay hidden until restored"]
#[derive(Debug)]
pub struct HiddenOverlaySet {
    nodes: Vec<NodeId>,
    style: Option<StyleHandle>,
}

impl HiddenOverlaySet {
    /// Elements this set modified
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    /// Whether nothing was hidden
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Remove the marker class from exactly the elements this set touched
    /// and drop the injected rule. Both steps run even if one fails.
    #[instrument(skip(self, surface), fields(count = self.nodes.len()))]
    pub async fn restore<S: CaptureSurface>(self, surface: &S) -> Result<()> {
        if self.nodes.is_empty() {
            return Ok(());
        }

        let unmarked = surface
            .set_marker(&self.nodes, OVERLAY_MARKER_CLASS, false)
            .await;
        let unstyled = match self.style {
            Some(handle) => surface.remove_style(handle).await,
            None => Ok(()),
        };

        if let Err(e) = &unmarked {
            warn!("Failed to unmark overlays: {}", e);
        }
        unmarked?;
        unstyled
    }
}

/// Hides overlays around a single segment capture
pub struct OverlaySuppressor;

impl OverlaySuppressor {
    /// Hide every overlay currently in view.
    #[instrument(skip(surface))]
    pub async fn hide<S: CaptureSurface>(surface: &S) -> Result<HiddenOverlaySet> {
        let viewport = surface.viewport().await?;
        let elements = surface.elements().await?;
        let nodes = select_overlays(&elements, viewport.height);

        if nodes.is_empty() {
            return Ok(HiddenOverlaySet { nodes, style: None });
        }

        debug!("Hiding {} overlays", nodes.len());
        surface
            .set_marker(&nodes, OVERLAY_MARKER_CLASS, true)
            .await?;

        match surface.insert_style(&overlay_rule()).await {
            Ok(handle) => Ok(HiddenOverlaySet {
                nodes,
                style: Some(handle),
            }),
            Err(e) => {
                if let Err(undo) = surface
                    .set_marker(&nodes, OVERLAY_MARKER_CLASS, false)
                    .await
                {
                    warn!("Failed to unmark overlays after style error: {}", undo);
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::surface::{Overflow, Rect};

    fn element(node: u32, position: Position, top: f64, height: f64) -> ElementGeometry {
        ElementGeometry {
            node: NodeId(node),
            position,
            overflow_y: Overflow::Visible,
            rect: Rect {
                top,
                left: 0.0,
                width: 1000.0,
                height,
            },
            client_width: 1000.0,
            client_height: height,
            scroll_height: height,
            hidden: false,
        }
    }

    #[test]
    fn test_selects_fixed_and_sticky_in_view() {
        let els = [
            element(1, Position::Fixed, 0.0, 60.0),
            element(2, Position::Sticky, 300.0, 40.0),
            element(3, Position::Static, 0.0, 60.0),
            element(4, Position::Absolute, 0.0, 60.0),
        ];
        assert_eq!(select_overlays(&els, 800.0), vec![NodeId(1), NodeId(2)]);
    }

    #[test]
    fn test_skips_overlays_outside_viewport() {
        let els = [
            element(1, Position::Fixed, 800.0, 60.0),
            element(2, Position::Fixed, -60.0, 60.0),
            element(3, Position::Fixed, -59.0, 60.0),
        ];
        assert_eq!(select_overlays(&els, 800.0), vec![NodeId(3)]);
    }

    #[test]
    fn test_skips_hidden_and_empty_overlays() {
        let mut hidden = element(1, Position::Fixed, 0.0, 60.0);
        hidden.hidden = true;
        let empty = element(2, Position::Fixed, 0.0, 0.0);
        assert!(select_overlays(&[hidden, empty], 800.0).is_empty());
    }

    #[test]
    fn test_overlay_rule_targets_marker() {
        let rule = overlay_rule();
        assert!(rule.starts_with(".scrollshot-hidden-overlay"));
        assert!(rule.contains("visibility: hidden"));
    }
}
