//! Scroll-target resolution
//!
//! Picks the one scroller whose scrolling reveals "the whole page". Many
//! applications keep the document fixed and scroll an inner container, so
//! the document is only one candidate among all vertical scrollers.

use crate::capture::surface::{CaptureSurface, ElementGeometry, Rect, ScrollNode, Viewport};
use crate::error::Result;
use tracing::{debug, info, instrument};

/// Candidates must be wider than this share of the viewport
pub const MIN_WIDTH_RATIO: f64 = 0.4;

/// The scroller driven during one capture session
#[derive(Debug, Clone, PartialEq)]
pub struct ScrollTarget {
    /// Which scroller to drive
    pub node: ScrollNode,
    /// The document scrolls (as opposed to an inner element)
    pub is_window_scrolling: bool,
    /// Visible height of the scroller in CSS pixels
    pub viewport_height: f64,
    /// Content height at resolution time (re-read after settling)
    pub scroll_height: f64,
    /// Offset to restore when the session ends
    pub original_scroll_top: f64,
    /// Region of the viewport the scroller occupies; `None` for the document
    pub clip: Option<Rect>,
}

/// Choose a scroller among the document and inner elements.
///
/// Returns the winning node together with its geometry. An element
/// qualifies when it scrolls vertically, has more content than visible
/// height, and is visible with non-zero size. Qualified elements narrower
/// than [`MIN_WIDTH_RATIO`] of the viewport are dropped unless that leaves
/// nothing. The largest `(scroll_height - client_height) * client_width`
/// wins; ties keep the first seen, the document being seen first.
pub fn select_scroll_target<'a>(
    document: &'a ElementGeometry,
    elements: &'a [ElementGeometry],
    viewport: Viewport,
) -> (ScrollNode, &'a ElementGeometry) {
    let mut candidates: Vec<(ScrollNode, &ElementGeometry)> = Vec::new();
    if document.scroll_height > document.client_height {
        candidates.push((ScrollNode::Document, document));
    }
    candidates.extend(
        elements
            .iter()
            .filter(|el| is_scroll_candidate(el))
            .map(|el| (ScrollNode::Element(el.node), el)),
    );

    let min_width = viewport.width * MIN_WIDTH_RATIO;
    let wide: Vec<(ScrollNode, &ElementGeometry)> = candidates
        .iter()
        .copied()
        .filter(|(_, el)| el.rect.width > min_width)
        .collect();
    let pool = if wide.is_empty() { candidates } else { wide };

    let mut best: Option<(ScrollNode, &ElementGeometry, f64)> = None;
    for (node, el) in pool {
        let score = scroll_score(el);
        let better = match best {
            Some((_, _, top)) => score > top,
            None => true,
        };
        if better {
            best = Some((node, el, score));
        }
    }

    match best {
        Some((node, el, _)) => (node, el),
        None => (ScrollNode::Document, document),
    }
}

fn is_scroll_candidate(el: &ElementGeometry) -> bool {
    el.overflow_y.is_scrollable()
        && el.scroll_height > el.client_height
        && !el.hidden
        && !el.rect.is_empty()
}

/// Scrollable-area proxy used to rank candidates
fn scroll_score(el: &ElementGeometry) -> f64 {
    (el.scroll_height - el.client_height) * el.client_width
}

/// Resolves the [`ScrollTarget`] for a capture session
pub struct ScrollTargetResolver;

impl ScrollTargetResolver {
    /// Inspect the page and pick its primary scroller. Never fails for
    /// lack of candidates: the document is the fallback.
    #[instrument(skip(surface))]
    pub async fn resolve<S: CaptureSurface>(surface: &S) -> Result<ScrollTarget> {
        let viewport = surface.viewport().await?;
        let document = surface.document_scroller().await?;
        let elements = surface.elements().await?;

        let (node, geometry) = select_scroll_target(&document, &elements, viewport);
        let original_scroll_top = surface.scroll_top(node).await?;

        let target = match node {
            ScrollNode::Document => ScrollTarget {
                node,
                is_window_scrolling: true,
                viewport_height: viewport.height,
                scroll_height: geometry.scroll_height,
                original_scroll_top,
                clip: None,
            },
            ScrollNode::Element(_) => ScrollTarget {
                node,
                is_window_scrolling: false,
                viewport_height: geometry.client_height,
                scroll_height: geometry.scroll_height,
                original_scroll_top,
                clip: Some(Rect {
                    top: geometry.rect.top,
                    left: geometry.rect.left,
                    width: geometry.client_width,
                    height: geometry.client_height,
                }),
            },
        };

        debug!(
            "Scroll target candidates: {} elements, chosen {:?}",
            elements.len(),
            node
        );
        info!(
            "Resolved scroll target {:?}: viewport_height={}, scroll_height={}",
            target.node, target.viewport_height, target.scroll_height
        );
        Ok(target)
    }
}
