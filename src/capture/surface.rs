//! Abstract page capability used by the capture pipeline
//!
//! The pipeline never talks to a browser directly. It asks a
//! [`CaptureSurface`] for element geometry and computed style, drives scroll
//! positions, injects and removes style rules, and requests visible-region
//! captures. The CDP implementation lives in
//! [`crate::browser::CdpSurface`]; tests use an in-memory page.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Opaque handle of a page element, stable for one capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

/// Which scroller a scroll operation addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScrollNode {
    /// The document (window) scroller
    Document,
    /// An inner scrolling element
    Element(NodeId),
}

/// Handle of an injected style rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StyleHandle(pub u64);

/// Layout viewport size in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// Width in CSS pixels
    pub width: f64,
    /// Height in CSS pixels
    pub height: f64,
}

/// Bounding client rect in CSS pixels, relative to the viewport
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    /// Top edge
    pub top: f64,
    /// Left edge
    pub left: f64,
    /// Width
    pub width: f64,
    /// Height
    pub height: f64,
}

impl Rect {
    /// Bottom edge
    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    /// Whether the box has any area
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// Computed `position`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    /// `static`
    #[default]
    Static,
    /// `relative`
    Relative,
    /// `absolute`
    Absolute,
    /// `fixed`
    Fixed,
    /// `sticky`
    Sticky,
}

/// Computed `overflow-y`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Overflow {
    /// `visible`
    #[default]
    Visible,
    /// `hidden`
    Hidden,
    /// `clip`
    Clip,
    /// `scroll`
    Scroll,
    /// `auto`
    Auto,
}

impl Overflow {
    /// Whether the user can scroll this axis
    pub fn is_scrollable(self) -> bool {
        matches!(self, Overflow::Scroll | Overflow::Auto)
    }
}

/// Geometry and computed style of one element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementGeometry {
    /// Element handle
    pub node: NodeId,
    /// Computed position
    #[serde(default)]
    pub position: Position,
    /// Computed overflow-y
    #[serde(default)]
    pub overflow_y: Overflow,
    /// Bounding client rect
    pub rect: Rect,
    /// Visible content width
    pub client_width: f64,
    /// Visible content height
    pub client_height: f64,
    /// Total content height
    pub scroll_height: f64,
    /// `display: none` or `visibility: hidden`
    #[serde(default)]
    pub hidden: bool,
}

/// The page capability the pipeline drives
///
/// One surface serves one capture session at a time. Methods take `&self`;
/// implementations keep whatever state they need behind interior mutability.
#[allow(async_fn_in_trait)]
pub trait CaptureSurface {
    /// Current layout viewport
    async fn viewport(&self) -> Result<Viewport>;

    /// Geometry of the document's own scroller
    async fn document_scroller(&self) -> Result<ElementGeometry>;

    /// Every element that could matter for capture: vertical scrollers and
    /// fixed/sticky boxes
    async fn elements(&self) -> Result<Vec<ElementGeometry>>;

    /// Scroll `target` to vertical offset `y` instantly
    async fn scroll_to(&self, target: ScrollNode, y: f64) -> Result<()>;

    /// Actual vertical offset of `target`
    async fn scroll_top(&self, target: ScrollNode) -> Result<f64>;

    /// Live content height of `target`
    async fn scroll_height(&self, target: ScrollNode) -> Result<f64>;

    /// Inject a global style rule
    async fn insert_style(&self, css: &str) -> Result<StyleHandle>;

    /// Remove a previously injected style rule
    async fn remove_style(&self, handle: StyleHandle) -> Result<()>;

    /// Add (`on = true`) or remove a marker class on the given elements
    async fn set_marker(&self, nodes: &[NodeId], class: &str, on: bool) -> Result<()>;

    /// Wait at least `min_delay`, then until two animation frames have fired
    async fn settle(&self, min_delay: Duration) -> Result<()>;

    /// Capture the currently visible pixels as an encoded image
    async fn capture_visible(&self) -> Result<Vec<u8>>;

    /// Drop whatever bookkeeping [`CaptureSurface::elements`] left on the
    /// page so node ids can be resolved. Node ids are invalid afterwards.
    async fn clear_node_tags(&self) -> Result<()>;
}
