//! In-memory page for pipeline tests
//!
//! Models a page with a clamped scroll range, fixed/sticky overlays, an
//! optional inner scroll container, injected style sheets and marker
//! classes. Every capture is rendered as an image whose device row `r` is
//! colored by the page row it shows, so a stitched result can be checked
//! row by row.

#![allow(dead_code)]

use image::{DynamicImage, ImageOutputFormat, Rgba, RgbaImage};
use parking_lot::{Mutex, MutexGuard};
use scrollshot::capture::{
    CaptureSurface, ElementGeometry, NodeId, Overflow, Position, Rect, ScrollNode, StyleHandle,
    Viewport,
};
use scrollshot::error::{BrowserError, CaptureError, Error, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Cursor;
use std::time::Duration;

/// Color painted where a visible overlay covers the viewport
pub const OVERLAY_COLOR: Rgba<u8> = Rgba([255, 0, 255, 255]);

/// Color of viewport rows outside an inner scroll container
pub const CHROME_COLOR: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Color of device row `row` of the page content
pub fn row_color(row: u32) -> Rgba<u8> {
    Rgba([(row >> 8) as u8, row as u8, 7, 255])
}

/// Decode a PNG produced by the pipeline
pub fn decode(png: &[u8]) -> RgbaImage {
    image::load_from_memory(png).unwrap().to_rgba8()
}

/// Injected misbehaviour of the capture primitive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// The primitive reports an error
    Error,
    /// The page navigated away
    Interrupt,
    /// The primitive succeeds with no bytes
    Empty,
}

#[derive(Debug, Clone)]
pub struct Overlay {
    pub node: NodeId,
    pub position: Position,
    pub top: f64,
    pub height: f64,
}

#[derive(Debug, Clone)]
pub struct InnerScroller {
    pub node: NodeId,
    pub rect: Rect,
    pub scroll_height: f64,
    pub scroll_top: f64,
}

#[derive(Debug)]
pub struct State {
    pub viewport: Viewport,
    pub scale: u32,
    /// Height the document reports
    pub page_height: f64,
    /// Largest offset the document actually scrolls to
    pub max_scroll: f64,
    pub scroll_top: f64,
    pub inner: Option<InnerScroller>,
    pub extra_elements: Vec<ElementGeometry>,
    pub overlays: Vec<Overlay>,
    pub styles: BTreeMap<u64, String>,
    pub next_style: u64,
    pub markers: BTreeMap<NodeId, BTreeSet<String>>,
    pub fault: Option<(usize, Fault)>,
    pub captures: usize,
    /// Requested offsets, in call order
    pub scrolls: Vec<f64>,
    /// Scroller offset at each capture
    pub captured_offsets: Vec<f64>,
    /// Whether any overlay was painted into each capture
    pub overlays_visible: Vec<bool>,
    pub settles: usize,
    /// Elements carry node tags from an `elements()` call
    pub tagged: bool,
}

impl State {
    fn is_hidden(&self, node: NodeId) -> bool {
        self.markers.get(&node).is_some_and(|classes| {
            classes.iter().any(|class| {
                let selector = format!(".{}", class);
                self.styles.values().any(|css| css.contains(&selector))
            })
        })
    }

    fn scroller_offset(&self) -> f64 {
        match &self.inner {
            Some(inner) => inner.scroll_top,
            None => self.scroll_top,
        }
    }

    fn render(&self) -> (RgbaImage, bool) {
        let scale = self.scale;
        let width = self.viewport.width as u32 * scale;
        let height = self.viewport.height as u32 * scale;

        let mut image = match &self.inner {
            None => {
                let first = (self.scroll_top as u32) * scale;
                RgbaImage::from_fn(width, height, |_, y| row_color(first + y))
            }
            Some(inner) => {
                let top = inner.rect.top as u32 * scale;
                let bottom = (inner.rect.top + inner.rect.height) as u32 * scale;
                let first = inner.scroll_top as u32 * scale;
                RgbaImage::from_fn(width, height, |_, y| {
                    if y >= top && y < bottom {
                        row_color(first + y - top)
                    } else {
                        CHROME_COLOR
                    }
                })
            }
        };

        let mut painted = false;
        for overlay in &self.overlays {
            if self.is_hidden(overlay.node) {
                continue;
            }
            let top = (overlay.top.max(0.0) as u32 * scale).min(height);
            let bottom = (((overlay.top + overlay.height).max(0.0)) as u32 * scale).min(height);
            for y in top..bottom {
                for x in 0..width {
                    image.put_pixel(x, y, OVERLAY_COLOR);
                }
                painted = true;
            }
        }
        (image, painted)
    }
}

/// In-memory [`CaptureSurface`]
pub struct FakePage {
    state: Mutex<State>,
}

impl FakePage {
    /// Document-scrolling page of `page_height` CSS px in a
    /// `width`x`height` viewport
    pub fn new(width: f64, height: f64, page_height: f64) -> Self {
        Self {
            state: Mutex::new(State {
                viewport: Viewport { width, height },
                scale: 1,
                page_height,
                max_scroll: (page_height - height).max(0.0),
                scroll_top: 0.0,
                inner: None,
                extra_elements: Vec::new(),
                overlays: Vec::new(),
                styles: BTreeMap::new(),
                next_style: 1,
                markers: BTreeMap::new(),
                fault: None,
                captures: 0,
                scrolls: Vec::new(),
                captured_offsets: Vec::new(),
                overlays_visible: Vec::new(),
                settles: 0,
                tagged: false,
            }),
        }
    }

    /// Stop document scrolling at `max` while still reporting the full height
    pub fn clamp_at(self, max: f64) -> Self {
        self.state.lock().max_scroll = max;
        self
    }

    pub fn scale(self, scale: u32) -> Self {
        self.state.lock().scale = scale;
        self
    }

    pub fn scrolled_to(self, y: f64) -> Self {
        self.state.lock().scroll_top = y;
        self
    }

    pub fn overlay(self, node: u32, position: Position, top: f64, height: f64) -> Self {
        self.state.lock().overlays.push(Overlay {
            node: NodeId(node),
            position,
            top,
            height,
        });
        self
    }

    /// Make an inner element the only scroller; the document stops scrolling
    pub fn inner_scroller(self, node: u32, rect: Rect, scroll_height: f64) -> Self {
        {
            let mut state = self.state.lock();
            state.page_height = state.viewport.height;
            state.max_scroll = 0.0;
            state.inner = Some(InnerScroller {
                node: NodeId(node),
                rect,
                scroll_height,
                scroll_top: 0.0,
            });
        }
        self
    }

    pub fn element(self, geometry: ElementGeometry) -> Self {
        self.state.lock().extra_elements.push(geometry);
        self
    }

    /// Misbehave on the `nth` capture (1-based)
    pub fn fail_on_capture(self, nth: usize, fault: Fault) -> Self {
        self.state.lock().fault = Some((nth, fault));
        self
    }

    pub fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock()
    }

    /// Assert the page carries no trace of a capture session
    pub fn assert_pristine(&self, scroll_top: f64) {
        let state = self.state.lock();
        assert!(state.styles.is_empty(), "styles left: {:?}", state.styles);
        assert!(state.markers.is_empty(), "markers left: {:?}", state.markers);
        assert_eq!(state.scroller_offset(), scroll_top);
    }
}

/// Geometry for a scroll container
pub fn scroller(node: u32, rect: Rect, scroll_height: f64) -> ElementGeometry {
    ElementGeometry {
        node: NodeId(node),
        position: Position::Static,
        overflow_y: Overflow::Auto,
        rect,
        client_width: rect.width,
        client_height: rect.height,
        scroll_height,
        hidden: false,
    }
}

impl CaptureSurface for FakePage {
    async fn viewport(&self) -> Result<Viewport> {
        Ok(self.state.lock().viewport)
    }

    async fn document_scroller(&self) -> Result<ElementGeometry> {
        let state = self.state.lock();
        let viewport = state.viewport;
        Ok(ElementGeometry {
            node: NodeId(0),
            position: Position::Static,
            overflow_y: Overflow::Visible,
            rect: Rect {
                top: 0.0,
                left: 0.0,
                width: viewport.width,
                height: viewport.height,
            },
            client_width: viewport.width,
            client_height: viewport.height,
            scroll_height: state.page_height,
            hidden: false,
        })
    }

    async fn elements(&self) -> Result<Vec<ElementGeometry>> {
        let mut state = self.state.lock();
        state.tagged = true;
        let mut out = Vec::new();
        if let Some(inner) = &state.inner {
            out.push(scroller(inner.node.0, inner.rect, inner.scroll_height));
        }
        for overlay in &state.overlays {
            out.push(ElementGeometry {
                node: overlay.node,
                position: overlay.position,
                overflow_y: Overflow::Visible,
                rect: Rect {
                    top: overlay.top,
                    left: 0.0,
                    width: state.viewport.width,
                    height: overlay.height,
                },
                client_width: state.viewport.width,
                client_height: overlay.height,
                scroll_height: overlay.height,
                hidden: state.is_hidden(overlay.node),
            });
        }
        out.extend(state.extra_elements.iter().cloned());
        Ok(out)
    }

    async fn scroll_to(&self, target: ScrollNode, y: f64) -> Result<()> {
        let mut state = self.state.lock();
        state.scrolls.push(y);
        match target {
            ScrollNode::Document => {
                state.scroll_top = y.clamp(0.0, state.max_scroll);
                Ok(())
            }
            ScrollNode::Element(node) => match state.inner.as_mut() {
                Some(inner) if inner.node == node => {
                    let max = (inner.scroll_height - inner.rect.height).max(0.0);
                    inner.scroll_top = y.clamp(0.0, max);
                    Ok(())
                }
                _ => Err(BrowserError::ScriptFailed(format!("scroll target {} is gone", node.0)).into()),
            },
        }
    }

    async fn scroll_top(&self, target: ScrollNode) -> Result<f64> {
        let state = self.state.lock();
        Ok(match target {
            ScrollNode::Document => state.scroll_top,
            ScrollNode::Element(_) => state.inner.as_ref().map_or(0.0, |i| i.scroll_top),
        })
    }

    async fn scroll_height(&self, target: ScrollNode) -> Result<f64> {
        let state = self.state.lock();
        Ok(match target {
            ScrollNode::Document => state.page_height,
            ScrollNode::Element(_) => state.inner.as_ref().map_or(0.0, |i| i.scroll_height),
        })
    }

    async fn insert_style(&self, css: &str) -> Result<StyleHandle> {
        let mut state = self.state.lock();
        let id = state.next_style;
        state.next_style += 1;
        state.styles.insert(id, css.to_string());
        Ok(StyleHandle(id))
    }

    async fn remove_style(&self, handle: StyleHandle) -> Result<()> {
        self.state.lock().styles.remove(&handle.0);
        Ok(())
    }

    async fn set_marker(&self, nodes: &[NodeId], class: &str, on: bool) -> Result<()> {
        let mut state = self.state.lock();
        for node in nodes {
            if on {
                state
                    .markers
                    .entry(*node)
                    .or_default()
                    .insert(class.to_string());
            } else if let Some(classes) = state.markers.get_mut(node) {
                classes.remove(class);
                if classes.is_empty() {
                    state.markers.remove(node);
                }
            }
        }
        Ok(())
    }

    async fn settle(&self, _min_delay: Duration) -> Result<()> {
        self.state.lock().settles += 1;
        Ok(())
    }

    async fn capture_visible(&self) -> Result<Vec<u8>> {
        let mut state = self.state.lock();
        state.captures += 1;

        if let Some((nth, fault)) = state.fault {
            if nth == state.captures {
                return match fault {
                    Fault::Error => Err(CaptureError::PrimitiveFailed("injected".into()).into()),
                    Fault::Interrupt => Err(Error::Interrupted("Target closed".into())),
                    Fault::Empty => Ok(Vec::new()),
                };
            }
        }

        let offset = state.scroller_offset();
        let (image, painted) = state.render();
        state.captured_offsets.push(offset);
        state.overlays_visible.push(painted);

        let mut png = Vec::new();
        DynamicImage::ImageRgba8(image)
            .write_to(&mut Cursor::new(&mut png), ImageOutputFormat::Png)
            .unwrap();
        Ok(png)
    }

    async fn clear_node_tags(&self) -> Result<()> {
        self.state.lock().tagged = false;
        Ok(())
    }
}
