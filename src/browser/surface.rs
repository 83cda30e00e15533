//! CDP-backed capture surface
//!
//! Implements [`CaptureSurface`] on a live Chromium page. Elements reported
//! by [`CaptureSurface::elements`] are tagged with a `data-scrollshot-node`
//! attribute so later calls can find them again; the document scroller is
//! always node `0`. [`CaptureSurface::clear_node_tags`] removes the tags.

use crate::capture::surface::{
    CaptureSurface, ElementGeometry, NodeId, ScrollNode, StyleHandle, Viewport,
};
use crate::error::{is_interrupt_message, BrowserError, CaptureError, Error, Result};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::error::CdpError;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, instrument};

/// Attribute carrying a [`NodeId`] on tagged elements
pub const NODE_ATTRIBUTE: &str = "data-scrollshot-node";

/// Attribute carrying a [`StyleHandle`] on injected `<style>` elements
pub const STYLE_ATTRIBUTE: &str = "data-scrollshot-style";

/// Upper bound on the animation-frame wait; frames never fire in a
/// backgrounded tab
const FRAME_WAIT_LIMIT: Duration = Duration::from_secs(2);

const ELEMENTS_SCRIPT: &str = r#"
(() => {
    const ATTR = 'data-scrollshot-node';
    const POSITIONS = ['static', 'relative', 'absolute', 'fixed', 'sticky'];
    const OVERFLOWS = ['visible', 'hidden', 'clip', 'scroll', 'auto'];
    let next = window.__scrollshotNextNode || 1;
    const out = [];
    for (const el of document.querySelectorAll('body *')) {
        const style = getComputedStyle(el);
        const position = POSITIONS.includes(style.position) ? style.position : 'static';
        const overflowY = OVERFLOWS.includes(style.overflowY) ? style.overflowY : 'visible';
        const scrolls = (overflowY === 'auto' || overflowY === 'scroll')
            && el.scrollHeight > el.clientHeight;
        if (!scrolls && position !== 'fixed' && position !== 'sticky') {
            continue;
        }
        let id = el.getAttribute(ATTR);
        if (id === null) {
            id = String(next++);
            el.setAttribute(ATTR, id);
        }
        const r = el.getBoundingClientRect();
        out.push({
            node: Number(id),
            position,
            overflowY,
            rect: { top: r.top, left: r.left, width: r.width, height: r.height },
            clientWidth: el.clientWidth,
            clientHeight: el.clientHeight,
            scrollHeight: el.scrollHeight,
            hidden: style.display === 'none' || style.visibility === 'hidden',
        });
    }
    window.__scrollshotNextNode = next;
    return out;
})()
"#;

const DOCUMENT_SCRIPT: &str = r#"
(() => {
    const s = document.scrollingElement || document.documentElement;
    const body = document.body ? document.body.scrollHeight : 0;
    return {
        node: 0,
        position: 'static',
        overflowY: 'visible',
        rect: { top: 0, left: 0, width: window.innerWidth, height: window.innerHeight },
        clientWidth: s.clientWidth,
        clientHeight: window.innerHeight,
        scrollHeight: Math.max(s.scrollHeight, body),
        hidden: false,
    };
})()
"#;

const CLEAR_TAGS_SCRIPT: &str = r#"
(() => {
    for (const el of document.querySelectorAll('[data-scrollshot-node]')) {
        el.removeAttribute('data-scrollshot-node');
    }
    delete window.__scrollshotNextNode;
    return true;
})()
"#;

const FRAMES_SCRIPT: &str =
    "new Promise(r => requestAnimationFrame(() => requestAnimationFrame(() => r(true))))";

/// JavaScript expression for the element a [`ScrollNode`] refers to
fn node_expr(node: ScrollNode) -> String {
    match node {
        ScrollNode::Document => "(document.scrollingElement || document.documentElement)".into(),
        ScrollNode::Element(NodeId(id)) => format!(
            r#"(() => {{
                const el = document.querySelector('[{NODE_ATTRIBUTE}="{id}"]');
                if (!el) throw new Error('scroll target {id} is gone');
                return el;
            }})()"#
        ),
    }
}

fn script_error(e: CdpError) -> Error {
    let msg = e.to_string();
    if is_interrupt_message(&msg) {
        Error::Interrupted(msg)
    } else {
        BrowserError::ScriptFailed(msg).into()
    }
}

/// [`CaptureSurface`] driving a Chromium page over CDP
pub struct CdpSurface {
    page: Page,
    next_style: AtomicU64,
}

impl CdpSurface {
    /// Surface over an open page
    pub fn new(page: Page) -> Self {
        Self {
            page,
            next_style: AtomicU64::new(1),
        }
    }

    /// The page this surface drives
    pub fn page(&self) -> &Page {
        &self.page
    }

    async fn eval<T: DeserializeOwned>(&self, script: &str) -> Result<T> {
        self.page
            .evaluate(script)
            .await
            .map_err(script_error)?
            .into_value::<T>()
            .map_err(|e| BrowserError::ScriptFailed(e.to_string()).into())
    }

    async fn run(&self, script: &str) -> Result<()> {
        self.page
            .evaluate(script)
            .await
            .map_err(script_error)?;
        Ok(())
    }
}

impl CaptureSurface for CdpSurface {
    async fn viewport(&self) -> Result<Viewport> {
        self.eval("({ width: window.innerWidth, height: window.innerHeight })")
            .await
    }

    async fn document_scroller(&self) -> Result<ElementGeometry> {
        self.eval(DOCUMENT_SCRIPT).await
    }

    #[instrument(skip(self))]
    async fn elements(&self) -> Result<Vec<ElementGeometry>> {
        let elements: Vec<ElementGeometry> = self.eval(ELEMENTS_SCRIPT).await?;
        debug!("Inspected {} scrollers and overlays", elements.len());
        Ok(elements)
    }

    async fn scroll_to(&self, target: ScrollNode, y: f64) -> Result<()> {
        let script = match target {
            ScrollNode::Document => {
                format!("window.scrollTo({{ top: {y}, left: window.scrollX, behavior: 'instant' }})")
            }
            ScrollNode::Element(_) => format!(
                "{}.scrollTo({{ top: {y}, behavior: 'instant' }})",
                node_expr(target)
            ),
        };
        self.run(&script).await
    }

    async fn scroll_top(&self, target: ScrollNode) -> Result<f64> {
        let script = match target {
            ScrollNode::Document => "window.scrollY".to_string(),
            ScrollNode::Element(_) => format!("{}.scrollTop", node_expr(target)),
        };
        self.eval(&script).await
    }

    async fn scroll_height(&self, target: ScrollNode) -> Result<f64> {
        let script = match target {
            ScrollNode::Document => format!(
                "Math.max({}.scrollHeight, document.body ? document.body.scrollHeight : 0)",
                node_expr(target)
            ),
            ScrollNode::Element(_) => format!("{}.scrollHeight", node_expr(target)),
        };
        self.eval(&script).await
    }

    async fn insert_style(&self, css: &str) -> Result<StyleHandle> {
        let handle = StyleHandle(self.next_style.fetch_add(1, Ordering::Relaxed));
        let script = format!(
            r#"(() => {{
                const s = document.createElement('style');
                s.setAttribute('{STYLE_ATTRIBUTE}', '{}');
                s.textContent = {};
                (document.head || document.documentElement).appendChild(s);
                return true;
            }})()"#,
            handle.0,
            serde_json::to_string(css)?
        );
        self.run(&script).await?;
        Ok(handle)
    }

    async fn remove_style(&self, handle: StyleHandle) -> Result<()> {
        let script = format!(
            "document.querySelectorAll('style[{STYLE_ATTRIBUTE}=\"{}\"]').forEach(s => s.remove())",
            handle.0
        );
        self.run(&script).await
    }

    async fn set_marker(&self, nodes: &[NodeId], class: &str, on: bool) -> Result<()> {
        let ids: Vec<u32> = nodes.iter().map(|n| n.0).collect();
        let script = format!(
            r#"(() => {{
                for (const id of {}) {{
                    const el = document.querySelector('[{NODE_ATTRIBUTE}="' + id + '"]');
                    if (el) el.classList.toggle({}, {on});
                }}
                return true;
            }})()"#,
            serde_json::to_string(&ids)?,
            serde_json::to_string(class)?
        );
        self.run(&script).await
    }

    async fn settle(&self, min_delay: Duration) -> Result<()> {
        if !min_delay.is_zero() {
            tokio::time::sleep(min_delay).await;
        }
        match tokio::time::timeout(FRAME_WAIT_LIMIT, self.run(FRAMES_SCRIPT)).await {
            Ok(result) => result,
            Err(_) => {
                debug!("Animation frames did not fire, continuing");
                Ok(())
            }
        }
    }

    #[instrument(skip(self))]
    async fn capture_visible(&self) -> Result<Vec<u8>> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .from_surface(true)
            .capture_beyond_viewport(false)
            .build();

        let data = self.page.screenshot(params).await.map_err(|e| {
            let msg = e.to_string();
            if is_interrupt_message(&msg) {
                Error::Interrupted(msg)
            } else {
                CaptureError::PrimitiveFailed(msg).into()
            }
        })?;

        debug!("Viewport captured: {} bytes", data.len());
        Ok(data)
    }

    async fn clear_node_tags(&self) -> Result<()> {
        self.run(CLEAR_TAGS_SCRIPT).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_expr_document() {
        assert!(node_expr(ScrollNode::Document).contains("document.scrollingElement"));
    }

    #[test]
    fn test_node_expr_element() {
        let expr = node_expr(ScrollNode::Element(NodeId(42)));
        assert!(expr.contains(r#"[data-scrollshot-node="42"]"#));
        assert!(expr.contains("scroll target 42 is gone"));
    }

    #[test]
    fn test_scripts_report_expected_keys() {
        for key in ["clientWidth", "clientHeight", "scrollHeight", "overflowY"] {
            assert!(ELEMENTS_SCRIPT.contains(key));
            assert!(DOCUMENT_SCRIPT.contains(key));
        }
    }

    #[test]
    fn test_clear_tags_undoes_element_tagging() {
        assert!(ELEMENTS_SCRIPT.contains(NODE_ATTRIBUTE));
        assert!(CLEAR_TAGS_SCRIPT.contains(&format!("removeAttribute('{NODE_ATTRIBUTE}')")));
        assert!(ELEMENTS_SCRIPT.contains("window.__scrollshotNextNode"));
        assert!(CLEAR_TAGS_SCRIPT.contains("delete window.__scrollshotNextNode"));
    }
}
