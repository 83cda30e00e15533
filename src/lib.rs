//! Scrollshot - full-page screenshots of scrolling web pages
//!
//! Browsers only capture what is inside the viewport. This crate captures
//! pages taller than the viewport by scrolling the page's main scroll
//! container one viewport at a time, capturing each position, and stitching
//! the segments into a single PNG.
//!
//! # Architecture
//!
//! ```text
//! CLI / stdio server ──▶ CaptureFacade ──▶ ScrollTargetResolver
//!                             │                 │
//!                             │                 ▼
//!                             │           PageSettler (warm-up pass)
//!                             │                 │
//!                             │                 ▼
//!                             │           SegmentCapturer ──▶ OverlaySuppressor
//!                             │                 │
//!                             ▼                 ▼
//!                        Deliverer ◀──────  Stitcher
//!                  (open, download, copy)
//! ```
//!
//! Everything in [`capture`] talks to the page through the
//! [`CaptureSurface`](capture::CaptureSurface) trait; [`browser::CdpSurface`]
//! is the Chromium implementation.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use scrollshot::browser::{BrowserConfig, BrowserController, CdpSurface};
//! use scrollshot::capture::CaptureFacade;
//! use scrollshot::settings::CaptureSettings;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let controller = BrowserController::launch(BrowserConfig::default()).await?;
//!     let page = controller.open("https://example.com").await?;
//!
//!     let surface = CdpSurface::new(page);
//!     let image = CaptureFacade::new(&surface)
//!         .run(&CaptureSettings::default())
//!         .await?;
//!
//!     std::fs::write("page.png", &image.png)?;
//!     controller.close().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod browser;
pub mod capture;
pub mod error;
pub mod output;
pub mod protocol;
pub mod server;
pub mod settings;

// Re-exports for convenience
pub use browser::{capture_page, BrowserConfig, BrowserController, CdpSurface};
pub use capture::{CaptureFacade, CaptureSurface, PipelineConfig, StitchedImage};
pub use error::{Error, Result};
pub use output::{Delivered, Deliverer, ImageSink};
pub use protocol::{Request, Response};
pub use server::CaptureServer;
pub use settings::{CaptureSettings, FileSettings, OutputAction, SettingsSource};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
