//! Segment compositing
//!
//! Stacks the captured segments on one canvas. Every segment but the last
//! is drawn at full height. The final scroll step is usually shorter than a
//! viewport, so only the bottom part of the last capture is new content;
//! it is cropped to exactly the rows still missing.
//!
//! ```text
//!   canvas                 segments
//!   ┌──────────┐ 0
//!   │ seg 0    │ ◀── full
//!   ├──────────┤ h0
//!   │ seg 1    │ ◀── full
//!   ├──────────┤ h0+h1
//!   │ seg 2 ▼  │ ◀── bottom `remaining` rows only
//!   └──────────┘ (final_offset + viewport_height) * scale
//! ```

use crate::capture::orchestrator::{CaptureRun, CaptureSegment};
use crate::capture::surface::Rect;
use crate::error::{Result, StitchError};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use image::{imageops, DynamicImage, ImageOutputFormat, RgbaImage};
use std::io::Cursor;
use tracing::{debug, info, instrument};

/// Geometry of a capture session in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StitchLayout {
    /// Layout viewport width; captures are this wide times the device scale
    pub css_width: f64,
    /// Visible height of the scroll target
    pub viewport_height: f64,
    /// Last actual scroll offset
    pub final_offset: f64,
    /// Region of each capture that shows the scroll target
    pub clip: Option<Rect>,
}

impl From<&CaptureRun> for StitchLayout {
    fn from(run: &CaptureRun) -> Self {
        Self {
            css_width: run.viewport.width,
            viewport_height: run.target.viewport_height,
            final_offset: run.final_offset,
            clip: run.target.clip,
        }
    }
}

/// Where one segment lands on the canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    /// Segment index
    pub segment: usize,
    /// First source row drawn
    pub source_y: u32,
    /// Rows drawn
    pub height: u32,
    /// Canvas row of the first drawn row
    pub dest_y: u32,
}

/// Lay out segments of the given pixel heights on a canvas of
/// `canvas_height` rows.
///
/// Non-final segments are stacked at full height. The last one contributes
/// its bottom `canvas_height - drawn` rows. The canvas is shrunk when the
/// last segment is shorter than the rows still missing, so the result never
/// has blank rows. Returns the placements and the final canvas height; the
/// placements tile `0..height` with no gap and no overlap.
pub fn plan_placements(heights: &[u32], canvas_height: u32) -> (Vec<Placement>, u32) {
    let Some((&last_height, leading)) = heights.split_last() else {
        return (Vec::new(), 0);
    };

    let mut placements = Vec::with_capacity(heights.len());
    let mut drawn = 0u32;
    for (segment, &height) in leading.iter().enumerate() {
        if drawn >= canvas_height {
            break;
        }
        let height = height.min(canvas_height - drawn);
        placements.push(Placement {
            segment,
            source_y: 0,
            height,
            dest_y: drawn,
        });
        drawn += height;
    }

    let remaining = canvas_height.saturating_sub(drawn);
    let canvas_height = if remaining > last_height {
        drawn + last_height
    } else {
        canvas_height
    };

    let remaining = canvas_height - drawn;
    if remaining > 0 {
        placements.push(Placement {
            segment: leading.len(),
            source_y: last_height - remaining,
            height: remaining,
            dest_y: drawn,
        });
    }

    (placements, canvas_height)
}

/// Final composited screenshot
#[derive(Debug, Clone, PartialEq)]
pub struct StitchedImage {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// PNG-encoded image
    pub png: Vec<u8>,
}

impl StitchedImage {
    /// PNG bytes as base64
    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.png)
    }

    /// PNG bytes as a `data:` URL
    pub fn to_data_url(&self) -> String {
        format!("data:image/png;base64,{}", self.to_base64())
    }

    /// MIME type of the encoded image
    pub fn mime_type(&self) -> &'static str {
        "image/png"
    }
}

/// Composites capture segments into one image
pub struct Stitcher;

impl Stitcher {
    /// Stitch the segments of a capture run
    pub fn stitch_run(run: &CaptureRun) -> Result<StitchedImage> {
        Self::stitch(&run.segments, StitchLayout::from(run))
    }

    /// Decode, crop and stack `segments` according to `layout`.
    ///
    /// Fails without producing anything if any segment cannot be decoded.
    #[instrument(skip(segments), fields(segments = segments.len()))]
    pub fn stitch(segments: &[CaptureSegment], layout: StitchLayout) -> Result<StitchedImage> {
        if segments.is_empty() {
            return Err(StitchError::NoSegments.into());
        }
        if layout.css_width <= 0.0 || layout.viewport_height <= 0.0 {
            return Err(StitchError::InvalidLayout(format!(
                "css_width={} viewport_height={}",
                layout.css_width, layout.viewport_height
            ))
            .into());
        }

        let decoded = segments
            .iter()
            .enumerate()
            .map(|(index, segment)| decode_segment(index, &segment.image))
            .collect::<Result<Vec<_>>>()?;

        let scale = decoded[0].width() as f64 / layout.css_width;
        let images: Vec<RgbaImage> = match layout.clip {
            Some(clip) => decoded
                .into_iter()
                .map(|img| clip_image(img, clip, scale))
                .collect(),
            None => decoded,
        };

        let width = images[0].width();
        let canvas_height = if images.len() == 1 {
            images[0].height()
        } else {
            ((layout.final_offset + layout.viewport_height) * scale).round() as u32
        };
        let heights: Vec<u32> = images.iter().map(|img| img.height()).collect();
        let (placements, canvas_height) = plan_placements(&heights, canvas_height);

        debug!(
            "Stitching {} segments at scale {:.3} onto {}x{}",
            images.len(),
            scale,
            width,
            canvas_height
        );

        let mut canvas = RgbaImage::new(width, canvas_height);
        for placement in &placements {
            let source = &images[placement.segment];
            let piece = imageops::crop_imm(
                source,
                0,
                placement.source_y,
                source.width().min(width),
                placement.height,
            )
            .to_image();
            imageops::replace(&mut canvas, &piece, 0, placement.dest_y as i64);
        }

        let png = encode_png(canvas)?;
        info!(
            "Stitched image: {}x{} ({} bytes)",
            width,
            canvas_height,
            png.len()
        );

        Ok(StitchedImage {
            width,
            height: canvas_height,
            png,
        })
    }
}

/// Decode raw image bytes or a base64 `data:` URL
fn decode_segment(index: usize, bytes: &[u8]) -> Result<RgbaImage> {
    let decode_error = |reason: String| StitchError::Decode {
        segment: index,
        reason,
    };

    let raw;
    let bytes = if bytes.starts_with(b"data:") {
        let comma = bytes
            .iter()
            .position(|&b| b == b',')
            .ok_or_else(|| decode_error("data URL without payload".to_string()))?;
        raw = BASE64
            .decode(&bytes[comma + 1..])
            .map_err(|e| decode_error(e.to_string()))?;
        raw.as_slice()
    } else {
        bytes
    };

    let image = image::load_from_memory(bytes).map_err(|e| decode_error(e.to_string()))?;
    Ok(image.to_rgba8())
}

/// Cut the scroll target's region out of a full-viewport capture
fn clip_image(image: RgbaImage, clip: Rect, scale: f64) -> RgbaImage {
    let x = ((clip.left * scale).round().max(0.0) as u32).min(image.width());
    let y = ((clip.top * scale).round().max(0.0) as u32).min(image.height());
    let width = ((clip.width * scale).round() as u32).min(image.width() - x);
    let height = ((clip.height * scale).round() as u32).min(image.height() - y);
    imageops::crop_imm(&image, x, y, width, height).to_image()
}

fn encode_png(canvas: RgbaImage) -> Result<Vec<u8>> {
    let mut png = Vec::new();
    DynamicImage::ImageRgba8(canvas)
        .write_to(&mut Cursor::new(&mut png), ImageOutputFormat::Png)
        .map_err(|e| StitchError::Encode(e.to_string()))?;
    Ok(png)
}
