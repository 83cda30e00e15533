//! Request/response protocol
//!
//! One request enum, one response enum, tagged by a `type` field. Every
//! request kind is matched exhaustively by the server, so adding a variant
//! fails to compile until it is handled.

use crate::capture::StitchedImage;
use crate::error::Error;
use crate::settings::CaptureSettings;
use serde::{Deserialize, Serialize};

/// Requests accepted by the capture server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Liveness check
    Ping,
    /// Current capture settings
    GetSettings,
    /// Capture `url` (full page unless the settings disable scrolling)
    Capture {
        /// Page to capture
        url: String,
        /// Overrides the stored settings
        #[serde(default, skip_serializing_if = "Option::is_none")]
        settings: Option<CaptureSettings>,
    },
    /// Capture only the visible viewport of `url`
    CaptureViewport {
        /// Page to capture
        url: String,
    },
}

/// Responses produced by the capture server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Answer to [`Request::Ping`]
    Pong,
    /// Answer to [`Request::GetSettings`]
    Settings {
        /// Current settings
        settings: CaptureSettings,
    },
    /// A finished capture
    Image {
        /// Width in pixels
        width: u32,
        /// Height in pixels
        height: u32,
        /// MIME type of `data`
        #[serde(rename = "mimeType")]
        mime_type: String,
        /// Base64-encoded image
        data: String,
    },
    /// The request failed
    Error {
        /// Human-readable message
        message: String,
    },
    /// The page went away mid-capture; not an error
    Interrupted,
}

impl Response {
    /// Response for a failed request; interrupts stay silent
    pub fn from_error(err: &Error) -> Self {
        if err.is_interrupt() {
            Response::Interrupted
        } else {
            Response::Error {
                message: err.to_string(),
            }
        }
    }
}

impl From<&StitchedImage> for Response {
    fn from(image: &StitchedImage) -> Self {
        Response::Image {
            width: image.width,
            height: image.height,
            mime_type: image.mime_type().to_string(),
            data: image.to_base64(),
        }
    }
}
