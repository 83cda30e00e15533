//! Error types for Scrollshot
//!
//! This module provides the error hierarchy for the capture pipeline using
//! `thiserror`. Each pipeline stage owns a nested enum; the top-level
//! [`Error`] wraps them so `?` works across stage boundaries.

use thiserror::Error;

/// CDP error messages that mean the page went away underneath us.
const INTERRUPT_SIGNATURES: &[&str] = &[
    "Execution context was destroyed",
    "Cannot find context with specified id",
    "Inspected target navigated or closed",
    "Target closed",
    "No target with given id",
];

/// The main error type for Scrollshot operations
#[derive(Error, Debug)]
pub enum Error {
    /// Browser-related errors
    #[error("Browser error: {0}")]
    Browser(#[from] BrowserError),

    /// Navigation errors
    #[error("Navigation error: {0}")]
    Navigation(#[from] NavigationError),

    /// Segment capture errors
    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    /// Stitching errors
    #[error("Stitch error: {0}")]
    Stitch(#[from] StitchError),

    /// Output delivery errors
    #[error("Output error: {0}")]
    Output(#[from] OutputError),

    /// The page was torn down mid-capture (navigation, tab closed)
    #[error("Capture interrupted: {0}")]
    Interrupted(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// ChromiumOxide errors
    #[error("CDP error: {0}")]
    Cdp(String),

    /// Generic error with message
    #[error("{0}")]
    Generic(String),
}

/// Browser lifecycle and control errors
#[derive(Error, Debug)]
pub enum BrowserError {
    /// Failed to launch browser
    #[error("Failed to launch browser: {0}")]
    LaunchFailed(String),

    /// Browser configuration error
    #[error("Invalid browser configuration: {0}")]
    ConfigError(String),

    /// Failed to create new page/tab
    #[error("Failed to create page: {0}")]
    PageCreationFailed(String),

    /// Page script evaluation failed
    #[error("Page script failed: {0}")]
    ScriptFailed(String),
}

/// Navigation errors
#[derive(Error, Debug)]
pub enum NavigationError {
    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Navigation timeout
    #[error("Navigation timed out after {0}ms")]
    Timeout(u64),

    /// Page load failed
    #[error("Page load failed: {0}")]
    LoadFailed(String),
}

/// Errors from the visible-region capture primitive
#[derive(Error, Debug)]
pub enum CaptureError {
    /// The primitive reported an error
    #[error("Screenshot capture failed: {0}")]
    PrimitiveFailed(String),

    /// The primitive returned no image data
    #[error("Screenshot of segment {segment} returned no image data")]
    EmptyPayload {
        /// Zero-based segment index
        segment: usize,
    },

    /// The primitive did not answer in time
    #[error("Capture timed out after {0}ms")]
    Timeout(u64),
}

/// Errors while compositing segments
#[derive(Error, Debug)]
pub enum StitchError {
    /// A segment could not be decoded into a drawable image
    #[error("Failed to decode segment {segment}: {reason}")]
    Decode {
        /// Zero-based segment index
        segment: usize,
        /// Decoder message
        reason: String,
    },

    /// Nothing to stitch
    #[error("No segments to stitch")]
    NoSegments,

    /// Layout is unusable (zero width, zero viewport)
    #[error("Invalid stitch layout: {0}")]
    InvalidLayout(String),

    /// Final PNG encoding failed
    #[error("Failed to encode stitched image: {0}")]
    Encode(String),
}

/// Errors delivering the finished image
#[derive(Error, Debug)]
pub enum OutputError {
    /// Writing the image to disk failed
    #[error("Failed to write {path}: {reason}")]
    WriteFailed {
        /// Destination path
        path: String,
        /// Underlying error
        reason: String,
    },

    /// No usable clipboard backend on this system
    #[error("No clipboard backend available (tried: {0})")]
    ClipboardUnavailable(String),

    /// The native clipboard rejected the image
    #[error("Clipboard write failed: {0}")]
    ClipboardFailed(String),

    /// An external helper (viewer, clipboard tool) exited unsuccessfully
    #[error("{program} failed: {reason}")]
    HelperFailed {
        /// Program name
        program: String,
        /// Exit status or spawn error
        reason: String,
    },
}

/// Result type alias for Scrollshot operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a generic error from a string
    pub fn generic<S: Into<String>>(msg: S) -> Self {
        Error::Generic(msg.into())
    }

    /// Create a CDP error from a string
    pub fn cdp<S: Into<String>>(msg: S) -> Self {
        Error::Cdp(msg.into())
    }

    /// Whether this error means the page context was torn down.
    ///
    /// Interrupts are user-caused (they navigated away) and are reported
    /// silently rather than as failures.
    pub fn is_interrupt(&self) -> bool {
        match self {
            Error::Interrupted(_) => true,
            Error::Cdp(msg) => is_interrupt_message(msg),
            Error::Capture(CaptureError::PrimitiveFailed(msg)) => is_interrupt_message(msg),
            Error::Browser(BrowserError::ScriptFailed(msg)) => is_interrupt_message(msg),
            _ => false,
        }
    }
}

/// Check a raw CDP error message against the known teardown signatures
pub fn is_interrupt_message(msg: &str) -> bool {
    INTERRUPT_SIGNATURES.iter().any(|sig| msg.contains(sig))
}

/// Convert chromiumoxide errors
impl From<chromiumoxide::error::CdpError> for Error {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        let msg = err.to_string();
        if is_interrupt_message(&msg) {
            Error::Interrupted(msg)
        } else {
            Error::Cdp(msg)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Browser(BrowserError::LaunchFailed("no chrome".to_string()));
        assert!(err.to_string().contains("Failed to launch browser"));
        assert!(err.to_string().contains("no chrome"));
    }

    #[test]
    fn test_capture_error_display() {
        let err = CaptureError::EmptyPayload { segment: 2 };
        assert_eq!(
            err.to_string(),
            "Screenshot of segment 2 returned no image data"
        );
    }

    #[test]
    fn test_stitch_error_display() {
        let err = StitchError::Decode {
            segment: 1,
            reason: "bad header".to_string(),
        };
        assert!(err.to_string().contains("segment 1"));
        assert!(err.to_string().contains("bad header"));
    }

    #[test]
    fn test_interrupt_detection() {
        assert!(Error::Interrupted("gone".into()).is_interrupt());
        assert!(Error::cdp("Execution context was destroyed.").is_interrupt());
        assert!(Error::Capture(CaptureError::PrimitiveFailed(
            "Target closed".to_string()
        ))
        .is_interrupt());
        assert!(!Error::cdp("Invalid parameters").is_interrupt());
        assert!(!Error::generic("Target closed").is_interrupt());
    }

    #[test]
    fn test_generic_error() {
        let err = Error::generic("something went wrong");
        assert_eq!(err.to_string(), "something went wrong");
    }
}
