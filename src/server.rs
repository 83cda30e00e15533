//! Stdio capture server
//!
//! Reads one JSON [`Request`] per line on stdin and writes one JSON
//! [`Response`] per line on stdout. Requests are served one at a time: a
//! capture owns its page until it finishes.

use crate::browser::{capture_page, BrowserConfig};
use crate::capture::PipelineConfig;
use crate::error::Result;
use crate::protocol::{Request, Response};
use crate::settings::{CaptureSettings, SettingsSource};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, error, info, instrument, warn};

/// Capture server state
pub struct CaptureServer<C> {
    browser: BrowserConfig,
    pipeline: PipelineConfig,
    settings: C,
}

impl<C: SettingsSource> CaptureServer<C> {
    /// Create a new server
    pub fn new(browser: BrowserConfig, pipeline: PipelineConfig, settings: C) -> Self {
        Self {
            browser,
            pipeline,
            settings,
        }
    }

    /// Serve requests until stdin closes
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<()> {
        info!("Starting capture server v{}", crate::VERSION);

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdout = tokio::io::stdout();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            debug!("Received: {}", line);

            let response = self.handle_line(&line).await;
            let json = serde_json::to_string(&response).unwrap_or_else(|e| {
                error!("Failed to serialize response: {}", e);
                r#"{"type":"error","message":"Internal error"}"#.to_string()
            });

            stdout.write_all(json.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
        }

        info!("Capture server shutting down");
        Ok(())
    }

    /// Handle a single line of input
    pub async fn handle_line(&self, line: &str) -> Response {
        match serde_json::from_str::<Request>(line) {
            Ok(request) => self.handle(request).await,
            Err(e) => {
                warn!("Failed to parse request: {}", e);
                Response::Error {
                    message: format!("Invalid request: {}", e),
                }
            }
        }
    }

    /// Dispatch a request
    #[instrument(skip(self))]
    pub async fn handle(&self, request: Request) -> Response {
        let outcome = match request {
            Request::Ping => return Response::Pong,
            Request::GetSettings => {
                return match self.settings.get_settings().await {
                    Ok(settings) => Response::Settings { settings },
                    Err(e) => Response::from_error(&e),
                };
            }
            Request::Capture { url, settings } => {
                let settings = match settings {
                    Some(settings) => Ok(settings),
                    None => self.settings.get_settings().await,
                };
                match settings {
                    Ok(settings) => {
                        capture_page(&self.browser, &self.pipeline, &url, &settings).await
                    }
                    Err(e) => Err(e),
                }
            }
            Request::CaptureViewport { url } => {
                let settings = CaptureSettings {
                    scrolling_enabled: false,
                    ..CaptureSettings::default()
                };
                capture_page(&self.browser, &self.pipeline, &url, &settings).await
            }
        };

        match outcome {
            Ok(image) => Response::from(&image),
            Err(e) => {
                if e.is_interrupt() {
                    info!("Capture interrupted: {}", e);
                } else {
                    error!("Capture failed: {}", e);
                }
                Response::from_error(&e)
            }
        }
    }
}
