//! Browser and server configuration tests
//!
//! These tests cover configuration, URL validation and the request
//! protocol. Capturing a real page needs a running Chrome/Chromium
//! instance and is not exercised here.

use scrollshot::browser::{validate_url, BrowserConfig, NavigationOptions};
use scrollshot::capture::PipelineConfig;
use scrollshot::protocol::{Request, Response};
use scrollshot::settings::{CaptureSettings, FileSettings, OutputAction};
use scrollshot::CaptureServer;
use std::io::Write;
use std::time::Duration;

#[test]
fn test_browser_config_default() {
    let config = BrowserConfig::default();
    assert!(config.headless);
    assert_eq!(config.width, 1280);
    assert_eq!(config.height, 800);
    assert!(config.sandbox);
    assert_eq!(config.timeout_ms, 30000);
    assert!(config.chrome_path.is_none());
    assert!(config.extra_args.is_empty());
}

#[test]
fn test_browser_config_builder() {
    let config = BrowserConfig::builder()
        .headless(false)
        .viewport(1024, 768)
        .chrome_path("/usr/bin/chromium")
        .arg("--disable-gpu")
        .arg("--no-first-run")
        .build();

    assert!(!config.headless);
    assert_eq!((config.width, config.height), (1024, 768));
    assert_eq!(config.chrome_path.as_deref(), Some("/usr/bin/chromium"));
    assert_eq!(config.extra_args.len(), 2);
    assert_eq!(
        config.chrome_args(),
        vec!["--hide-scrollbars", "--disable-gpu", "--no-first-run"]
    );
}

#[test]
fn test_navigation_options_default() {
    let opts = NavigationOptions::default();
    assert_eq!(opts.timeout_ms, 30000);
    assert_eq!(opts.retries, 2);
}

#[test]
fn test_validate_url() {
    assert!(validate_url("https://example.com/feed").is_ok());
    assert!(validate_url("javascript:alert(1)").is_err());
    assert!(validate_url("not a url").is_err());
}

#[test]
fn test_pipeline_config() {
    let config = PipelineConfig::default();
    assert_eq!(config.settle_delay, Duration::from_millis(100));
    assert_eq!(config.capture_timeout, Duration::from_secs(30));
    assert_eq!(config.single_capture_delay, Duration::from_millis(250));

    let config = PipelineConfig::immediate().capture_timeout(Duration::from_secs(5));
    assert_eq!(config.settle_delay, Duration::ZERO);
    assert_eq!(config.capture_timeout, Duration::from_secs(5));
}

#[tokio::test]
async fn test_server_reads_settings_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{"defaultAction":"download","scrollingEnabled":false}}"#
    )
    .unwrap();

    let server = CaptureServer::new(
        BrowserConfig::default(),
        PipelineConfig::default(),
        FileSettings::new(file.path()),
    );
    let response = server.handle_line(r#"{"type":"get_settings"}"#).await;

    assert_eq!(
        response,
        Response::Settings {
            settings: CaptureSettings {
                default_action: OutputAction::Download,
                save_as: false,
                scrolling_enabled: false,
            }
        }
    );
}

#[tokio::test]
async fn test_server_reports_bad_settings_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{{ not json").unwrap();

    let server = CaptureServer::new(
        BrowserConfig::default(),
        PipelineConfig::default(),
        FileSettings::new(file.path()),
    );
    let response = server.handle(Request::GetSettings).await;

    assert!(matches!(response, Response::Error { .. }));
}
