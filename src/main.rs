//! Scrollshot CLI
//!
//! Full-page screenshots of scrolling web pages, from the command line or as
//! a line-delimited JSON server on stdio.

use clap::{Parser, Subcommand};
use scrollshot::browser::{capture_page, BrowserConfig};
use scrollshot::capture::PipelineConfig;
use scrollshot::output::{Delivered, Deliverer, ImageSink};
use scrollshot::settings::{CaptureSettings, FileSettings, OutputAction, SettingsSource};
use scrollshot::{CaptureServer, Error, Result};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Scrollshot full-page screenshot tool
#[derive(Parser, Debug)]
#[command(name = "scrollshot")]
#[command(version)]
#[command(about = "Capture full-page screenshots of scrolling web pages")]
struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(flatten)]
    browser: BrowserArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args, Debug)]
struct BrowserArgs {
    /// Viewport width in CSS pixels
    #[arg(long, global = true, default_value = "1280")]
    width: u32,

    /// Viewport height in CSS pixels
    #[arg(long, global = true, default_value = "800")]
    height: u32,

    /// Device scale factor
    #[arg(long, global = true)]
    scale: Option<f64>,

    /// Path to Chrome/Chromium executable
    #[arg(long, global = true)]
    chrome_path: Option<String>,

    /// Show the browser window
    #[arg(long, global = true)]
    headed: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Capture a page and deliver the image
    Capture {
        /// Page to capture
        url: String,

        /// What to do with the image: open, download, or copy
        #[arg(short, long)]
        action: Option<OutputAction>,

        /// Directory or file path for downloads
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Settings file (JSON)
        #[arg(short, long)]
        settings: Option<PathBuf>,

        /// Capture only the visible viewport
        #[arg(long)]
        no_scroll: bool,

        /// Ask for the download location
        #[arg(long)]
        save_as: bool,
    },
    /// Serve JSON requests on stdin/stdout, one per line
    Serve {
        /// Settings file (JSON)
        #[arg(short, long)]
        settings: Option<PathBuf>,
    },
}

impl BrowserArgs {
    fn config(&self) -> BrowserConfig {
        let mut builder = BrowserConfig::builder()
            .headless(!self.headed)
            .viewport(self.width, self.height);
        if let Some(scale) = self.scale {
            builder = builder.device_scale_factor(scale);
        }
        if let Some(ref path) = self.chrome_path {
            builder = builder.chrome_path(path.clone());
        }
        builder.build()
    }
}

async fn load_settings(path: Option<PathBuf>) -> Result<CaptureSettings> {
    match path {
        Some(path) => FileSettings::new(path).get_settings().await,
        None => Ok(CaptureSettings::default()),
    }
}

async fn run(args: Args) -> Result<()> {
    let browser = args.browser.config();
    let pipeline = PipelineConfig::default();

    match args.command {
        Command::Capture {
            url,
            action,
            output,
            settings,
            no_scroll,
            save_as,
        } => {
            let mut settings = load_settings(settings).await?;
            if let Some(action) = action {
                settings.default_action = action;
            }
            if no_scroll {
                settings.scrolling_enabled = false;
            }
            settings.save_as |= save_as;

            let image = capture_page(&browser, &pipeline, &url, &settings).await?;

            let deliverer = match output {
                Some(path) if path.extension().is_some() => {
                    Deliverer::new(std::env::current_dir()?).save_path(path)
                }
                Some(dir) => Deliverer::new(dir),
                None => Deliverer::new(std::env::current_dir()?),
            };
            let delivered = deliverer
                .deliver(&image, settings.default_action, settings.save_as)
                .await?;
            match delivered {
                Delivered::Opened(path) | Delivered::Saved(path) => {
                    println!("{}", path.display())
                }
                Delivered::Copied(backend) => println!("Copied to clipboard via {}", backend),
            }
            Ok(())
        }
        Command::Serve { settings } => {
            let source = FileSettings::new(
                settings.unwrap_or_else(|| PathBuf::from("scrollshot.json")),
            );
            CaptureServer::new(browser, pipeline, source).run().await
        }
    }
}

/// One-line message shown on stderr for a failed run
fn user_message(err: &Error) -> String {
    match err {
        Error::Output(e) => format!("could not deliver the screenshot: {}", e),
        e => e.to_string(),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_interrupt() => {
            tracing::info!("Capture interrupted: {}", e);
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("Capture failed: {}", e);
            eprintln!("scrollshot: {}", user_message(&e));
            ExitCode::FAILURE
        }
    }
}
