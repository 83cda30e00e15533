//! Delivery of finished screenshots
//!
//! The three output actions map to three local facilities: an image viewer
//! (`open`), the filesystem (`download`) and the clipboard (`copy`).

use crate::capture::StitchedImage;
use crate::error::{Error, OutputError, Result};
use crate::settings::OutputAction;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument};

/// Where a delivered image ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivered {
    /// Written to this path and shown in a viewer
    Opened(PathBuf),
    /// Saved to this path
    Saved(PathBuf),
    /// Placed on the clipboard by this backend
    Copied(String),
}

/// Destination for finished images
#[allow(async_fn_in_trait)]
pub trait ImageSink {
    /// Hand `image` to the facility behind `action`
    async fn deliver(
        &self,
        image: &StitchedImage,
        action: OutputAction,
        save_as: bool,
    ) -> Result<Delivered>;
}

/// A program that reads PNG bytes on stdin and puts them on the clipboard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipboardHelper {
    /// Executable name, looked up on `PATH`
    pub program: String,
    /// Arguments
    pub args: Vec<String>,
}

impl ClipboardHelper {
    /// Helper from a program name and arguments
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// One way of putting an image on the clipboard
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClipboardBackend {
    /// The platform clipboard, through `arboard`
    Native,
    /// An external helper program
    Helper(ClipboardHelper),
}

impl ClipboardBackend {
    /// Name reported back to the caller after a copy
    pub fn name(&self) -> &str {
        match self {
            ClipboardBackend::Native => "system clipboard",
            ClipboardBackend::Helper(helper) => &helper.program,
        }
    }

    async fn is_available(&self) -> bool {
        match self {
            ClipboardBackend::Native => {
                tokio::task::spawn_blocking(|| arboard::Clipboard::new().is_ok())
                    .await
                    .unwrap_or(false)
            }
            ClipboardBackend::Helper(helper) => which::which(&helper.program).is_ok(),
        }
    }
}

// X11 drops clipboard contents when the owning process exits, so on Linux
// the forking helpers come first and the native clipboard is the fallback.
fn default_clipboard_backends() -> Vec<ClipboardBackend> {
    if cfg!(target_os = "linux") {
        vec![
            ClipboardBackend::Helper(ClipboardHelper::new("wl-copy", &["--type", "image/png"])),
            ClipboardBackend::Helper(ClipboardHelper::new(
                "xclip",
                &["-selection", "clipboard", "-t", "image/png"],
            )),
            ClipboardBackend::Native,
        ]
    } else {
        vec![ClipboardBackend::Native]
    }
}

/// Owned clipboard state.
///
/// Choosing a backend happens once. Callers that arrive while setup is
/// running wait on the same setup instead of starting their own.
#[derive(Debug)]
pub struct ClipboardBridge {
    candidates: Vec<ClipboardBackend>,
    backend: OnceCell<ClipboardBackend>,
}

impl Default for ClipboardBridge {
    fn default() -> Self {
        Self::with_candidates(default_clipboard_backends())
    }
}

impl ClipboardBridge {
    /// Bridge trying `candidates` in order
    pub fn with_candidates(candidates: Vec<ClipboardBackend>) -> Self {
        Self {
            candidates,
            backend: OnceCell::new(),
        }
    }

    /// The first usable candidate
    pub async fn backend(&self) -> Result<&ClipboardBackend> {
        self.backend
            .get_or_try_init(|| async {
                for candidate in &self.candidates {
                    if candidate.is_available().await {
                        debug!("Using clipboard backend {}", candidate.name());
                        return Ok(candidate.clone());
                    }
                }
                let tried: Vec<&str> = self.candidates.iter().map(|c| c.name()).collect();
                Err(Error::from(OutputError::ClipboardUnavailable(
                    tried.join(", "),
                )))
            })
            .await
    }

    /// Put `png` on the clipboard, returning the backend's name
    #[instrument(skip(self, png), fields(bytes = png.len()))]
    pub async fn write_png(&self, png: &[u8]) -> Result<String> {
        let backend = self.backend().await?;
        match backend {
            ClipboardBackend::Native => write_native(png.to_vec()).await?,
            ClipboardBackend::Helper(helper) => write_helper(helper, png).await?,
        }
        Ok(backend.name().to_string())
    }
}

async fn write_native(png: Vec<u8>) -> Result<()> {
    tokio::task::spawn_blocking(move || -> Result<()> {
        let rgba = image::load_from_memory(&png)
            .map_err(|e| OutputError::ClipboardFailed(e.to_string()))?
            .to_rgba8();
        let data = arboard::ImageData {
            width: rgba.width() as usize,
            height: rgba.height() as usize,
            bytes: rgba.into_raw().into(),
        };
        arboard::Clipboard::new()
            .and_then(|mut clipboard| clipboard.set_image(data))
            .map_err(|e| OutputError::ClipboardFailed(e.to_string()))?;
        Ok(())
    })
    .await
    .map_err(|e| Error::generic(format!("Clipboard task failed: {}", e)))?
}

async fn write_helper(helper: &ClipboardHelper, png: &[u8]) -> Result<()> {
    let failed = |reason: String| OutputError::HelperFailed {
        program: helper.program.clone(),
        reason,
    };

    let mut child = Command::new(&helper.program)
        .args(&helper.args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .spawn()
        .map_err(|e| failed(e.to_string()))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(png)
            .await
            .map_err(|e| failed(e.to_string()))?;
    }

    let status = child.wait().await.map_err(|e| failed(e.to_string()))?;
    if !status.success() {
        return Err(failed(status.to_string()).into());
    }
    Ok(())
}

fn default_viewer() -> Vec<String> {
    let cmd: &[&str] = if cfg!(target_os = "macos") {
        &["open"]
    } else if cfg!(target_os = "windows") {
        &["cmd", "/C", "start", ""]
    } else {
        &["xdg-open"]
    };
    cmd.iter().map(|s| s.to_string()).collect()
}

/// File name for a capture taken now
pub fn default_file_name() -> String {
    format!(
        "screenshot-{}.png",
        chrono::Local::now().format("%Y%m%d-%H%M%S")
    )
}

/// Local delivery of screenshots
#[derive(Debug)]
pub struct Deliverer {
    output_dir: PathBuf,
    save_path: Option<PathBuf>,
    viewer: Vec<String>,
    clipboard: ClipboardBridge,
}

impl Deliverer {
    /// Deliverer saving into `output_dir`
    pub fn new(output_dir: impl AsRef<Path>) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            save_path: None,
            viewer: default_viewer(),
            clipboard: ClipboardBridge::default(),
        }
    }

    /// Always save downloads to this exact path
    pub fn save_path(mut self, path: impl AsRef<Path>) -> Self {
        self.save_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Viewer command; the image path is appended as the last argument
    pub fn viewer<S: Into<String>>(mut self, command: Vec<S>) -> Self {
        self.viewer = command.into_iter().map(Into::into).collect();
        self
    }

    /// Clipboard bridge to use for `copy`
    pub fn clipboard(mut self, clipboard: ClipboardBridge) -> Self {
        self.clipboard = clipboard;
        self
    }

    async fn download(&self, image: &StitchedImage, save_as: bool) -> Result<PathBuf> {
        let default_path = self.output_dir.join(default_file_name());
        let path = match (&self.save_path, save_as) {
            (Some(path), _) => path.clone(),
            (None, true) => prompt_for_path(&default_path).await?,
            (None, false) => default_path,
        };
        write_image(&path, image).await?;
        Ok(path)
    }

    async fn open(&self, image: &StitchedImage) -> Result<PathBuf> {
        let path = std::env::temp_dir().join(format!("scrollshot-{}", default_file_name()));
        write_image(&path, image).await?;

        let Some((program, args)) = self.viewer.split_first() else {
            return Ok(path);
        };
        let executable = which::which(program).map_err(|e| OutputError::HelperFailed {
            program: program.clone(),
            reason: e.to_string(),
        })?;
        let status = Command::new(executable)
            .args(args)
            .arg(&path)
            .stdin(Stdio::null())
            .status()
            .await
            .map_err(|e| OutputError::HelperFailed {
                program: program.clone(),
                reason: e.to_string(),
            })?;
        if !status.success() {
            return Err(OutputError::HelperFailed {
                program: program.clone(),
                reason: status.to_string(),
            }
            .into());
        }
        Ok(path)
    }
}

impl ImageSink for Deliverer {
    #[instrument(skip(self, image), fields(width = image.width, height = image.height))]
    async fn deliver(
        &self,
        image: &StitchedImage,
        action: OutputAction,
        save_as: bool,
    ) -> Result<Delivered> {
        let delivered = match action {
            OutputAction::Open => Delivered::Opened(self.open(image).await?),
            OutputAction::Download => Delivered::Saved(self.download(image, save_as).await?),
            OutputAction::Copy => Delivered::Copied(self.clipboard.write_png(&image.png).await?),
        };
        info!("Delivered screenshot: {:?}", delivered);
        Ok(delivered)
    }
}

async fn write_image(path: &Path, image: &StitchedImage) -> Result<()> {
    let write_failed = |e: std::io::Error| OutputError::WriteFailed {
        path: path.display().to_string(),
        reason: e.to_string(),
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(write_failed)?;
    }
    tokio::fs::write(path, &image.png)
        .await
        .map_err(write_failed)?;
    debug!("Wrote {} bytes to {}", image.png.len(), path.display());
    Ok(())
}

/// Ask on the terminal where to save; an empty answer keeps the default
async fn prompt_for_path(default: &Path) -> Result<PathBuf> {
    let mut stderr = tokio::io::stderr();
    stderr
        .write_all(format!("Save screenshot as [{}]: ", default.display()).as_bytes())
        .await?;
    stderr.flush().await?;

    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await?;
    let answer = line.trim();
    Ok(if answer.is_empty() {
        default.to_path_buf()
    } else {
        PathBuf::from(answer)
    })
}
