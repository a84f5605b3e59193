// Clipboard glue: grab the current image into a temporary PNG file and
// put the resulting link back as text.
//
// On Linux the X11/Wayland selection is served by the process that set it
// and disappears when that process exits. `copy_text` therefore starts a
// detached copy of this binary with `SERVE_FLAG`, which keeps the text
// until another program takes the clipboard over.

use anyhow::{Context, Result};
use arboard::Clipboard;
use image::{ImageFormat, RgbaImage};
use tempfile::NamedTempFile;

#[cfg(target_os = "linux")]
use std::path::Path;
#[cfg(target_os = "linux")]
use std::process::{Command, Stdio};

/// Hidden flag the clipboard helper process is started with.
pub const SERVE_FLAG: &str = "--serve-clipboard";

/// Extension of the temporary file written for clipboard images.
pub const IMAGE_EXTENSION: &str = "png";

/// Returns `None` when the clipboard holds no image. The temp file is
/// removed when the returned handle is dropped.
pub fn capture_image() -> Result<Option<NamedTempFile>> {
    let mut clipboard = Clipboard::new().context("Failed to open clipboard")?;
    let data = match clipboard.get_image() {
        Ok(data) => data,
        Err(arboard::Error::ContentNotAvailable) => return Ok(None),
        Err(e) => return Err(e).context("Failed to read image from clipboard"),
    };
    tracing::debug!(width = data.width, height = data.height, "clipboard image");

    let width = u32::try_from(data.width).context("Clipboard image too wide")?;
    let height = u32::try_from(data.height).context("Clipboard image too tall")?;
    let pixels = RgbaImage::from_raw(width, height, data.bytes.into_owned())
        .context("Clipboard image has an unexpected pixel layout")?;

    let mut file = write_png(&pixels)?;
    file.as_file_mut().sync_all()?;
    Ok(Some(file))
}

/// Encode `pixels` as PNG into a fresh temp file ending in `.png`.
pub fn write_png(pixels: &RgbaImage) -> Result<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("uclip-")
        .suffix(&format!(".{}", IMAGE_EXTENSION))
        .tempfile()
        .context("Failed to create temporary file")?;
    pixels
        .write_to(file.as_file_mut(), ImageFormat::Png)
        .context("Failed to encode clipboard image")?;
    Ok(file)
}

#[cfg(target_os = "linux")]
pub fn copy_text(text: &str) -> Result<()> {
    // Fail here rather than silently in the helper when there is no display.
    Clipboard::new().context("Failed to open clipboard")?;
    let exe = std::env::current_exe().context("Cannot locate the uclip binary")?;
    helper_command(&exe, text)
        .spawn()
        .context("Failed to start clipboard helper")?;
    Ok(())
}

#[cfg(not(target_os = "linux"))]
pub fn copy_text(text: &str) -> Result<()> {
    let mut clipboard = Clipboard::new().context("Failed to open clipboard")?;
    clipboard
        .set_text(text.to_string())
        .context("Failed to copy URL to clipboard")?;
    Ok(())
}

/// Run by the helper process: own the clipboard until it is replaced.
#[cfg(target_os = "linux")]
pub fn serve_text(text: &str) -> Result<()> {
    use arboard::SetExtLinux;

    let mut clipboard = Clipboard::new().context("Failed to open clipboard")?;
    clipboard
        .set()
        .wait()
        .text(text.to_string())
        .context("Failed to hold clipboard text")?;
    Ok(())
}

#[cfg(not(target_os = "linux"))]
pub fn serve_text(text: &str) -> Result<()> {
    copy_text(text)
}

// Own process group so Ctrl-C in the terminal does not reach the helper.
#[cfg(target_os = "linux")]
fn helper_command(exe: &Path, text: &str) -> Command {
    use std::os::unix::process::CommandExt;

    let mut command = Command::new(exe);
    command
        .arg(SERVE_FLAG)
        .arg(text)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .process_group(0);
    command
}
