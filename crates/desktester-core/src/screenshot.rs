//! Screenshot capture and PNG encoding
//!
//! Window choice: among visible windows owned by the app's pid, the frontmost
//! one wins. `xcap::Window::all` lists on-screen windows front to back on both
//! macOS (CGWindowList) and Windows (EnumWindows), so list order is the
//! stacking order. Without an app (or with an explicit region) the primary monitor
//! is captured and cropped. Every failure path produces empty bytes.

use crate::element::Bounds;
use anyhow::{Context, Result};
use image::{ImageFormat, RgbaImage};
use std::io::Cursor;

/// What the capture layer knows about an on-screen window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowCandidate {
    pub pid: i32,
    pub visible: bool,
}

/// Index of the window to capture for `pid`, if any. `candidates` are in
/// front-to-back order.
pub fn pick_window(candidates: &[WindowCandidate], pid: i32) -> Option<usize> {
    candidates.iter().position(|w| w.pid == pid && w.visible)
}

pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    image
        .write_to(&mut buf, ImageFormat::Png)
        .context("failed to encode PNG")?;
    Ok(buf.into_inner())
}

/// Crop to `region` (in image coordinates), clamped to the image.
pub fn crop(image: &RgbaImage, region: Bounds) -> RgbaImage {
    let x = region.x.max(0.0) as u32;
    let y = region.y.max(0.0) as u32;
    let x = x.min(image.width());
    let y = y.min(image.height());
    let w = (region.width.max(0.0) as u32).min(image.width() - x);
    let h = (region.height.max(0.0) as u32).min(image.height() - y);
    image::imageops::crop_imm(image, x, y, w, h).to_image()
}

/// Capture via xcap; empty bytes on any failure.
#[cfg(any(target_os = "macos", target_os = "windows"))]
pub fn capture(region: Option<Bounds>, app: Option<&crate::backend::AppInfo>) -> Vec<u8> {
    match try_capture(region, app) {
        Ok(png) => png,
        Err(e) => {
            tracing::warn!(error = %format!("{:#}", e), "screenshot capture failed");
            Vec::new()
        }
    }
}

#[cfg(any(target_os = "macos", target_os = "windows"))]
fn try_capture(region: Option<Bounds>, app: Option<&crate::backend::AppInfo>) -> Result<Vec<u8>> {
    use xcap::{Monitor, Window};

    if let (Some(app), None) = (app, region) {
        let windows = Window::all().map_err(|e| anyhow::anyhow!("Failed to get windows: {}", e))?;
        let candidates: Vec<WindowCandidate> = windows
            .iter()
            .map(|w| WindowCandidate {
                pid: w.process_id() as i32,
                visible: !w.is_minimized() && w.width() > 0 && w.height() > 0,
            })
            .collect();
        if let Some(i) = pick_window(&candidates, app.pid) {
            let image = windows[i]
                .capture_image()
                .map_err(|e| anyhow::anyhow!("Failed to capture window: {}", e))?;
            return encode_png(&image);
        }
        tracing::debug!(pid = app.pid, "no visible window for app, capturing screen");
    }

    let monitors = Monitor::all().map_err(|e| anyhow::anyhow!("Failed to get monitors: {}", e))?;
    let monitor = monitors
        .iter()
        .find(|m| m.is_primary())
        .or_else(|| monitors.first())
        .context("No monitor found")?;
    let image = monitor
        .capture_image()
        .map_err(|e| anyhow::anyhow!("Failed to capture screen: {}", e))?;

    let image = match region {
        Some(r) => crop(
            &image,
            Bounds::new(r.x - monitor.x() as f64, r.y - monitor.y() as f64, r.width, r.height),
        ),
        None => image,
    };
    encode_png(&image)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_frontmost_visible_window_of_pid() {
        let windows = [
            WindowCandidate { pid: 9, visible: true },
            WindowCandidate { pid: 7, visible: false },
            WindowCandidate { pid: 7, visible: true },
            WindowCandidate { pid: 7, visible: true },
        ];
        assert_eq!(pick_window(&windows, 7), Some(2));
        assert_eq!(pick_window(&windows, 8), None);
    }

    #[test]
    fn minimized_only_windows_fall_back_to_screen() {
        let windows = [WindowCandidate { pid: 1, visible: false }];
        assert_eq!(pick_window(&windows, 1), None);
    }

    #[test]
    fn crop_clamps_and_encodes() {
        let image = RgbaImage::from_pixel(40, 30, image::Rgba([255, 0, 0, 255]));
        let cropped = crop(&image, Bounds::new(30.0, 20.0, 50.0, 50.0));
        assert_eq!(cropped.dimensions(), (10, 10));

        let png = encode_png(&cropped).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }
}
