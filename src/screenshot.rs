//! Full-Page Screenshot Capture
//!
//! WebDriver only captures the visible viewport, so the page is scrolled
//! in viewport-height steps and the frames are stitched vertically. The
//! last frame is bottom-aligned to avoid a duplicated strip.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use image::imageops;
use image::{Rgba, RgbaImage};
use thirtyfour::WebDriver;

/// Settle time after each scroll so lazy content can render.
const SCROLL_SETTLE: Duration = Duration::from_millis(400);

pub async fn capture_full_page(driver: &WebDriver, dest: &Path) -> Result<PathBuf> {
    let total: f64 = driver
        .execute(
            "return Math.max(document.body.scrollHeight, document.documentElement.scrollHeight);",
            Vec::new(),
        )
        .await
        .context("Failed to read page height")?
        .convert()
        .context("Page height is not a number")?;

    let viewport: f64 = driver
        .execute("return window.innerHeight;", Vec::new())
        .await
        .context("Failed to read viewport height")?
        .convert()
        .context("Viewport height is not a number")?;

    if viewport <= 0.0 || total <= 0.0 {
        bail!("Page reports zero dimensions (viewport {viewport}, total {total})");
    }

    // Collect (css offset, png bytes) frames top to bottom.
    let mut frames: Vec<(f64, Vec<u8>)> = Vec::new();
    let mut offset = 0.0f64;
    loop {
        driver
            .execute(
                "window.scrollTo(0, arguments[0]);",
                vec![serde_json::json!(offset)],
            )
            .await
            .context("Failed to scroll page")?;
        tokio::time::sleep(SCROLL_SETTLE).await;

        let png = driver
            .screenshot_as_png()
            .await
            .context("Failed to capture viewport screenshot")?;
        frames.push((offset, png));

        if offset + viewport >= total {
            break;
        }
        offset = (offset + viewport).min(total - viewport);
    }

    driver
        .execute("window.scrollTo(0, 0);", Vec::new())
        .await
        .context("Failed to scroll back to top")?;

    let stitched = stitch_frames(&frames, viewport, total)?;
    stitched
        .save(dest)
        .with_context(|| format!("Failed to save screenshot to {:?}", dest))?;

    Ok(dest.to_path_buf())
}

/// Stitch viewport frames into one image. Frame pixels may be larger than
/// CSS pixels (device pixel ratio), so offsets are scaled accordingly.
fn stitch_frames(frames: &[(f64, Vec<u8>)], viewport: f64, total: f64) -> Result<RgbaImage> {
    let (_, first) = frames.first().context("No screenshot frames captured")?;
    let first_img = image::load_from_memory(first)
        .context("Failed to decode screenshot frame")?
        .to_rgba8();

    let ratio = first_img.height() as f64 / viewport;
    let width = first_img.width();
    let height = (total * ratio).round() as u32;

    let mut canvas = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));
    for (offset, png) in frames {
        let frame = image::load_from_memory(png)
            .context("Failed to decode screenshot frame")?
            .to_rgba8();
        let y = (offset * ratio).round() as i64;
        imageops::replace(&mut canvas, &frame, 0, y);
    }

    Ok(canvas)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat};

    fn solid_png(width: u32, height: u32, shade: u8) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([shade, shade, shade, 255]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut std::io::Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn test_stitch_two_frames() {
        // Viewport 100 css px, page 180 css px: frames at 0 and 80.
        let frames = vec![(0.0, solid_png(50, 100, 10)), (80.0, solid_png(50, 100, 200))];
        let canvas = stitch_frames(&frames, 100.0, 180.0).unwrap();

        assert_eq!(canvas.width(), 50);
        assert_eq!(canvas.height(), 180);
        // Top belongs to the first frame, bottom to the second.
        assert_eq!(canvas.get_pixel(10, 5)[0], 10);
        assert_eq!(canvas.get_pixel(10, 175)[0], 200);
        // Overlap region is overwritten by the later frame.
        assert_eq!(canvas.get_pixel(10, 90)[0], 200);
    }

    #[test]
    fn test_stitch_scales_device_pixels() {
        // 2x device pixel ratio: 100 css px viewport, 200 px frames.
        let frames = vec![(0.0, solid_png(80, 200, 30)), (50.0, solid_png(80, 200, 220))];
        let canvas = stitch_frames(&frames, 100.0, 150.0).unwrap();

        assert_eq!(canvas.height(), 300);
        assert_eq!(canvas.get_pixel(0, 10)[0], 30);
        assert_eq!(canvas.get_pixel(0, 290)[0], 220);
    }

    #[test]
    fn test_stitch_empty_fails() {
        assert!(stitch_frames(&[], 100.0, 100.0).is_err());
    }
}
