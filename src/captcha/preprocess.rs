//! Captcha Image Preprocessing
//!
//! Pipeline: decode -> grayscale -> [0,1] floats -> bilinear resize to
//! the model's 50x130 input -> width-major layout. The model consumes the
//! image transposed, one column of pixels per CTC timestep.

use std::path::Path;

use anyhow::{Context, Result};
use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, ImageBuffer, ImageFormat, Luma, Rgba, RgbaImage};

/// Model input width (and CTC timestep count before downsampling).
pub const IMG_WIDTH: u32 = 130;
/// Model input height.
pub const IMG_HEIGHT: u32 = 50;

/// Load an image file and produce the flat `[IMG_WIDTH * IMG_HEIGHT]`
/// tensor the model expects.
pub fn image_to_tensor(path: &Path) -> Result<Vec<f32>> {
    let img = image::open(path)
        .with_context(|| format!("Failed to open captcha image {:?}", path))?;
    Ok(gray_to_tensor(&img.to_luma8()))
}

/// Normalize, resize and transpose a grayscale image into model layout.
pub fn gray_to_tensor(gray: &GrayImage) -> Vec<f32> {
    let float: ImageBuffer<Luma<f32>, Vec<f32>> =
        ImageBuffer::from_fn(gray.width(), gray.height(), |x, y| {
            Luma([gray.get_pixel(x, y)[0] as f32 / 255.0])
        });

    let resized = imageops::resize(&float, IMG_WIDTH, IMG_HEIGHT, FilterType::Triangle);

    // Width-major: column x becomes timestep x.
    let mut out = Vec::with_capacity((IMG_WIDTH * IMG_HEIGHT) as usize);
    for x in 0..IMG_WIDTH {
        for y in 0..IMG_HEIGHT {
            out.push(resized.get_pixel(x, y)[0]);
        }
    }
    out
}

/// Flatten a possibly-transparent image onto a white background and save
/// it as JPEG. The portal serves captchas as RGBA PNGs whose transparent
/// pixels would otherwise decode as black.
pub fn flatten_to_jpeg(bytes: &[u8], dest: &Path) -> Result<()> {
    let img = image::load_from_memory(bytes).context("Failed to decode captcha image")?;
    let rgba = img.to_rgba8();

    let mut canvas =
        RgbaImage::from_pixel(rgba.width(), rgba.height(), Rgba([255, 255, 255, 255]));
    imageops::overlay(&mut canvas, &rgba, 0, 0);

    DynamicImage::ImageRgba8(canvas)
        .to_rgb8()
        .save_with_format(dest, ImageFormat::Jpeg)
        .with_context(|| format!("Failed to save captcha as JPEG to {:?}", dest))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tensor_shape_and_range() {
        let gray = GrayImage::from_pixel(260, 100, Luma([128]));
        let tensor = gray_to_tensor(&gray);

        assert_eq!(tensor.len(), (IMG_WIDTH * IMG_HEIGHT) as usize);
        for v in &tensor {
            assert!((0.0..=1.0).contains(v));
            assert!((v - 128.0 / 255.0).abs() < 1e-3);
        }
    }

    #[test]
    fn test_tensor_is_width_major() {
        // Left half black, right half white; no resize distortion at the
        // model's native dimensions.
        let gray = GrayImage::from_fn(IMG_WIDTH, IMG_HEIGHT, |x, _| {
            if x < IMG_WIDTH / 2 {
                Luma([0])
            } else {
                Luma([255])
            }
        });
        let tensor = gray_to_tensor(&gray);

        // First column (timestep 0) is black, last column is white.
        assert!(tensor[0] < 0.1);
        assert!(tensor[(IMG_HEIGHT - 1) as usize] < 0.1);
        assert!(tensor[((IMG_WIDTH - 1) * IMG_HEIGHT) as usize] > 0.9);
    }

    #[test]
    fn test_flatten_to_jpeg() {
        // Fully transparent PNG should flatten to white, not black.
        let rgba = RgbaImage::from_pixel(20, 10, Rgba([0, 0, 0, 0]));
        let mut png_bytes = Vec::new();
        DynamicImage::ImageRgba8(rgba)
            .write_to(&mut std::io::Cursor::new(&mut png_bytes), ImageFormat::Png)
            .unwrap();

        let dest = std::env::temp_dir().join("tracuu_nnt_flatten_test.jpg");
        flatten_to_jpeg(&png_bytes, &dest).unwrap();

        let decoded = image::open(&dest).unwrap().to_luma8();
        assert!(decoded.get_pixel(10, 5)[0] > 240);

        let _ = std::fs::remove_file(&dest);
    }
}
