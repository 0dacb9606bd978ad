use eframe::egui::ColorImage;
use image::imageops::FilterType;

use crate::error::ThumbnailError;

/// Downloads and decodes a thumbnail. Blocking: call from `spawn_blocking`.
pub fn fetch_thumbnail(url: &str, size: [u32; 2]) -> Result<ColorImage, ThumbnailError> {
    let bytes = reqwest::blocking::get(url)?.error_for_status()?.bytes()?;
    decode_thumbnail(&bytes, size)
}

/// Decodes image bytes, scaling them to exactly `size` (width, height).
pub fn decode_thumbnail(bytes: &[u8], [width, height]: [u32; 2]) -> Result<ColorImage, ThumbnailError> {
    let img = image::load_from_memory(bytes)?
        .resize_exact(width, height, FilterType::Triangle)
        .to_rgba8();
    let size = [img.width() as usize, img.height() as usize];
    Ok(ColorImage::from_rgba_unmultiplied(size, img.as_raw()))
}
