// src/app/gfx.rs
use std::path::Path;

use eframe::egui::{self as eg, ColorImage, TextureHandle};
use image::GenericImageView;

/// Upload an RGBA image to a GPU texture. (UI thread only)
pub fn upload_rgba(ctx: &eg::Context, w: u32, h: u32, bytes: &[u8], name: &str) -> TextureHandle {
    let img = ColorImage::from_rgba_unmultiplied([w as usize, h as usize], bytes);
    ctx.load_texture(name.to_string(), img, eg::TextureOptions::LINEAR)
}

/// Decode a poster file into `(w, h, rgba)`.
pub fn load_rgba(path: &Path) -> Result<(u32, u32, Vec<u8>), String> {
    let img = image::ImageReader::open(path)
        .map_err(|e| format!("open image {}: {e}", path.display()))?
        .with_guessed_format()
        .map_err(|e| format!("guess format {}: {e}", path.display()))?
        .decode()
        .map_err(|e| format!("decode {}: {e}", path.display()))?;
    let (w, h) = img.dimensions();
    Ok((w, h, img.to_rgba8().into_raw()))
}

/// Load a texture from a poster path. (UI thread only)
pub fn load_texture_from_path(
    ctx: &eg::Context,
    path: &Path,
    name: &str,
) -> Result<TextureHandle, String> {
    let (w, h, bytes) = load_rgba(path)?;
    Ok(upload_rgba(ctx, w, h, &bytes, name))
}
