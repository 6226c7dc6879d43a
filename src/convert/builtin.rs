//! In-process image work with the `image` crate.
//!
//! Used for image resize and thumbnail jobs when `[tools] image_backend` is
//! `builtin`, and always for the play overlay on ffmpeg-produced thumbnails.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, GIF, TIFF, WebP, BMP) | `image` crate (pure Rust decoders) |
//! | Resize | `DynamicImage::resize` with `Lanczos3` |
//! | Thumbnail crop | `DynamicImage::resize_to_fill` |
//! | Encode → JPEG | `JpegEncoder::new_with_quality` |
//! | Play overlay | per-pixel blend over [`PlayGlyph`] geometry |
//!
//! Decoding a GIF yields its first frame, so animated sources lose their
//! animation on resize with this backend.

use super::ConvertError;
use super::calculations::{PlayGlyph, fit_within, play_glyph};
use super::params::{Quality, ResizeParams, ThumbnailParams};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader, Rgba, RgbaImage};
use std::path::Path;

fn load_image(path: &Path) -> Result<DynamicImage, ConvertError> {
    ImageReader::open(path)?
        .with_guessed_format()?
        .decode()
        .map_err(|e| {
            ConvertError::ProcessingFailed(format!("Failed to decode {}: {}", path.display(), e))
        })
}

/// Save an image, picking the encoder from the output extension.
fn save_image(img: &DynamicImage, path: &Path, quality: Quality) -> Result<(), ConvertError> {
    let format = ImageFormat::from_path(path).map_err(|e| {
        ConvertError::ProcessingFailed(format!("Unsupported output format: {e}"))
    })?;

    match format {
        ImageFormat::Jpeg => {
            let file = std::fs::File::create(path)?;
            let writer = std::io::BufWriter::new(file);
            let encoder = JpegEncoder::new_with_quality(writer, quality.value() as u8);
            DynamicImage::ImageRgb8(img.to_rgb8())
                .write_with_encoder(encoder)
                .map_err(|e| ConvertError::ProcessingFailed(format!("JPEG encode failed: {e}")))
        }
        other => img.save_with_format(path, other).map_err(|e| {
            ConvertError::ProcessingFailed(format!("Encode to {other:?} failed: {e}"))
        }),
    }
}

pub fn resize(params: &ResizeParams) -> Result<(), ConvertError> {
    let img = load_image(&params.source)?;
    let (w, h) = fit_within(img.dimensions(), params.max_edge);
    let resized = if (w, h) == img.dimensions() {
        img
    } else {
        img.resize(w, h, FilterType::Lanczos3)
    };
    save_image(&resized, &params.output, params.quality)
}

pub fn thumbnail(params: &ThumbnailParams) -> Result<(), ConvertError> {
    let img = load_image(&params.source)?;
    let filled = img.resize_to_fill(params.size, params.size, FilterType::Lanczos3);
    let final_img = if params.play_overlay {
        let mut rgba = filled.to_rgba8();
        draw_play_overlay(&mut rgba);
        DynamicImage::ImageRgba8(rgba)
    } else {
        filled
    };
    save_image(&final_img, &params.output, params.quality)
}

/// Re-encode `path` in place with the play glyph drawn on top.
pub fn overlay_file(path: &Path, quality: Quality) -> Result<(), ConvertError> {
    let mut rgba = load_image(path)?.to_rgba8();
    draw_play_overlay(&mut rgba);
    save_image(&DynamicImage::ImageRgba8(rgba), path, quality)
}

/// Blend the play glyph onto the image center. Non-square images use the
/// shorter edge.
pub fn draw_play_overlay(img: &mut RgbaImage) {
    let (w, h) = img.dimensions();
    let edge = w.min(h);
    let glyph = play_glyph(edge);
    let offset = ((w - edge) as f64 / 2.0, (h - edge) as f64 / 2.0);

    let disc = Rgba([0, 0, 0, 255]);
    let arrow = Rgba([255, 255, 255, 255]);
    let (x0, x1, y0, y1) = bounds(&glyph, edge);

    for y in y0..y1 {
        for x in x0..x1 {
            let (px, py) = (x as f64 + 0.5, y as f64 + 0.5);
            let (color, alpha) = if glyph.in_triangle(px, py) {
                (arrow, 0.9)
            } else if glyph.in_disc(px, py) {
                (disc, 0.45)
            } else {
                continue;
            };
            let ix = x + offset.0 as u32;
            let iy = y + offset.1 as u32;
            blend(img.get_pixel_mut(ix, iy), color, alpha);
        }
    }
}

fn bounds(glyph: &PlayGlyph, edge: u32) -> (u32, u32, u32, u32) {
    let (cx, cy) = glyph.center;
    let r = glyph.radius.ceil();
    let clamp = |v: f64| v.clamp(0.0, edge as f64) as u32;
    (clamp(cx - r), clamp(cx + r), clamp(cy - r), clamp(cy + r))
}

fn blend(pixel: &mut Rgba<u8>, over: Rgba<u8>, alpha: f64) {
    for c in 0..3 {
        let base = pixel.0[c] as f64;
        pixel.0[c] = (base * (1.0 - alpha) + over.0[c] as f64 * alpha).round() as u8;
    }
}
