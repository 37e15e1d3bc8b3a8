//! Crop stage: optional removal of uniform borders around a capture

use crate::{ImageArtifact, ShotbotError};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use tracing::debug;

/// Tuning for [`auto_crop_bounds`], read from the behavior's `auto_crop_options`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AutoCropOptions {
    /// Maximum colour distance, as a fraction of the largest possible RGBA
    /// distance, for a pixel to count as border (default: 0.0002)
    pub tolerance: f64,

    /// Only crop when all four sides have a border (default: true)
    pub crop_only_frames: bool,
}

impl Default for AutoCropOptions {
    fn default() -> Self {
        Self {
            tolerance: 0.0002,
            crop_only_frames: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropBounds {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Stage 2 of the pipeline.
#[derive(Debug, Clone)]
pub struct Cropper {
    should_auto_crop: bool,
    options: AutoCropOptions,
}

impl Cropper {
    pub fn new(should_auto_crop: bool) -> Self {
        Self {
            should_auto_crop,
            options: AutoCropOptions::default(),
        }
    }

    pub fn with_options(mut self, options: AutoCropOptions) -> Self {
        self.options = options;
        self
    }

    pub async fn crop(&self, mut artifact: ImageArtifact) -> Result<ImageArtifact, ShotbotError> {
        if !self.should_auto_crop {
            // Always suspend at least once.
            tokio::task::yield_now().await;
            return Ok(artifact);
        }

        let buffer = std::mem::take(&mut artifact.buffer);
        let options = self.options.clone();
        artifact.buffer =
            tokio::task::spawn_blocking(move || crop_buffer(&buffer, &options)).await??;
        Ok(artifact)
    }
}

/// Decode, auto-crop and re-encode as PNG.
pub fn crop_buffer(buffer: &[u8], options: &AutoCropOptions) -> Result<Vec<u8>, ShotbotError> {
    let image =
        image::load_from_memory(buffer).map_err(|e| ShotbotError::DecodeFailed(e.to_string()))?;
    let cropped = auto_crop(image, options);

    let mut png_data = Vec::new();
    cropped
        .write_to(&mut Cursor::new(&mut png_data), ImageFormat::Png)
        .map_err(|e| ShotbotError::EncodeFailed(e.to_string()))?;
    Ok(png_data)
}

pub fn auto_crop(image: DynamicImage, options: &AutoCropOptions) -> DynamicImage {
    match auto_crop_bounds(&image.to_rgba8(), options) {
        Some(b) => {
            debug!(
                "Auto-cropping {}x{} to {}x{} at ({}, {})",
                image.width(),
                image.height(),
                b.width,
                b.height,
                b.x,
                b.y
            );
            image.crop_imm(b.x, b.y, b.width, b.height)
        }
        None => image,
    }
}

/// Find the region left after stripping uniform border rows and columns.
///
/// North and west borders match the top-left pixel, south and east borders the
/// bottom-right one. At least one row and one column always remain. Returns
/// `None` when nothing should be cropped.
pub fn auto_crop_bounds(image: &RgbaImage, options: &AutoCropOptions) -> Option<CropBounds> {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return None;
    }

    let top_left = *image.get_pixel(0, 0);
    let bottom_right = *image.get_pixel(w - 1, h - 1);
    let is_border = |x: u32, y: u32, target: &Rgba<u8>| {
        color_distance(image.get_pixel(x, y), target) <= options.tolerance
    };

    let mut north = 0;
    while north < h - 1 && (0..w).all(|x| is_border(x, north, &top_left)) {
        north += 1;
    }
    let mut south = 0;
    while north + south < h - 1 && (0..w).all(|x| is_border(x, h - 1 - south, &bottom_right)) {
        south += 1;
    }

    let rows = north..h - south;
    let mut west = 0;
    while west < w - 1 && rows.clone().all(|y| is_border(west, y, &top_left)) {
        west += 1;
    }
    let mut east = 0;
    while west + east < w - 1 && rows.clone().all(|y| is_border(w - 1 - east, y, &bottom_right)) {
        east += 1;
    }

    let should_crop = if options.crop_only_frames {
        north > 0 && south > 0 && west > 0 && east > 0
    } else {
        north + south + west + east > 0
    };
    if !should_crop {
        return None;
    }

    Some(CropBounds {
        x: west,
        y: north,
        width: w - west - east,
        height: h - north - south,
    })
}

fn color_distance(a: &Rgba<u8>, b: &Rgba<u8>) -> f64 {
    const MAX: f64 = 255.0 * 255.0 * 4.0;
    let sum: f64 = a
        .0
        .iter()
        .zip(b.0.iter())
        .map(|(x, y)| {
            let d = f64::from(*x) - f64::from(*y);
            d * d
        })
        .sum();
    sum / MAX
}
