// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image processor — fit-to-page resizing, white canvas flattening, JPEG
// recompression, and raster content sniffing. Operates on in-memory images
// using the `image` crate.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use docclip_core::error::{ClipperError, Result};
use image::{DynamicImage, ImageFormat, ImageReader, Rgb, RgbImage};
use tracing::{debug, info, instrument};

/// Bytes read from the start of a file when sniffing its format.
const SNIFF_LEN: usize = 64;

/// Image processing pipeline operating on a single in-memory image.
///
/// Each transformation consumes `self` and returns a new `ImageProcessor`,
/// so steps chain:
///
/// ```ignore
/// let page = ImageProcessor::open("scan.png")?
///     .resize(2480, 3508)
///     .flatten_on_white(2480, 3508)
///     .recompress_jpeg(70)?;
/// ```
pub struct ImageProcessor {
    image: DynamicImage,
}

impl ImageProcessor {
    /// Load an image from a file path. The decoder is chosen from the file
    /// content; the extension plays no part.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let img = ImageReader::open(path.as_ref())?
            .with_guessed_format()?
            .decode()
            .map_err(|err| {
                ClipperError::ImageError(format!(
                    "failed to open {}: {}",
                    path.as_ref().display(),
                    err
                ))
            })?;
        debug!(width = img.width(), height = img.height(), "Image loaded");
        Ok(Self { image: img })
    }

    /// Wrap an already-decoded `DynamicImage`.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }

    /// Resize to fit within `max_width` x `max_height`, preserving aspect
    /// ratio. Small images are scaled up. Uses Lanczos3 filtering.
    #[instrument(skip(self))]
    pub fn resize(self, max_width: u32, max_height: u32) -> Self {
        debug!(
            from_w = self.image.width(),
            from_h = self.image.height(),
            "Resizing image"
        );
        let resized = self
            .image
            .resize(max_width, max_height, image::imageops::FilterType::Lanczos3);
        debug!(new_w = resized.width(), new_h = resized.height(), "Resize complete");
        Self { image: resized }
    }

    /// Paste the image at the top-left corner of a white RGB canvas whose size
    /// is the image size capped at `max_width` x `max_height`. Transparency is
    /// dropped and anything beyond the canvas is cut off.
    #[instrument(skip(self))]
    pub fn flatten_on_white(self, max_width: u32, max_height: u32) -> Self {
        let canvas_w = self.image.width().min(max_width);
        let canvas_h = self.image.height().min(max_height);

        let mut canvas = RgbImage::from_pixel(canvas_w, canvas_h, Rgb([255, 255, 255]));
        image::imageops::replace(&mut canvas, &self.image.to_rgb8(), 0, 0);

        debug!(canvas_w, canvas_h, "Image flattened on white canvas");
        Self {
            image: DynamicImage::ImageRgb8(canvas),
        }
    }

    /// Encode as JPEG at `quality` and decode the result again, so the pixels
    /// carry the compression loss.
    #[instrument(skip(self))]
    pub fn recompress_jpeg(self, quality: u8) -> Result<Self> {
        let bytes = self.to_jpeg_bytes(quality)?;
        let image = image::load_from_memory_with_format(&bytes, ImageFormat::Jpeg)
            .map_err(|err| ClipperError::ImageError(format!("JPEG decoding failed: {}", err)))?;
        debug!(jpeg_bytes = bytes.len(), "Image recompressed");
        Ok(Self { image })
    }

    /// Encode the current image as JPEG bytes with the given quality (1-100).
    pub fn to_jpeg_bytes(&self, quality: u8) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        let rgb = self.image.to_rgb8();
        let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, quality);
        rgb.write_with_encoder(encoder)
            .map_err(|err| ClipperError::ImageError(format!("JPEG encoding failed: {}", err)))?;
        Ok(buffer)
    }

    /// Write the image as an RGB JPEG to `path`.
    pub fn save_jpeg(&self, path: impl AsRef<Path>) -> Result<()> {
        let rgb = DynamicImage::ImageRgb8(self.image.to_rgb8());
        rgb.save_with_format(path.as_ref(), ImageFormat::Jpeg)
            .map_err(|err| {
                ClipperError::ImageError(format!(
                    "failed to save image to {}: {}",
                    path.as_ref().display(),
                    err
                ))
            })
    }
}

/// Re-encode any supported image file as `<stem>.jpg` next to the original
/// and return the new path. A file already named `.jpg` is overwritten in
/// place.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn convert_to_jpeg(path: &Path) -> Result<PathBuf> {
    let target = path.with_extension("jpg");
    ImageProcessor::open(path)?.save_jpeg(&target)?;
    info!(jpeg = %target.display(), "Image normalised to JPEG");
    Ok(target)
}

/// Whether the file content starts with the signature of a raster format the
/// `image` crate recognises. The file extension is ignored.
pub fn is_raster_image(path: &Path) -> Result<bool> {
    let mut header = Vec::with_capacity(SNIFF_LEN);
    File::open(path)?
        .take(SNIFF_LEN as u64)
        .read_to_end(&mut header)?;
    Ok(image::guess_format(&header).is_ok())
}
