// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// OCR module — the image-to-text seam used by the page text pipeline, and the
// optional built-in engine.

use std::path::Path;

use docclip_core::error::Result;
use tracing::warn;

#[cfg(feature = "ocr")]
pub mod engine;

#[cfg(feature = "ocr")]
pub use engine::{OcrConfig, OcrEngine};

/// Turns the image at a path into text. Called once per embedded image, in
/// order; an error aborts the page being extracted.
pub trait ImageToText {
    fn image_to_text(&mut self, image: &Path) -> Result<String>;
}

impl<F> ImageToText for F
where
    F: FnMut(&Path) -> Result<String>,
{
    fn image_to_text(&mut self, image: &Path) -> Result<String> {
        self(image)
    }
}

/// Contributes no text for images.
#[derive(Debug, Clone, Copy, Default)]
pub struct SkipImages;

impl ImageToText for SkipImages {
    fn image_to_text(&mut self, image: &Path) -> Result<String> {
        warn!(image = %image.display(), "No OCR engine available, skipping image");
        Ok(String::new())
    }
}
