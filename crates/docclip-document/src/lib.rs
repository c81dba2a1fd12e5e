// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// docclip-document — Document processing for docclip.
//
// Wraps the Poppler command-line tools (text, images, XML layout, repair),
// parses the XML layout into a searchable page/text tree, extracts page text
// with an OCR fallback for embedded images, and merges, slices, and builds
// PDFs from PDFs and raster images.

pub mod image;
pub mod ocr;
pub mod pdf;
pub mod shell;
pub mod structure;

// Re-export the primary types so callers can use `docclip_document::DocumentReader` etc.
pub use crate::image::processor::ImageProcessor;
pub use ocr::{ImageToText, SkipImages};
pub use pdf::reader::DocumentReader;
pub use pdf::writer::ClipperWriter;
pub use shell::{ExtractionTools, ShellCommand};
pub use structure::{Node, PageDimensions, StructuredTree, TextBox, TextMatch};

#[cfg(feature = "ocr")]
pub use ocr::{OcrConfig, OcrEngine};
