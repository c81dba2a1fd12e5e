// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Engine configuration: canvas geometry for image normalisation, external
// tool locations, and the scratch directory for temporary artifacts.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Pixel geometry used when an image is normalised into a PDF page.
///
/// The defaults describe an A4 sheet at 300 DPI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasGeometry {
    /// Images are resized to fit within this box (width, height).
    pub max_size_in_pixels: (u32, u32),
    /// Printable area once margins are taken off (width, height).
    pub max_size_with_margins: (u32, u32),
    pub margin_left: u32,
    pub margin_top: u32,
}

impl Default for CanvasGeometry {
    fn default() -> Self {
        Self {
            max_size_in_pixels: (2480, 3508),
            max_size_with_margins: (2400, 3400),
            margin_left: 40,
            margin_top: 54,
        }
    }
}

/// Locations of the Poppler command-line tools.
///
/// Bare names are resolved through `PATH` when the command is spawned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolPaths {
    pub pdftotext: PathBuf,
    pub pdfimages: PathBuf,
    pub pdftohtml: PathBuf,
    pub pdftocairo: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            pdftotext: PathBuf::from("pdftotext"),
            pdfimages: PathBuf::from("pdfimages"),
            pdftohtml: PathBuf::from("pdftohtml"),
            pdftocairo: PathBuf::from("/usr/bin/pdftocairo"),
        }
    }
}

/// Top-level settings shared by the reader and the writer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipperConfig {
    pub canvas: CanvasGeometry,
    /// JPEG quality (1-100) used when recompressing normalised images.
    pub jpeg_quality: u8,
    /// Resolution at which a normalised image is laid onto its PDF page.
    pub pdf_resolution_dpi: f32,
    pub tools: ToolPaths,
    /// Directory for temporary artifacts; the system temp dir when unset.
    pub scratch_dir: Option<PathBuf>,
}

impl Default for ClipperConfig {
    fn default() -> Self {
        Self {
            canvas: CanvasGeometry::default(),
            jpeg_quality: 70,
            pdf_resolution_dpi: 100.0,
            tools: ToolPaths::default(),
            scratch_dir: None,
        }
    }
}

impl ClipperConfig {
    /// Load settings from a JSON file. Fields absent from the file keep their
    /// default values.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// The directory temporary artifacts are created in.
    pub fn scratch_dir(&self) -> PathBuf {
        self.scratch_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}
