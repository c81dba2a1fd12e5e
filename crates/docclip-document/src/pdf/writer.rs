// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document assembly — image-to-PDF conversion with `printpdf` 0.8, plus
// merging, slicing, and repairing existing PDFs with `lopdf`.
//
// printpdf 0.8 uses a data-oriented API: documents are built by constructing
// `PdfPage` structs containing `Vec<Op>` operation lists, then serialised via
// `PdfDocument::save()`.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use docclip_core::error::{ClipperError, Result};
use docclip_core::{CanvasGeometry, ClipperConfig, MergeAction, SliceAction};
use image::DynamicImage;
use lopdf::Document;
use printpdf::{
    Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Pt, RawImage, RawImageData,
    RawImageFormat, XObjectTransform,
};
use tracing::{debug, info, instrument, warn};

use super::pages::PageAssembler;
use crate::image::{ImageProcessor, is_raster_image};
use crate::shell::ExtractionTools;
use crate::shell::command::TEMP_PREFIX;

const MM_PER_INCH: f32 = 25.4;

/// Builds PDFs out of images and other PDFs.
///
/// Rotations in [`MergeAction`] and [`SliceAction`] are applied
/// counter-clockwise: a page rotated by `90` has `90` subtracted from its
/// `/Rotate` entry.
#[derive(Debug, Clone)]
pub struct ClipperWriter {
    canvas: CanvasGeometry,
    jpeg_quality: u8,
    pdf_resolution_dpi: f32,
    tools: ExtractionTools,
}

impl ClipperWriter {
    pub fn new(config: &ClipperConfig) -> Self {
        Self::with_tools(config, ExtractionTools::from_config(config))
    }

    /// Writer whose repairs go through `tools`.
    pub fn with_tools(config: &ClipperConfig, tools: ExtractionTools) -> Self {
        Self {
            canvas: config.canvas,
            jpeg_quality: config.jpeg_quality,
            pdf_resolution_dpi: config.pdf_resolution_dpi,
            tools,
        }
    }

    pub fn canvas(&self) -> &CanvasGeometry {
        &self.canvas
    }

    // -- Image to PDF ---------------------------------------------------------

    /// Turn an image into a single-page PDF.
    ///
    /// The image is fitted into the canvas, flattened on white, passed
    /// through a lossy JPEG round trip, and placed at the page origin. Each
    /// pixel maps to `1 / pdf_resolution_dpi` inches, so the page is exactly
    /// the size of the image.
    ///
    /// Without `output`, the PDF goes to a new file in the scratch directory
    /// that the caller then owns.
    #[instrument(skip(self, image), fields(width = image.width(), height = image.height()))]
    pub fn image_to_pdf(&self, image: DynamicImage, output: Option<&Path>) -> Result<PathBuf> {
        let (max_w, max_h) = self.canvas.max_size_in_pixels;
        let page_image = ImageProcessor::from_dynamic(image)
            .resize(max_w, max_h)
            .flatten_on_white(max_w, max_h)
            .recompress_jpeg(self.jpeg_quality)?
            .into_dynamic();

        let bytes = self.render_image_page(&page_image);

        let path = match output {
            Some(path) => {
                fs::write(path, &bytes)?;
                path.to_path_buf()
            }
            None => {
                let mut file = tempfile::Builder::new()
                    .prefix(TEMP_PREFIX)
                    .suffix(".pdf")
                    .tempfile_in(self.tools.shell().scratch_dir())?;
                file.write_all(&bytes)?;
                let (_, path) = file.keep().map_err(|err| ClipperError::Io(err.error))?;
                path
            }
        };

        info!(
            path = %path.display(),
            width = page_image.width(),
            height = page_image.height(),
            "Image written as PDF"
        );
        Ok(path)
    }

    fn render_image_page(&self, image: &DynamicImage) -> Vec<u8> {
        let dpi = self.pdf_resolution_dpi;
        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();

        let raw = RawImage {
            pixels: RawImageData::U8(rgb.into_raw()),
            width: width as usize,
            height: height as usize,
            data_format: RawImageFormat::RGB8,
            tag: Vec::new(),
        };

        let mut doc = PdfDocument::new("docclip");
        let xobject_id = doc.add_image(&raw);

        let page_w = Mm(width as f32 / dpi * MM_PER_INCH);
        let page_h = Mm(height as f32 / dpi * MM_PER_INCH);
        let ops = vec![Op::UseXobject {
            id: xobject_id,
            transform: XObjectTransform {
                translate_x: Some(Pt(0.0)),
                translate_y: Some(Pt(0.0)),
                scale_x: None,
                scale_y: None,
                dpi: Some(dpi),
                rotate: None,
            },
        }];
        doc.with_pages(vec![PdfPage::new(page_w, page_h, ops)]);

        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        let output = doc.save(&PdfSaveOptions::default(), &mut warnings);
        debug!(bytes = output.len(), warnings = warnings.len(), "Image page rendered");
        output
    }

    // -- Repair ---------------------------------------------------------------

    /// Try to rewrite a possibly corrupted PDF.
    ///
    /// Returns the repaired copy (the input is deleted) or, when repair
    /// fails, the input path unchanged.
    pub fn fix_pdf(&self, path: &Path) -> PathBuf {
        match self.tools.repair(path) {
            Ok(repaired) => repaired,
            Err(err) => {
                warn!(path = %path.display(), %err, "PDF repair failed, using the original file");
                path.to_path_buf()
            }
        }
    }

    // -- Merge ----------------------------------------------------------------

    /// Concatenate the PDFs named by `actions` into `final_path`.
    ///
    /// Actions with an empty path, or naming `final_path` itself, are
    /// skipped. With `append_blank_page`, one blank page follows every
    /// source, the last included. Nothing is written when a source cannot be
    /// loaded.
    #[instrument(skip_all, fields(final_path = %final_path.display(), sources = actions.len()))]
    pub fn merge_pdfs(
        &self,
        final_path: &Path,
        actions: &[MergeAction],
        append_blank_page: bool,
    ) -> Result<()> {
        let mut assembler = PageAssembler::new();

        for action in actions {
            if action.is_placeholder() || action.path.as_path() == final_path {
                debug!(path = %action.path.display(), "Skipping merge source");
                continue;
            }

            info!(path = %action.path.display(), rotation = action.rotation, "Parsing merge source");
            let source = load_document(&action.path)?;
            for page_id in assembler.import(source) {
                assembler.append_page(page_id, action.rotation)?;
            }

            if append_blank_page {
                assembler.append_blank_page();
            }
        }

        assembler.save(final_path)
    }

    /// Merge images and PDFs into `final_path`.
    ///
    /// Inputs are recognised by content, not extension: raster images become
    /// single-page PDFs first. With `fix_files`, every PDF input is repaired
    /// before merging. Intermediate files are removed afterwards, whether or
    /// not the merge succeeded; inputs supplied by the caller are never
    /// removed here, though a successful repair replaces its input.
    #[instrument(skip_all, fields(final_path = %final_path.display(), inputs = actions.len()))]
    pub fn merge(
        &self,
        final_path: &Path,
        actions: &[MergeAction],
        append_blank_page: bool,
        fix_files: bool,
    ) -> Result<()> {
        let mut intermediates = Vec::new();
        let result = self
            .prepare_merge_sources(actions, fix_files, &mut intermediates)
            .and_then(|sources| self.merge_pdfs(final_path, &sources, append_blank_page));

        for path in &intermediates {
            remove_intermediate(path);
        }
        result
    }

    fn prepare_merge_sources(
        &self,
        actions: &[MergeAction],
        fix_files: bool,
        intermediates: &mut Vec<PathBuf>,
    ) -> Result<Vec<MergeAction>> {
        let mut sources = Vec::with_capacity(actions.len());

        for action in actions {
            if action.is_placeholder() {
                sources.push(action.clone());
                continue;
            }

            if is_raster_image(&action.path)? {
                let image = ImageProcessor::open(&action.path)?.into_dynamic();
                let pdf = self.image_to_pdf(image, None)?;
                intermediates.push(pdf.clone());
                sources.push(MergeAction::new(pdf, action.rotation));
            } else if fix_files {
                let fixed = self.fix_pdf(&action.path);
                if fixed != action.path {
                    intermediates.push(fixed.clone());
                }
                sources.push(MergeAction::new(fixed, action.rotation));
            } else {
                sources.push(action.clone());
            }
        }

        Ok(sources)
    }

    // -- Slice ----------------------------------------------------------------

    /// Build `final_path` out of selected pages of `source`.
    ///
    /// Pages are 1-indexed and emitted in action order; a page may be
    /// requested more than once. Every page number is checked against the
    /// source before anything is written.
    ///
    /// Returns the path the source document now lives at. That is `source`
    /// itself unless `fix_file` repaired it, in which case the repaired copy
    /// replaces the source and is left in place for the caller, whether or
    /// not the slice succeeded.
    #[instrument(skip_all, fields(source = %source.display(), pages = page_actions.len()))]
    pub fn slice(
        &self,
        source: &Path,
        page_actions: &[SliceAction],
        final_path: &Path,
        fix_file: bool,
    ) -> Result<PathBuf> {
        let input = if fix_file {
            self.fix_pdf(source)
        } else {
            source.to_path_buf()
        };

        if input != source {
            info!(repaired = %input.display(), "Source replaced by its repaired copy");
        }
        slice_document(&input, page_actions, final_path).inspect_err(|err| {
            if input != source {
                warn!(repaired = %input.display(), %err, "Slice failed; repaired source kept");
            }
        })?;
        Ok(input)
    }
}

fn slice_document(source: &Path, page_actions: &[SliceAction], final_path: &Path) -> Result<()> {
    let document = load_document(source)?;
    let total_pages = document.get_pages().len();
    validate_page_actions(page_actions, total_pages)?;

    let mut assembler = PageAssembler::new();
    let page_ids = assembler.import(document);
    for action in page_actions {
        // Validated above: 1 <= page <= total_pages.
        let page_id = page_ids[action.page as usize - 1];
        assembler.append_page(page_id, action.rotation)?;
    }

    assembler.save(final_path)
}

fn validate_page_actions(page_actions: &[SliceAction], total_pages: usize) -> Result<()> {
    let lowest = page_actions.iter().map(|action| action.page).min();
    let highest = page_actions.iter().map(|action| action.page).max();

    match (lowest, highest) {
        (None, _) | (_, None) => Err(ClipperError::InvalidRange(
            "at least one page must be requested.".into(),
        )),
        (Some(lowest), _) if lowest < 1 => Err(ClipperError::InvalidRange(
            "page numbers cannot be lower than 1.".into(),
        )),
        (_, Some(highest)) if highest as usize > total_pages => {
            Err(ClipperError::InvalidRange(format!(
                "page numbers cannot exceed the maximum numbers of pages of the source PDF \
                 document ({highest} > {total_pages})."
            )))
        }
        _ => Ok(()),
    }
}

fn load_document(path: &Path) -> Result<Document> {
    Document::load(path).map_err(|err| {
        warn!(path = %path.display(), %err, "Cannot load PDF");
        ClipperError::DocumentAssembly {
            path: path.display().to_string(),
            reason: err.to_string(),
        }
    })
}

/// Remove a file this module created. A file that is already gone (a repair
/// consumes its input) is not an error.
fn remove_intermediate(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "Intermediate file removed"),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "Intermediate file already deleted");
        }
        Err(err) => warn!(path = %path.display(), %err, "Cannot remove intermediate file"),
    }
}
