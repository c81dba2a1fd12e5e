// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document reader — open a PDF, build its structured page/text tree, search
// it, and extract page text, falling back to OCR for embedded images.

use std::fs::{self, File};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use docclip_core::ClipperConfig;
use docclip_core::error::{ClipperError, Result};
use tempfile::TempDir;
use tracing::{debug, info, instrument, warn};

use crate::image::convert_to_jpeg;
use crate::ocr::ImageToText;
use crate::shell::ExtractionTools;
use crate::shell::command::TEMP_PREFIX;
use crate::structure::{Node, PageDimensions, StructuredTree, TextBox, TextMatch, search};

/// An open PDF document.
///
/// The structured tree is built on demand by
/// [`to_structured_tree`](Self::to_structured_tree) and lives until the
/// reader is closed or dropped, together with the directory holding the
/// page images the layout conversion wrote next to the markup.
pub struct DocumentReader {
    path: PathBuf,
    file: File,
    tree: Option<StructuredTree>,
    layout_images: Option<TempDir>,
    tools: ExtractionTools,
}

impl DocumentReader {
    /// Open the PDF at `path`, using `tools` for every external conversion.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>, tools: ExtractionTools) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        debug!("Document opened");
        Ok(Self {
            path,
            file,
            tree: None,
            layout_images: None,
            tools,
        })
    }

    /// Open with tools and scratch directory taken from `config`.
    pub fn with_config(path: impl AsRef<Path>, config: &ClipperConfig) -> Result<Self> {
        Self::open(path, ExtractionTools::from_config(config))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The tree built by the last successful
    /// [`to_structured_tree`](Self::to_structured_tree) call.
    pub fn tree(&self) -> Option<&StructuredTree> {
        self.tree.as_ref()
    }

    // -- Structure ------------------------------------------------------------

    /// Convert the whole document into its structured tree.
    ///
    /// The content is read from the start of the open file, so the result
    /// reflects the bytes behind the handle even if the path has since been
    /// replaced. On failure the previously built tree, if any, is kept and
    /// whatever the failed conversion wrote is removed.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn to_structured_tree(&mut self) -> Result<&StructuredTree> {
        self.file.seek(SeekFrom::Start(0))?;
        let mut copy = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .suffix(".pdf")
            .tempfile_in(self.tools.shell().scratch_dir())?;
        io::copy(&mut self.file, &mut copy)?;
        copy.flush()?;

        let layout = self.tools.to_structured_markup(copy.path())?;
        let tree = StructuredTree::parse(&layout.markup)?;
        info!(nodes = tree.len(), pages = tree.pages().len(), "Structured tree built");

        self.release_tree();
        self.layout_images = Some(layout.images);
        Ok(&*self.tree.insert(tree))
    }

    /// Page nodes in document order; empty until a tree has been built.
    pub fn pages(&self) -> Vec<Node<'_>> {
        self.tree
            .as_ref()
            .map(StructuredTree::pages)
            .unwrap_or_default()
    }

    /// See [`search::find_text_matches`].
    pub fn find_text_matches<'t>(
        &self,
        pages: &[Node<'t>],
        pattern: &str,
        start_page: usize,
    ) -> Result<Vec<TextMatch<'t>>> {
        search::find_text_matches(pages, pattern, start_page)
    }

    /// See [`search::text_coordinates`].
    pub fn text_coordinates(&self, node: Node<'_>) -> Result<TextBox> {
        search::text_coordinates(node)
    }

    /// See [`search::page_dimensions`].
    pub fn page_dimensions(&self, page: Node<'_>) -> PageDimensions {
        search::page_dimensions(page)
    }

    // -- Text -----------------------------------------------------------------

    /// Text of one page (1-indexed): the machine-readable text, followed by
    /// whatever `ocr` reads from each embedded image in file name order.
    #[instrument(skip(self, ocr), fields(path = %self.path.display()))]
    pub fn extract_page_text(&self, page_number: u32, ocr: &mut dyn ImageToText) -> Result<String> {
        let mut text = self.tools.page_text(&self.path, page_number)?;

        let listing = self.tools.list_images(&self.path, page_number)?;
        if ExtractionTools::has_images(&listing) {
            let images = self.tools.extract_images(&self.path, page_number)?;
            match read_images(images.path(), ocr) {
                Ok(image_text) => {
                    text.extend_from_slice(image_text.as_bytes());
                    images.close()?;
                }
                Err(err) => {
                    warn!(page_number, %err, "Error extracting text from page images");
                    return Err(err);
                }
            }
        }

        String::from_utf8(text).map_err(|err| {
            ClipperError::Encoding(format!("page {} text is not UTF-8: {}", page_number, err))
        })
    }

    /// Text of the whole document, page by page.
    #[instrument(skip(self, ocr), fields(path = %self.path.display()))]
    pub fn extract_text(&mut self, ocr: &mut dyn ImageToText) -> Result<String> {
        let page_count = self.to_structured_tree()?.pages().len();

        let mut text = String::new();
        for page_number in 1..=page_count as u32 {
            text.push_str(&self.extract_page_text(page_number, ocr)?);
        }
        debug!(page_count, chars = text.len(), "Document text extracted");
        Ok(text)
    }

    // -- Lifecycle ------------------------------------------------------------

    /// Discard the tree and the image files it references. Dropping the
    /// reader does the same.
    pub fn close(mut self) {
        self.release_tree();
    }

    fn release_tree(&mut self) {
        self.tree = None;
        if let Some(images) = self.layout_images.take() {
            let dir = images.path().to_path_buf();
            match images.close() {
                Ok(()) => debug!(dir = %dir.display(), "Removed layout images"),
                Err(err) => warn!(dir = %dir.display(), %err, "Error cleaning up layout images"),
            }
        }
    }
}

impl Drop for DocumentReader {
    fn drop(&mut self) {
        self.release_tree();
    }
}

/// Run `ocr` over every regular file in `dir`, normalised to JPEG first.
fn read_images(dir: &Path, ocr: &mut dyn ImageToText) -> Result<String> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();

    let mut text = String::new();
    for file in files {
        let jpeg = convert_to_jpeg(&file)?;
        text.push_str(&ocr.image_to_text(&jpeg)?);
    }
    Ok(text)
}
