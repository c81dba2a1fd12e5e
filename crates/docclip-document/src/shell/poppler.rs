// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Structural extraction commands built on the Poppler command-line tools:
// per-page text, image listing and extraction, whole-document XML markup,
// and best-effort repair.

use std::ffi::{OsStr, OsString};
use std::fs;
use std::path::{Path, PathBuf};

use docclip_core::{ClipperConfig, ToolPaths};
use docclip_core::error::{ClipperError, Result};
use tempfile::TempDir;
use tracing::{debug, info, instrument};

use super::command::{ShellCommand, TEMP_PREFIX};

/// Marker `pdfimages -list` prints for every embedded raster image.
const IMAGE_MARKER: &[u8] = b"image";

/// File name root handed to pdftohtml inside its scoped directory.
const MARKUP_ROOT: &str = "layout";

/// pdftohtml output: the decoded markup plus the directory holding the page
/// images it references. Dropping the value removes the images.
#[derive(Debug)]
pub struct LayoutMarkup {
    pub markup: String,
    pub images: TempDir,
}

/// Stateless wrappers around `pdftotext`, `pdfimages`, `pdftohtml`, and
/// `pdftocairo`. Identical inputs always produce identical invocations.
#[derive(Debug, Clone)]
pub struct ExtractionTools {
    shell: ShellCommand,
    tools: ToolPaths,
}

impl ExtractionTools {
    pub fn new(shell: ShellCommand, tools: ToolPaths) -> Self {
        Self { shell, tools }
    }

    /// Tools and scratch directory taken from `config`.
    pub fn from_config(config: &ClipperConfig) -> Self {
        Self::new(ShellCommand::new(config.scratch_dir()), config.tools.clone())
    }

    pub fn shell(&self) -> &ShellCommand {
        &self.shell
    }

    /// UTF-8 text content of one page (1-indexed).
    #[instrument(skip_all, fields(path = %path.display(), page))]
    pub fn page_text(&self, path: &Path, page: u32) -> Result<Vec<u8>> {
        let page = page.to_string();
        let output = self.shell.run([
            self.tools.pdftotext.as_os_str(),
            OsStr::new("-enc"),
            OsStr::new("UTF-8"),
            OsStr::new("-f"),
            OsStr::new(&page),
            OsStr::new("-l"),
            OsStr::new(&page),
            path.as_os_str(),
            OsStr::new("-"),
        ])?;
        Ok(output.stdout)
    }

    /// Raw `pdfimages -list` table for one page.
    #[instrument(skip_all, fields(path = %path.display(), page))]
    pub fn list_images(&self, path: &Path, page: u32) -> Result<Vec<u8>> {
        let page = page.to_string();
        let output = self.shell.run([
            self.tools.pdfimages.as_os_str(),
            OsStr::new("-f"),
            OsStr::new(&page),
            OsStr::new("-l"),
            OsStr::new(&page),
            OsStr::new("-list"),
            path.as_os_str(),
        ])?;
        Ok(output.stdout)
    }

    /// Whether a listing produced by [`list_images`](Self::list_images)
    /// mentions at least one image.
    pub fn has_images(listing: &[u8]) -> bool {
        listing
            .windows(IMAGE_MARKER.len())
            .any(|window| window == IMAGE_MARKER)
    }

    /// Extract every image of one page into a fresh scoped directory.
    ///
    /// JPEG images are written as-is, everything else in Netpbm format. The
    /// directory is empty when the page has no images and is removed when
    /// the returned guard drops.
    #[instrument(skip_all, fields(path = %path.display(), page))]
    pub fn extract_images(&self, path: &Path, page: u32) -> Result<TempDir> {
        let dir = self.shell.temp_dir()?;
        let page_arg = page.to_string();
        let image_root = dir.path().join(&page_arg);
        self.shell.run([
            self.tools.pdfimages.as_os_str(),
            OsStr::new("-f"),
            OsStr::new(&page_arg),
            OsStr::new("-l"),
            OsStr::new(&page_arg),
            OsStr::new("-j"),
            path.as_os_str(),
            image_root.as_os_str(),
        ])?;
        debug!(dir = %dir.path().display(), "Page images extracted");
        Ok(dir)
    }

    /// Convert the whole document into pdftohtml's XML layout markup.
    ///
    /// pdftohtml writes Latin-1; every byte is mapped to the code point of
    /// the same value, which yields the equivalent UTF-8 string. The tool
    /// runs inside a fresh scoped directory. The markup file is removed once
    /// read, while the page images it references through `src` attributes
    /// stay in that directory until the returned [`LayoutMarkup`] drops.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn to_structured_markup(&self, path: &Path) -> Result<LayoutMarkup> {
        let dir = self.shell.temp_dir()?;
        // pdftohtml appends ".xml" to the output root itself.
        let output_root = dir.path().join(MARKUP_ROOT);
        let markup_file = output_root.with_extension("xml");

        self.shell.run([
            self.tools.pdftohtml.as_os_str(),
            OsStr::new("-xml"),
            OsStr::new("-nodrm"),
            OsStr::new("-zoom"),
            OsStr::new("1.5"),
            OsStr::new("-enc"),
            OsStr::new("Latin1"),
            OsStr::new("-noframes"),
            path.as_os_str(),
            output_root.as_os_str(),
        ])?;

        let raw = fs::read(&markup_file)?;
        fs::remove_file(&markup_file)?;
        debug!(markup_bytes = raw.len(), "Structural markup generated");
        Ok(LayoutMarkup {
            markup: decode_latin1(&raw),
            images: dir,
        })
    }

    /// Re-serialise a possibly corrupted PDF with `pdftocairo`.
    ///
    /// On success the input file is deleted and the path of the rewritten
    /// copy is returned; the caller owns it. On failure the input is left
    /// untouched and no output file remains.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn repair(&self, path: &Path) -> Result<PathBuf> {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document.pdf".to_owned());

        let repaired = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .suffix(&format!("_{file_name}"))
            .tempfile_in(self.shell.scratch_dir())?
            .into_temp_path();

        let mut args: Vec<OsString> = vec![
            self.tools.pdftocairo.clone().into_os_string(),
            "-pdf".into(),
            "-origpagesizes".into(),
        ];
        args.push(path.as_os_str().to_owned());
        args.push(repaired.as_os_str().to_owned());
        // A failure here drops `repaired`, removing the partial output.
        self.shell.run(&args)?;

        // Until kept, a failure here still drops `repaired` with its file.
        fs::remove_file(path)?;
        let repaired = repaired
            .keep()
            .map_err(|err| ClipperError::Io(err.error))?;

        info!(repaired = %repaired.display(), "PDF repaired");
        Ok(repaired)
    }
}

/// Decode ISO-8859-1 bytes. Every byte value is the code point it encodes, so
/// this cannot fail.
fn decode_latin1(raw: &[u8]) -> String {
    raw.iter().map(|&byte| char::from(byte)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_with_image_rows_has_images() {
        let listing = b"page   num  type   width height color comp bpc  enc interp  object ID\n\
---------------------------------------------------------------------------\n\
   1     0 image     320   200  rgb     3   8  jpeg   no        12  0\n";
        assert!(ExtractionTools::has_images(listing));
    }

    #[test]
    fn header_only_listing_has_no_images() {
        let listing = b"page   num  type   width height color comp bpc  enc interp  object ID\n\
---------------------------------------------------------------------------\n";
        assert!(!ExtractionTools::has_images(listing));
        assert!(!ExtractionTools::has_images(b""));
    }

    #[test]
    fn latin1_bytes_become_utf8() {
        // "Documento de identidad electrónico" with ó as 0xF3.
        let raw = b"Documento de identidad electr\xF3nico";
        assert_eq!(decode_latin1(raw), "Documento de identidad electrónico");
    }

    fn tools_with(scratch: &Path, tools: ToolPaths) -> ExtractionTools {
        ExtractionTools::new(ShellCommand::new(scratch), tools)
    }

    #[test]
    fn missing_tool_surfaces_shell_error() {
        let scratch = tempfile::tempdir().unwrap();
        let tools = tools_with(
            scratch.path(),
            ToolPaths {
                pdftotext: PathBuf::from("docclip-missing-pdftotext"),
                ..ToolPaths::default()
            },
        );
        let err = tools.page_text(Path::new("a.pdf"), 1).unwrap_err();
        match err {
            ClipperError::Shell(shell) => {
                assert_eq!(shell.exit_code, 127);
                assert!(shell.command.starts_with("docclip-missing-pdftotext -enc UTF-8 -f 1 -l 1"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn failed_image_extraction_releases_its_directory() {
        let scratch = tempfile::tempdir().unwrap();
        let tools = tools_with(
            scratch.path(),
            ToolPaths {
                pdfimages: PathBuf::from("docclip-missing-pdfimages"),
                ..ToolPaths::default()
            },
        );
        assert!(tools.extract_images(Path::new("a.pdf"), 1).is_err());
        assert_eq!(fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[test]
    fn failed_repair_keeps_input_and_leaves_no_output() {
        let scratch = tempfile::tempdir().unwrap();
        let input = scratch.path().join("broken.pdf");
        fs::write(&input, b"%PDF-1.4 garbage").unwrap();

        let tools = tools_with(
            scratch.path(),
            ToolPaths {
                pdftocairo: PathBuf::from("docclip-missing-pdftocairo"),
                ..ToolPaths::default()
            },
        );
        assert!(tools.repair(&input).is_err());
        assert!(input.exists());
        let leftovers: Vec<_> = fs::read_dir(scratch.path())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        assert_eq!(leftovers, vec![input]);
    }

    #[cfg(unix)]
    #[test]
    fn repair_discards_output_when_input_cannot_be_removed() {
        use std::os::unix::fs::PermissionsExt;

        let scratch = tempfile::tempdir().unwrap();
        // A directory cannot be removed with remove_file.
        let input = scratch.path().join("broken.pdf");
        fs::create_dir(&input).unwrap();

        let bin = tempfile::tempdir().unwrap();
        let fake = bin.path().join("fake-pdftocairo");
        fs::write(&fake, "#!/bin/sh\necho repaired > \"$4\"\n").unwrap();
        fs::set_permissions(&fake, fs::Permissions::from_mode(0o755)).unwrap();

        let tools = tools_with(
            scratch.path(),
            ToolPaths {
                pdftocairo: fake,
                ..ToolPaths::default()
            },
        );
        assert!(matches!(tools.repair(&input), Err(ClipperError::Io(_))));
        let leftovers: Vec<_> = fs::read_dir(scratch.path())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        assert_eq!(leftovers, vec![input]);
    }

    #[test]
    fn failed_markup_conversion_leaves_nothing_behind() {
        let scratch = tempfile::tempdir().unwrap();
        let tools = tools_with(
            scratch.path(),
            ToolPaths {
                pdftohtml: PathBuf::from("docclip-missing-pdftohtml"),
                ..ToolPaths::default()
            },
        );
        assert!(tools.to_structured_markup(Path::new("a.pdf")).is_err());
        assert_eq!(fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn markup_images_live_until_the_markup_drops() {
        use std::os::unix::fs::PermissionsExt;

        let scratch = tempfile::tempdir().unwrap();
        let bin = tempfile::tempdir().unwrap();
        let fake = bin.path().join("fake-pdftohtml");
        fs::write(
            &fake,
            "#!/bin/sh\necho png > \"$9-1_1.png\"\nprintf '<pdf2xml>caf\\351</pdf2xml>' > \"$9.xml\"\n",
        )
        .unwrap();
        fs::set_permissions(&fake, fs::Permissions::from_mode(0o755)).unwrap();
        let tools = tools_with(
            scratch.path(),
            ToolPaths {
                pdftohtml: fake,
                ..ToolPaths::default()
            },
        );

        let layout = tools.to_structured_markup(Path::new("a.pdf")).unwrap();
        assert_eq!(layout.markup, "<pdf2xml>café</pdf2xml>");
        let files: Vec<_> = fs::read_dir(layout.images.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(files, vec![std::ffi::OsString::from("layout-1_1.png")]);

        drop(layout);
        assert_eq!(fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn successful_repair_replaces_input() {
        let scratch = tempfile::tempdir().unwrap();
        let input = scratch.path().join("broken.pdf");
        fs::write(&input, b"%PDF-1.4 body").unwrap();

        // Stand-in for pdftocairo: copies argument 3 to argument 4.
        let fake = scratch.path().join("fake-pdftocairo");
        fs::write(&fake, "#!/bin/sh\ncp \"$3\" \"$4\"\n").unwrap();
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&fake, fs::Permissions::from_mode(0o755)).unwrap();

        let tools = tools_with(
            scratch.path(),
            ToolPaths {
                pdftocairo: fake,
                ..ToolPaths::default()
            },
        );
        let repaired = tools.repair(&input).unwrap();
        assert!(!input.exists());
        assert!(repaired.to_string_lossy().ends_with("_broken.pdf"));
        assert_eq!(fs::read(&repaired).unwrap(), b"%PDF-1.4 body");
    }
}
