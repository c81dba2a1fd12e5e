// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// docclip — command-line entry point.
//
// Initialises logging, loads the configuration, and dispatches to the merge,
// slice, text extraction, and text search operations.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use docclip_core::error::{ClipperError, Result};
use docclip_core::{ClipperConfig, MergeAction, SliceAction};
use docclip_document::{ClipperWriter, DocumentReader, ImageToText};
use tracing::{error, info};

/// Exit code for input the caller got wrong.
const EXIT_INVALID_INPUT: u8 = 2;
/// Exit code for an external tool that ran and failed.
const EXIT_TOOL_FAILED: u8 = 3;
/// Exit code for an external tool that is not installed.
const EXIT_TOOL_MISSING: u8 = 127;

#[derive(Parser)]
#[command(name = "docclip")]
#[command(version)]
#[command(about = "Merge, slice, repair, and search PDF and image documents", long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge PDFs and images into one PDF
    Merge {
        /// Output PDF
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,

        /// Append a blank page after every input
        #[arg(long)]
        blank_pages: bool,

        /// Repair PDF inputs with pdftocairo first (the inputs are consumed)
        #[arg(long)]
        fix: bool,

        /// Inputs, each optionally suffixed with `:DEGREES` of rotation
        #[arg(value_name = "INPUT[:ROTATION]", required = true)]
        inputs: Vec<MergeAction>,
    },

    /// Build a PDF from selected pages of another
    Slice {
        /// Output PDF
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,

        /// Repair the source with pdftocairo first (the repaired copy replaces
        /// the source and its location is printed)
        #[arg(long)]
        fix: bool,

        /// Source PDF
        #[arg(value_name = "SOURCE")]
        source: PathBuf,

        /// 1-indexed pages, each optionally suffixed with `:DEGREES` of rotation
        #[arg(value_name = "PAGE[:ROTATION]", required = true)]
        pages: Vec<SliceAction>,
    },

    /// Print the text of a PDF, including text read from embedded images
    ExtractText {
        /// Only this page (1-indexed)
        #[arg(long)]
        page: Option<u32>,

        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// Print the location of every page that contains a pattern
    FindText {
        /// First page to search (0-indexed)
        #[arg(long, default_value_t = 0)]
        start_page: usize,

        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Regular expression
        #[arg(value_name = "PATTERN")]
        pattern: String,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "docclip failed");
            ExitCode::from(exit_code(&err))
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => ClipperConfig::from_json_file(path)?,
        None => ClipperConfig::default(),
    };

    match cli.command {
        Commands::Merge {
            output,
            blank_pages,
            fix,
            inputs,
        } => {
            ClipperWriter::new(&config).merge(&output, &inputs, blank_pages, fix)?;
            info!(output = %output.display(), "Merge complete");
        }
        Commands::Slice {
            output,
            fix,
            source,
            pages,
        } => {
            let used = ClipperWriter::new(&config).slice(&source, &pages, &output, fix)?;
            if used != source {
                println!("repaired source: {}", used.display());
            }
            info!(output = %output.display(), "Slice complete");
        }
        Commands::ExtractText { page, input } => {
            let mut reader = DocumentReader::with_config(&input, &config)?;
            let mut ocr = image_reader();
            let text = match page {
                Some(page) => reader.extract_page_text(page, ocr.as_mut())?,
                None => reader.extract_text(ocr.as_mut())?,
            };
            print!("{text}");
            reader.close();
        }
        Commands::FindText {
            start_page,
            input,
            pattern,
        } => {
            let mut reader = DocumentReader::with_config(&input, &config)?;
            reader.to_structured_tree()?;
            let pages = reader.pages();
            for found in reader.find_text_matches(&pages, &pattern, start_page)? {
                let text_box = reader.text_coordinates(found.node)?;
                println!(
                    "page {} left {} top {} width {} height {} {}",
                    start_page + found.page_index + 1,
                    text_box.left,
                    text_box.top,
                    text_box.width,
                    text_box.height,
                    found.node.text().trim()
                );
            }
        }
    }
    Ok(())
}

#[cfg(feature = "ocr")]
fn image_reader() -> Box<dyn ImageToText> {
    match docclip_document::OcrEngine::with_defaults() {
        Ok(engine) => Box::new(engine),
        Err(err) => {
            tracing::warn!(%err, "OCR engine unavailable, images will be skipped");
            Box::new(docclip_document::SkipImages)
        }
    }
}

#[cfg(not(feature = "ocr"))]
fn image_reader() -> Box<dyn ImageToText> {
    Box::new(docclip_document::SkipImages)
}

fn exit_code(err: &ClipperError) -> u8 {
    match err {
        ClipperError::Shell(shell) if shell.is_not_installed() => EXIT_TOOL_MISSING,
        ClipperError::Shell(_) => EXIT_TOOL_FAILED,
        err if err.is_invalid_input() => EXIT_INVALID_INPUT,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use docclip_core::ShellCommandError;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_merge_actions_with_rotation() {
        let cli = Cli::try_parse_from([
            "docclip", "merge", "-o", "out.pdf", "--blank-pages", "a.pdf:90", "scan.jpg",
        ])
        .unwrap();
        match cli.command {
            Commands::Merge {
                output,
                blank_pages,
                fix,
                inputs,
            } => {
                assert_eq!(output, PathBuf::from("out.pdf"));
                assert!(blank_pages);
                assert!(!fix);
                assert_eq!(
                    inputs,
                    vec![MergeAction::new("a.pdf", 90), MergeAction::new("scan.jpg", 0)]
                );
            }
            _ => panic!("expected merge"),
        }
    }

    #[test]
    fn parses_slice_pages() {
        let cli = Cli::try_parse_from([
            "docclip", "--config", "c.json", "slice", "-o", "o.pdf", "in.pdf", "3", "1:180",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("c.json")));
        match cli.command {
            Commands::Slice { pages, source, .. } => {
                assert_eq!(source, PathBuf::from("in.pdf"));
                assert_eq!(pages, vec![SliceAction::new(3, 0), SliceAction::new(1, 180)]);
            }
            _ => panic!("expected slice"),
        }
    }

    #[test]
    fn rejects_malformed_page() {
        assert!(Cli::try_parse_from(["docclip", "slice", "-o", "o.pdf", "in.pdf", "two"]).is_err());
    }

    #[test]
    fn slice_requires_pages() {
        assert!(Cli::try_parse_from(["docclip", "slice", "-o", "o.pdf", "in.pdf"]).is_err());
    }

    #[test]
    fn exit_codes_follow_error_kind() {
        let missing = ClipperError::Shell(ShellCommandError::new("pdftotext -", 127, vec![], vec![]));
        let failed = ClipperError::Shell(ShellCommandError::new("pdftotext -", 1, vec![], vec![]));
        let range = ClipperError::InvalidRange("page numbers cannot be lower than 1.".into());
        let io = ClipperError::Io(std::io::Error::other("disk"));

        if cfg!(unix) {
            assert_eq!(exit_code(&missing), EXIT_TOOL_MISSING);
        }
        assert_eq!(exit_code(&failed), EXIT_TOOL_FAILED);
        assert_eq!(exit_code(&range), EXIT_INVALID_INPUT);
        assert_eq!(exit_code(&io), 1);
    }

    #[test]
    fn missing_config_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let cli = Cli {
            config: Some(dir.path().join("absent.json")),
            command: Commands::FindText {
                start_page: 0,
                input: dir.path().join("absent.pdf"),
                pattern: "x".into(),
            },
        };
        assert!(matches!(run(cli), Err(ClipperError::Io(_))));
    }
}
