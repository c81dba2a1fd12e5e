// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for docclip.

use std::fmt;

use thiserror::Error;

/// Exit code a POSIX shell reports when the executable cannot be found.
pub const EXIT_CODE_NOT_FOUND: i32 = 127;

/// An external command failed to launch or exited with a non-zero status.
///
/// Carries everything needed to diagnose the failure without re-running the
/// command: the full command line, the exit code, and both captured streams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommandError {
    /// The command line, arguments joined by single spaces.
    pub command: String,
    /// First element of the command line.
    pub executable: String,
    /// Process exit code (127 when the executable was not found).
    pub exit_code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ShellCommandError {
    pub fn new(command: impl Into<String>, exit_code: i32, stdout: Vec<u8>, stderr: Vec<u8>) -> Self {
        let command = command.into();
        let executable = command.split_whitespace().next().unwrap_or_default().to_owned();
        Self {
            command,
            executable,
            exit_code,
            stdout,
            stderr,
        }
    }

    /// True when the failure means the executable is missing from the system.
    pub fn is_not_installed(&self) -> bool {
        cfg!(unix) && self.exit_code == EXIT_CODE_NOT_FOUND
    }

    pub fn not_installed_message(&self) -> String {
        format!(
            "The command `{}` failed because `{}` is not installed on your system",
            self.command, self.executable
        )
    }

    pub fn failed_message(&self) -> String {
        format!(
            "The command `{}` failed with exit code {} stdout {} stderr {}",
            self.command,
            self.exit_code,
            String::from_utf8_lossy(&self.stdout),
            String::from_utf8_lossy(&self.stderr)
        )
    }
}

impl fmt::Display for ShellCommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_not_installed() {
            f.write_str(&self.not_installed_message())
        } else {
            f.write_str(&self.failed_message())
        }
    }
}

impl std::error::Error for ShellCommandError {}

/// Top-level error type for all docclip operations.
#[derive(Debug, Error)]
pub enum ClipperError {
    // -- External tools --
    #[error(transparent)]
    Shell(#[from] ShellCommandError),

    // -- Structure model --
    #[error("malformed structural markup: {0}")]
    Parse(String),

    #[error("Input node is not of type 'text' (got '{0}')")]
    InvalidNodeKind(String),

    #[error("invalid search pattern: {0}")]
    InvalidPattern(String),

    // -- Assembly --
    #[error("Invalid page numbers range in actions: {0}")]
    InvalidRange(String),

    #[error("cannot add {path} to the merged document: {reason}")]
    DocumentAssembly { path: String, reason: String },

    #[error("PDF operation failed: {0}")]
    PdfError(String),

    #[error("image processing failed: {0}")]
    ImageError(String),

    #[error("OCR failed: {0}")]
    OcrError(String),

    #[error("text is not valid UTF-8: {0}")]
    Encoding(String),

    // -- Storage / configuration --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ClipperError {
    /// True for errors caused by caller input rather than the environment.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            Self::InvalidRange(_) | Self::InvalidNodeKind(_) | Self::InvalidPattern(_)
        )
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ClipperError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn executable_is_first_word_of_command() {
        let err = ShellCommandError::new("pdftotext -enc UTF-8 a.pdf -", 1, Vec::new(), Vec::new());
        assert_eq!(err.executable, "pdftotext");
    }

    #[cfg(unix)]
    #[test]
    fn exit_127_reads_as_not_installed() {
        let err = ShellCommandError::new("pdfimages -list a.pdf", 127, Vec::new(), Vec::new());
        assert!(err.is_not_installed());
        assert_eq!(
            err.to_string(),
            "The command `pdfimages -list a.pdf` failed because `pdfimages` is not installed on your system"
        );
    }

    #[test]
    fn other_exit_codes_embed_streams() {
        let err = ShellCommandError::new("pdftohtml -xml x.pdf", 2, b"partial".to_vec(), b"boom".to_vec());
        assert!(!err.is_not_installed());
        let message = err.to_string();
        assert!(message.contains("exit code 2"), "{message}");
        assert!(message.contains("stdout partial"), "{message}");
        assert!(message.contains("stderr boom"), "{message}");
    }

    #[test]
    fn range_errors_keep_the_original_wording() {
        let err = ClipperError::InvalidRange("page numbers cannot be lower than 1.".into());
        assert_eq!(
            err.to_string(),
            "Invalid page numbers range in actions: page numbers cannot be lower than 1."
        );
        assert!(err.is_invalid_input());
    }
}
