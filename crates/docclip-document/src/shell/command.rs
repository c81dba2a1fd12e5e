// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Process gateway — run external command-line tools with captured output and
// hand out scoped temporary directories.

use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use docclip_core::error::{EXIT_CODE_NOT_FOUND, ShellCommandError};
use tempfile::TempDir;
use tracing::{debug, instrument};

/// Prefix for every temporary file or directory docclip creates.
pub(crate) const TEMP_PREFIX: &str = "docclip-";

/// Captured output of a successful command.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Runs external programs and owns the scratch directory they work in.
#[derive(Debug, Clone)]
pub struct ShellCommand {
    scratch_dir: PathBuf,
}

impl ShellCommand {
    pub fn new(scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
        }
    }

    /// Directory new temporary artifacts are created in.
    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Run `args[0]` with the remaining arguments and wait for it to exit.
    ///
    /// Both pipes are drained while the child runs, so large outputs cannot
    /// fill a pipe buffer and stall the process.
    #[instrument(skip_all)]
    pub fn run<I, S>(&self, args: I) -> Result<CommandOutput, ShellCommandError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let args: Vec<S> = args.into_iter().collect();
        let command_line = args
            .iter()
            .map(|arg| arg.as_ref().to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ");

        let Some((program, rest)) = args.split_first() else {
            return Err(ShellCommandError::new(
                command_line,
                EXIT_CODE_NOT_FOUND,
                Vec::new(),
                Vec::new(),
            ));
        };

        debug!(command = %command_line, "Running external command");

        let output = Command::new(program)
            .args(rest)
            .stdin(Stdio::null())
            .output()
            .map_err(|err| launch_error(&command_line, &err))?;

        if !output.status.success() {
            let exit_code = output.status.code().unwrap_or(-1);
            debug!(command = %command_line, exit_code, "External command failed");
            return Err(ShellCommandError::new(
                command_line,
                exit_code,
                output.stdout,
                output.stderr,
            ));
        }

        debug!(
            command = %command_line,
            stdout_bytes = output.stdout.len(),
            stderr_bytes = output.stderr.len(),
            "External command finished"
        );

        Ok(CommandOutput {
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }

    /// Create a fresh, empty directory that is removed when the guard drops.
    pub fn temp_dir(&self) -> io::Result<TempDir> {
        tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempdir_in(&self.scratch_dir)
    }
}

impl Default for ShellCommand {
    fn default() -> Self {
        Self::new(std::env::temp_dir())
    }
}

/// Map a spawn failure onto the shell convention: a missing executable is
/// exit code 127, anything else carries the OS error number.
fn launch_error(command_line: &str, err: &io::Error) -> ShellCommandError {
    if err.kind() == io::ErrorKind::NotFound {
        ShellCommandError::new(command_line, EXIT_CODE_NOT_FOUND, Vec::new(), Vec::new())
    } else {
        ShellCommandError::new(
            command_line,
            err.raw_os_error().unwrap_or(-1),
            Vec::new(),
            err.to_string().into_bytes(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn captures_stdout_and_stderr() {
        let shell = ShellCommand::default();
        let output = shell
            .run(["sh", "-c", "printf out; printf err >&2"])
            .unwrap();
        assert_eq!(output.stdout, b"out");
        assert_eq!(output.stderr, b"err");
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_keeps_streams() {
        let shell = ShellCommand::default();
        let err = shell
            .run(["sh", "-c", "printf partial; printf broken >&2; exit 3"])
            .unwrap_err();
        assert_eq!(err.exit_code, 3);
        assert_eq!(err.stdout, b"partial");
        assert_eq!(err.stderr, b"broken");
        assert_eq!(err.executable, "sh");
    }

    #[test]
    fn missing_executable_maps_to_127() {
        let shell = ShellCommand::default();
        let err = shell
            .run(["docclip-definitely-not-installed", "--version"])
            .unwrap_err();
        assert_eq!(err.exit_code, EXIT_CODE_NOT_FOUND);
        assert_eq!(err.command, "docclip-definitely-not-installed --version");
    }

    #[cfg(unix)]
    #[test]
    fn large_output_does_not_stall() {
        let shell = ShellCommand::default();
        // Well past the usual 64 KiB pipe buffer on both streams.
        let output = shell
            .run([
                "sh",
                "-c",
                "head -c 1048576 /dev/zero; head -c 1048576 /dev/zero >&2",
            ])
            .unwrap();
        assert_eq!(output.stdout.len(), 1 << 20);
        assert_eq!(output.stderr.len(), 1 << 20);
    }

    #[test]
    fn temp_dir_is_empty_and_scoped() {
        let scratch = tempfile::tempdir().unwrap();
        let shell = ShellCommand::new(scratch.path());

        let dir = shell.temp_dir().unwrap();
        let path = dir.path().to_path_buf();
        assert!(path.starts_with(scratch.path()));
        assert_eq!(std::fs::read_dir(&path).unwrap().count(), 0);

        drop(dir);
        assert!(!path.exists());
    }
}
