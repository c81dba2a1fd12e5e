// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// External tool module — process gateway and the Poppler extraction commands.

pub mod command;
pub mod poppler;

pub use command::{CommandOutput, ShellCommand};
pub use poppler::{ExtractionTools, LayoutMarkup};
