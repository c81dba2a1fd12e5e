// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF module — reading and searching documents, and assembling new ones.

pub mod pages;
pub mod reader;
pub mod writer;

#[cfg(test)]
pub(crate) mod fixtures;

pub use pages::PageAssembler;
pub use reader::DocumentReader;
pub use writer::ClipperWriter;
