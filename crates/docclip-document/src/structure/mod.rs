// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Structure module — the parsed page/text-node tree and searches over it.

pub mod search;
pub mod tree;

pub use search::{
    PageDimensions, TextBox, TextMatch, find_regex_matches, find_text_matches, page_dimensions,
    text_coordinates,
};
pub use tree::{Node, NodeId, NodeKind, StructuredTree};
