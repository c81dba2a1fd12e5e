// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Text-location search and geometry lookups over a structured tree.

use docclip_core::error::{ClipperError, Result};
use regex::Regex;
use tracing::{debug, instrument};

use super::tree::Node;

/// A page that contains the searched text, and the `text` node holding it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextMatch<'a> {
    /// Position of the page within the searched slice, i.e. relative to the
    /// start page, not to the document.
    pub page_index: usize,
    pub node: Node<'a>,
}

/// Location and size of a text run, in markup units.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TextBox {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PageDimensions {
    pub width: f64,
    pub height: f64,
}

/// Search `pages[start_page..]` for `pattern`.
///
/// Only the first hit of each page is reported. A hit is a run of character
/// data matching the regular expression; the reported node is the closest
/// enclosing `text` element. Runs outside any `text` element are ignored.
///
/// Returns an empty list when nothing matches or `start_page` is past the
/// last page.
#[instrument(skip(pages), fields(pages = pages.len()))]
pub fn find_text_matches<'a>(
    pages: &[Node<'a>],
    pattern: &str,
    start_page: usize,
) -> Result<Vec<TextMatch<'a>>> {
    let regex = Regex::new(pattern).map_err(|err| ClipperError::InvalidPattern(err.to_string()))?;
    Ok(find_regex_matches(pages, &regex, start_page))
}

/// [`find_text_matches`] with a compiled expression.
pub fn find_regex_matches<'a>(
    pages: &[Node<'a>],
    regex: &Regex,
    start_page: usize,
) -> Vec<TextMatch<'a>> {
    let Some(searched) = pages.get(start_page..) else {
        return Vec::new();
    };

    let matches: Vec<TextMatch<'a>> = searched
        .iter()
        .enumerate()
        .filter_map(|(page_index, page)| {
            page.descendants()
                .filter(|node| node.content().is_some_and(|text| regex.is_match(text)))
                .find_map(|node| node.nearest_text_ancestor())
                .map(|node| TextMatch { page_index, node })
        })
        .collect();

    debug!(hits = matches.len(), start_page, "Text search complete");
    matches
}

/// Position and size of a `text` node; absent attributes read as `0`.
pub fn text_coordinates(node: Node<'_>) -> Result<TextBox> {
    if !node.is_text() {
        return Err(ClipperError::InvalidNodeKind(node.name().to_owned()));
    }
    Ok(TextBox {
        left: node.float_attr("left", 0.0),
        top: node.float_attr("top", 0.0),
        width: node.float_attr("width", 0.0),
        height: node.float_attr("height", 0.0),
    })
}

/// Width and height of a page node; absent attributes read as `0`.
pub fn page_dimensions(page: Node<'_>) -> PageDimensions {
    PageDimensions {
        width: page.float_attr("width", 0.0),
        height: page.float_attr("height", 0.0),
    }
}
