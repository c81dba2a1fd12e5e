// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Action types shared by the assembly engine and the CLI.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One input of a merge: a PDF or raster image, rotated counter-clockwise by
/// `rotation` degrees.
///
/// An empty `path` is a placeholder and contributes nothing to the merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeAction {
    pub path: PathBuf,
    pub rotation: i32,
}

impl MergeAction {
    pub fn new(path: impl Into<PathBuf>, rotation: i32) -> Self {
        Self {
            path: path.into(),
            rotation,
        }
    }

    /// True for placeholder actions without a source.
    pub fn is_placeholder(&self) -> bool {
        self.path.as_os_str().is_empty()
    }
}

/// One output page of a slice: the 1-indexed source page, rotated counter-clockwise
/// by `rotation` degrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliceAction {
    pub page: u32,
    pub rotation: i32,
}

impl SliceAction {
    pub fn new(page: u32, rotation: i32) -> Self {
        Self { page, rotation }
    }
}

/// Failure to parse an action from its `TARGET[:ROTATION]` text form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionParseError(String);

impl fmt::Display for ActionParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ActionParseError {}

/// Split `TARGET[:ROTATION]`. A suffix that is not an integer belongs to the
/// target (paths may legitimately contain colons).
fn split_rotation(raw: &str) -> (&str, i32) {
    match raw.rsplit_once(':') {
        Some((target, rotation)) => match rotation.parse::<i32>() {
            Ok(degrees) => (target, degrees),
            Err(_) => (raw, 0),
        },
        None => (raw, 0),
    }
}

impl FromStr for MergeAction {
    type Err = ActionParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (path, rotation) = split_rotation(raw);
        Ok(Self::new(path, rotation))
    }
}

impl FromStr for SliceAction {
    type Err = ActionParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (page, rotation) = split_rotation(raw);
        let page = page
            .parse::<u32>()
            .map_err(|err| ActionParseError(format!("invalid page number '{page}': {err}")))?;
        Ok(Self::new(page, rotation))
    }
}
