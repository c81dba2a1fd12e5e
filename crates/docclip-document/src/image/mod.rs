// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image module — page fitting, JPEG normalisation, and format sniffing.

pub mod processor;

pub use processor::{ImageProcessor, convert_to_jpeg, is_raster_image};
