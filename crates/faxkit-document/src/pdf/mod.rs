// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF module: reading, content interpretation, page copying and generation.

pub mod content;
pub mod copy;
pub mod fonts;
pub mod reader;
pub mod writer;

pub use copy::OutputDocument;
pub use reader::{DocumentInfo, PdfReader};
pub use writer::{PdfWriter, TextLine};
