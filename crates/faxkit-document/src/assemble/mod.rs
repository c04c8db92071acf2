// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Assembly of the final fax document from sources, edits and cover page.

pub mod assembler;
pub mod atomic;
pub mod validate;

pub use assembler::{AssemblyInput, AssemblyReport, DocumentAssembler, DocumentReport};
pub use atomic::write_atomic;
pub use validate::{AssemblyValidation, DocumentCheck};
