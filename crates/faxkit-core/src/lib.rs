// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Faxkit — shared page geometry, identifiers, configuration and errors.

pub mod config;
pub mod error;
pub mod human_errors;
pub mod types;

pub use config::FaxkitConfig;
pub use error::FaxkitError;
pub use types::*;
