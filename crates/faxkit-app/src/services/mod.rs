// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Service layer: the editing session, scripted editing against it, and the
// worker that runs blocking document work for it.

pub mod data_dir;
pub mod script;
pub mod session;
pub mod worker;
