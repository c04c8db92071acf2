// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Process-wide exclusive leases on source documents.
//
// An editing session holds a lease for every document it has open. A second
// lease on the same canonical path is refused until the first is dropped.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, OnceLock};

use faxkit_core::error::{FaxkitError, Result};
use tracing::debug;

fn held() -> MutexGuard<'static, HashSet<PathBuf>> {
    static HELD: OnceLock<Mutex<HashSet<PathBuf>>> = OnceLock::new();
    HELD.get_or_init(Default::default)
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Exclusive claim on a document path. Released on drop.
#[derive(Debug)]
pub struct DocumentLease {
    path: PathBuf,
}

impl DocumentLease {
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let canonical = std::fs::canonicalize(path).map_err(|err| FaxkitError::DocumentLoad {
            document: path.display().to_string(),
            reason: err.to_string(),
        })?;
        if !held().insert(canonical.clone()) {
            return Err(FaxkitError::DocumentInUse(canonical.display().to_string()));
        }
        debug!(path = %canonical.display(), "lease acquired");
        Ok(Self { path: canonical })
    }

    /// Canonical path of the leased document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_held(path: impl AsRef<Path>) -> bool {
        std::fs::canonicalize(path).is_ok_and(|p| held().contains(&p))
    }
}

impl Drop for DocumentLease {
    fn drop(&mut self) {
        held().remove(&self.path);
        debug!(path = %self.path.display(), "lease released");
    }
}
