// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Atomic file output.
//
// Bytes go to a temporary file in the destination directory, are synced, and
// the temporary file is renamed over the destination. A failure on any path
// drops the temporary file, which deletes it, so the destination is either
// the complete new file or exactly what was there before.

use std::io::Write;
use std::path::Path;

use faxkit_core::error::Result;
use tempfile::{NamedTempFile, PersistError};
use tracing::{info, instrument};

use crate::retry::{LockOutcome, RetryConfig, is_lock_error, retry_while_locked};

/// Write `bytes` to `dest` atomically, retrying the final rename while the
/// destination is locked.
#[instrument(skip_all, fields(dest = %dest.display(), bytes_len = bytes.len()))]
pub fn write_atomic(dest: &Path, bytes: &[u8], retry: &RetryConfig) -> Result<()> {
    write_atomic_with(dest, bytes, retry, |temp, dest| temp.persist(dest).map(|_| ()))
}

/// [`write_atomic`] with a custom rename step.
pub(crate) fn write_atomic_with(
    dest: &Path,
    bytes: &[u8],
    retry: &RetryConfig,
    mut persist: impl FnMut(NamedTempFile, &Path) -> std::result::Result<(), PersistError>,
) -> Result<()> {
    let dir = dest
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let mut temp = tempfile::Builder::new()
        .prefix(".faxkit-")
        .suffix(".part")
        .tempfile_in(dir)?;
    temp.write_all(bytes)?;
    temp.as_file().sync_all()?;

    let mut pending = Some(temp);
    retry_while_locked(dest, retry, |_| {
        let Some(temp) = pending.take() else {
            return LockOutcome::StillLocked;
        };
        match persist(temp, dest) {
            Ok(()) => LockOutcome::Success(()),
            Err(err) if is_lock_error(&err.error) => {
                pending = Some(err.file);
                LockOutcome::StillLocked
            }
            Err(err) => LockOutcome::Failed(err.error.into()),
        }
    })?;

    info!("output written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use faxkit_core::FaxkitError;
    use std::io;
    use std::time::Duration;

    fn fast() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        }
    }

    fn leftovers(dir: &Path) -> usize {
        std::fs::read_dir(dir)
            .expect("read dir")
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".part"))
            .count()
    }

    #[test]
    fn replaces_destination_and_cleans_up() {
        let dir = tempfile::tempdir().expect("tempdir");
        let dest = dir.path().join("fax.pdf");
        std::fs::write(&dest, b"old").expect("seed");

        write_atomic(&dest, b"new contents", &fast()).expect("write");
        assert_eq!(std::fs::read(&dest).expect("read"), b"new contents");
        assert_eq!(leftovers(dir.path()), 0);
    }

    #[test]
    fn retries_while_locked_then_succeeds() {
        let dir = tempfile::tempdir().expect("tempdir");
        let dest = dir.path().join("fax.pdf");
        let mut attempts = 0;
        write_atomic_with(&dest, b"data", &fast(), |temp, dest| {
            attempts += 1;
            if attempts < 3 {
                return Err(PersistError {
                    error: io::Error::from(io::ErrorKind::PermissionDenied),
                    file: temp,
                });
            }
            temp.persist(dest).map(|_| ())
        })
        .expect("write");
        assert_eq!(attempts, 3);
        assert_eq!(std::fs::read(&dest).expect("read"), b"data");
    }

    #[test]
    fn persistent_lock_leaves_destination_untouched() {
        let dir = tempfile::tempdir().expect("tempdir");
        let dest = dir.path().join("fax.pdf");
        std::fs::write(&dest, b"previous fax").expect("seed");

        let err = write_atomic_with(&dest, b"data", &fast(), |temp, _| {
            Err(PersistError {
                error: io::Error::from(io::ErrorKind::PermissionDenied),
                file: temp,
            })
        })
        .expect_err("locked");
        assert!(matches!(err, FaxkitError::ResourceLock { attempts: 3, .. }));
        assert_eq!(std::fs::read(&dest).expect("read"), b"previous fax");
        assert_eq!(leftovers(dir.path()), 0);
    }

    #[test]
    fn missing_directory_fails_without_output() {
        let dir = tempfile::tempdir().expect("tempdir");
        let dest = dir.path().join("no-such-dir").join("fax.pdf");
        assert!(matches!(write_atomic(&dest, b"data", &fast()), Err(FaxkitError::Io(_))));
        assert!(!dest.exists());
    }
}
