// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bounded retry with exponential backoff + jitter for file-lock contention.
//
// Only lock contention is retried. Every attempt reports a typed outcome;
// anything other than `StillLocked` ends the loop immediately.

use std::io;
use std::path::Path;
use std::time::Duration;

use faxkit_core::config::LockRetry;
use faxkit_core::error::{FaxkitError, Result};
use tracing::{debug, warn};

/// Retry configuration.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Base delay between attempts (exponential backoff).
    pub base_delay: Duration,
    /// Maximum delay between attempts.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::from(&LockRetry::default())
    }
}

impl From<&LockRetry> for RetryConfig {
    fn from(value: &LockRetry) -> Self {
        Self {
            max_attempts: value.max_attempts.max(1),
            base_delay: Duration::from_millis(value.base_delay_ms),
            max_delay: Duration::from_millis(value.max_delay_ms),
        }
    }
}

/// What one attempt at a lock-sensitive operation produced.
#[derive(Debug)]
pub enum LockOutcome<T> {
    Success(T),
    /// The target was locked by someone else; worth another try.
    StillLocked,
    /// Any other failure; not retried.
    Failed(FaxkitError),
}

/// Run `attempt` until it succeeds, fails, or the attempts are used up.
///
/// `attempt` receives the 0-based attempt number. Exhaustion is reported as
/// `ResourceLock` for `path`.
pub fn retry_while_locked<T>(
    path: &Path,
    config: &RetryConfig,
    mut attempt: impl FnMut(u32) -> LockOutcome<T>,
) -> Result<T> {
    let max_attempts = config.max_attempts.max(1);
    for n in 0..max_attempts {
        match attempt(n) {
            LockOutcome::Success(value) => {
                if n > 0 {
                    debug!(path = %path.display(), attempts = n + 1, "lock released");
                }
                return Ok(value);
            }
            LockOutcome::Failed(err) => return Err(err),
            LockOutcome::StillLocked if n + 1 < max_attempts => {
                let delay = compute_delay(n, config);
                debug!(path = %path.display(), attempt = n, delay_ms = delay.as_millis() as u64, "locked, backing off");
                std::thread::sleep(delay);
            }
            LockOutcome::StillLocked => {}
        }
    }
    warn!(path = %path.display(), attempts = max_attempts, "lock retries exhausted");
    Err(FaxkitError::ResourceLock {
        path: path.to_path_buf(),
        attempts: max_attempts,
    })
}

/// Whether an I/O error means another process holds the file.
pub fn is_lock_error(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::PermissionDenied {
        return true;
    }
    // ERROR_SHARING_VIOLATION, ERROR_LOCK_VIOLATION
    cfg!(windows) && matches!(err.raw_os_error(), Some(32) | Some(33))
}

/// Compute exponential backoff delay with jitter.
///
/// delay = min(base * 2^attempt + jitter, max_delay)
pub fn compute_delay(attempt: u32, config: &RetryConfig) -> Duration {
    let base_ms = config.base_delay.as_millis() as u64;
    let exp_ms = base_ms.saturating_mul(1u64 << attempt.min(10));
    let total_ms = exp_ms.saturating_add(jitter(base_ms, attempt));
    Duration::from_millis(total_ms.min(config.max_delay.as_millis() as u64))
}

/// Deterministic jitter in `[0, base)` derived from the attempt number.
fn jitter(base_ms: u64, attempt: u32) -> u64 {
    let hash = (attempt as u64).wrapping_mul(6364136223846793005);
    hash % base_ms.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast() -> RetryConfig {
        RetryConfig {
            max_attempts: 4,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        }
    }

    #[test]
    fn succeeds_after_transient_lock() {
        let mut calls = 0;
        let value = retry_while_locked(Path::new("out.pdf"), &fast(), |n| {
            calls += 1;
            if n < 2 { LockOutcome::StillLocked } else { LockOutcome::Success(n) }
        })
        .expect("should succeed");
        assert_eq!(value, 2);
        assert_eq!(calls, 3);
    }

    #[test]
    fn exhaustion_is_a_resource_lock_error() {
        let mut calls = 0;
        let err = retry_while_locked::<()>(Path::new("out.pdf"), &fast(), |_| {
            calls += 1;
            LockOutcome::StillLocked
        })
        .expect_err("should give up");
        assert_eq!(calls, 4);
        assert!(matches!(err, FaxkitError::ResourceLock { attempts: 4, .. }));
    }

    #[test]
    fn other_failures_are_not_retried() {
        let mut calls = 0;
        let err = retry_while_locked::<()>(Path::new("out.pdf"), &fast(), |_| {
            calls += 1;
            LockOutcome::Failed(FaxkitError::PdfError("boom".into()))
        })
        .expect_err("should fail");
        assert_eq!(calls, 1);
        assert!(matches!(err, FaxkitError::PdfError(_)));
    }

    #[test]
    fn delay_increases_and_is_capped() {
        let config = RetryConfig::default();
        let d0 = compute_delay(0, &config);
        let d1 = compute_delay(1, &config);
        let d2 = compute_delay(2, &config);
        assert!(d1 > d0);
        assert!(d2 > d1);
        assert!(compute_delay(20, &config) <= config.max_delay);
    }

    #[test]
    fn permission_denied_counts_as_locked() {
        assert!(is_lock_error(&io::Error::from(io::ErrorKind::PermissionDenied)));
        assert!(!is_lock_error(&io::Error::from(io::ErrorKind::NotFound)));
    }
}
