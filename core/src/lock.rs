//! Advisory file-based locking
//!
//! Cross-process mutual exclusion for repository writers. A lock is an
//! exclusively-created marker file under `locks/`; contention is handled
//! with exponential backoff, and markers older than a staleness threshold
//! are treated as left behind by a crashed process and reclaimed.

use crate::error::{FluxError, Result};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Tuning knobs for lock acquisition.
#[derive(Debug, Clone)]
pub struct LockConfig {
    /// Give up with [`FluxError::LockTimeout`] after this long.
    pub timeout: Duration,
    /// First backoff delay on contention.
    pub initial_delay: Duration,
    /// Backoff delays double up to this cap.
    pub max_delay: Duration,
    /// Markers older than this are reclaimed as abandoned.
    ///
    /// Liveness over caution: a crashed writer must not wedge the
    /// repository forever, and legitimate critical sections finish in
    /// seconds, not minutes. Reclaims are logged at warn level.
    pub stale_after: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
            stale_after: Duration::from_secs(600),
        }
    }
}

/// Contents of a lock marker file, for debugging and staleness checks.
#[derive(Debug, Serialize, Deserialize)]
struct LockMarker {
    pid: u32,
    hostname: String,
    acquired_at: DateTime<Utc>,
}

/// An acquired advisory lock. Released on drop; dropping twice or after
/// an explicit [`FileLock::release`] is a no-op.
#[derive(Debug)]
pub struct FileLock {
    name: String,
    path: PathBuf,
    acquired: bool,
}

impl FileLock {
    /// Acquire the named lock, blocking up to `config.timeout`.
    pub fn acquire(locks_dir: &Path, name: &str, config: &LockConfig) -> Result<FileLock> {
        Self::acquire_with_cancel(locks_dir, name, config, None)
    }

    /// Acquire the named lock with a cooperative cancellation flag.
    ///
    /// When `cancel` becomes true the backoff loop aborts early with
    /// [`FluxError::LockTimeout`] and no marker is left behind.
    pub fn acquire_with_cancel(
        locks_dir: &Path,
        name: &str,
        config: &LockConfig,
        cancel: Option<&AtomicBool>,
    ) -> Result<FileLock> {
        std::fs::create_dir_all(locks_dir)?;
        let path = locks_dir.join(format!("{name}.lock"));

        let start = Instant::now();
        let mut delay = config.initial_delay;

        loop {
            match Self::try_create_marker(&path) {
                Ok(()) => {
                    log::debug!("Lock acquired: {}", path.display());
                    return Ok(FileLock {
                        name: name.to_string(),
                        path,
                        acquired: true,
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if Self::reclaim_if_stale(&path, name, config.stale_after)? {
                        continue;
                    }
                    let cancelled = cancel.is_some_and(|c| c.load(Ordering::Relaxed));
                    if cancelled || start.elapsed() >= config.timeout {
                        return Err(FluxError::LockTimeout {
                            name: name.to_string(),
                            timeout_secs: start.elapsed().as_secs_f64(),
                        });
                    }
                    let jitter = rand::thread_rng().gen_range(0..=delay.as_millis() as u64 / 4);
                    let sleep_for = delay + Duration::from_millis(jitter);
                    log::debug!(
                        "Lock '{name}' is held, retrying in {:.2}s (elapsed: {:.2}s)",
                        sleep_for.as_secs_f64(),
                        start.elapsed().as_secs_f64()
                    );
                    std::thread::sleep(sleep_for);
                    delay = (delay * 2).min(config.max_delay);
                }
                Err(e) => {
                    return Err(FluxError::Lock {
                        name: name.to_string(),
                        message: e.to_string(),
                    })
                }
            }
        }
    }

    /// Atomically create the marker file (fails if it already exists).
    fn try_create_marker(path: &Path) -> std::io::Result<()> {
        let marker = LockMarker {
            pid: std::process::id(),
            hostname: whoami::fallible::hostname().unwrap_or_else(|_| "unknown".to_string()),
            acquired_at: Utc::now(),
        };
        let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
        let body = serde_json::to_string(&marker).unwrap_or_default();
        file.write_all(body.as_bytes())?;
        Ok(())
    }

    /// Remove the marker if its holder looks dead. Returns true if the
    /// marker was reclaimed and acquisition should be retried at once.
    fn reclaim_if_stale(path: &Path, name: &str, stale_after: Duration) -> Result<bool> {
        match Self::marker_age(path) {
            Some(age) if age > stale_after => {
                log::warn!(
                    "Reclaiming stale lock '{name}' (held for {:.0}s, threshold {:.0}s)",
                    age.as_secs_f64(),
                    stale_after.as_secs_f64()
                );
                match std::fs::remove_file(path) {
                    Ok(()) => Ok(true),
                    // Another contender reclaimed it first
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(true),
                    Err(e) => Err(FluxError::Lock {
                        name: name.to_string(),
                        message: format!("failed to reclaim stale lock: {e}"),
                    }),
                }
            }
            _ => Ok(false),
        }
    }

    /// Age of the marker, from its recorded timestamp or file mtime.
    fn marker_age(path: &Path) -> Option<Duration> {
        if let Ok(body) = std::fs::read_to_string(path) {
            if let Ok(marker) = serde_json::from_str::<LockMarker>(&body) {
                let age = Utc::now().signed_duration_since(marker.acquired_at);
                return age.to_std().ok();
            }
        }
        let mtime = std::fs::metadata(path).ok()?.modified().ok()?;
        mtime.elapsed().ok()
    }

    /// Name this lock was acquired under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Release the lock. Safe to call more than once.
    pub fn release(&mut self) {
        if !self.acquired {
            return;
        }
        self.acquired = false;
        match std::fs::remove_file(&self.path) {
            Ok(()) => log::debug!("Lock released: {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("Failed to remove lock file {}: {e}", self.path.display()),
        }
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        self.release();
    }
}
