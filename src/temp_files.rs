//! Registry of temporary capture and upload files.
//!
//! Every file the pipeline writes goes through here so it can be removed
//! again: explicitly, by a full cleanup at startup/shutdown, or by the
//! periodic sweep once it is older than an hour. The registry is shared
//! (`Arc`) between the capture path and the sweeper, so all state sits
//! behind a mutex.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};

/// Prefix of every file this app writes into the temp directory.
pub const TEMP_FILE_PREFIX: &str = "sniptex-";

/// Files older than this are swept.
pub const MAX_FILE_AGE: Duration = Duration::from_secs(60 * 60);

pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);
pub const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// Source of "now", injectable so expiry can be tested without waiting.
pub trait Clock: Send + Sync {
    fn now(&self) -> SystemTime;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub removed: usize,
    pub failed: usize,
}

pub struct TempFileRegistry {
    dir: PathBuf,
    clock: Box<dyn Clock>,
    files: Mutex<HashMap<PathBuf, SystemTime>>,
    seq: AtomicU64,
    max_age: Duration,
}

impl TempFileRegistry {
    /// Creates a registry writing into `dir` (created if missing).
    pub fn create(dir: impl Into<PathBuf>) -> io::Result<Self> {
        Self::with_clock(dir, SystemClock)
    }

    pub fn with_clock(dir: impl Into<PathBuf>, clock: impl Clock + 'static) -> io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            clock: Box::new(clock),
            files: Mutex::new(HashMap::new()),
            seq: AtomicU64::new(0),
            max_age: MAX_FILE_AGE,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Fresh, prefixed, timestamped path. Nothing is written or registered.
    pub fn unique_path(&self, kind: &str, extension: &str) -> PathBuf {
        let stamp: DateTime<Utc> = self.clock.now().into();
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let extension = extension.trim_start_matches('.');
        self.dir.join(format!(
            "{}{}-{}-{}.{}",
            TEMP_FILE_PREFIX,
            kind,
            stamp.format("%Y%m%d-%H%M%S%3f"),
            seq,
            if extension.is_empty() { "png" } else { extension }
        ))
    }

    /// Writes `bytes` to a new unique file and registers it.
    ///
    /// The extension may come from the frontend, so anything but ASCII
    /// letters and digits is rejected.
    pub fn write_file(&self, kind: &str, extension: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        if !extension
            .trim_start_matches('.')
            .chars()
            .all(|c| c.is_ascii_alphanumeric())
        {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("Invalid file extension {:?}", extension),
            ));
        }
        let path = self.unique_path(kind, extension);
        std::fs::write(&path, bytes)?;
        self.register(&path);
        Ok(path)
    }

    pub fn register(&self, path: &Path) {
        let now = self.clock.now();
        self.lock().insert(path.to_path_buf(), now);
        log::info!("[TEMP] Registered {}", path.display());
    }

    /// Deletes one file and forgets it. `false` if deletion failed; the
    /// entry is kept so a later cleanup can retry.
    pub fn remove(&self, path: &Path) -> bool {
        if path.exists() {
            if let Err(e) = std::fs::remove_file(path) {
                log::error!("[TEMP] Failed to delete {}: {}", path.display(), e);
                return false;
            }
            log::info!("[TEMP] Deleted {}", path.display());
        }
        self.lock().remove(path);
        true
    }

    pub fn count(&self) -> usize {
        self.lock().len()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.lock().contains_key(path)
    }

    /// Deletes registered files older than the age limit, plus any stray
    /// prefixed files in the directory whose mtime is past it.
    pub fn sweep_expired(&self) -> CleanupReport {
        let now = self.clock.now();
        let expired: Vec<PathBuf> = self
            .lock()
            .iter()
            .filter(|(_, registered)| self.is_expired(now, **registered))
            .map(|(p, _)| p.clone())
            .collect();

        let mut report = CleanupReport::default();
        for path in expired {
            if self.remove(&path) {
                report.removed += 1;
            } else {
                report.failed += 1;
            }
        }

        let stray = self.sweep_directory(now);
        report.removed += stray.removed;
        report.failed += stray.failed;

        if report.removed > 0 || report.failed > 0 {
            log::info!(
                "[TEMP] Sweep: removed {}, failed {}",
                report.removed,
                report.failed
            );
        }
        report
    }

    /// Deletes every registered file and any expired stray file, then
    /// forgets everything.
    pub fn cleanup_all(&self) -> CleanupReport {
        let paths: Vec<PathBuf> = self.lock().keys().cloned().collect();
        log::info!("[TEMP] Cleaning up {} temporary files", paths.len());

        let mut report = CleanupReport::default();
        for path in paths {
            if self.remove(&path) {
                report.removed += 1;
            } else {
                report.failed += 1;
            }
        }

        let stray = self.sweep_directory(self.clock.now());
        report.removed += stray.removed;
        report.failed += stray.failed;

        self.lock().clear();
        log::info!(
            "[TEMP] Cleanup complete: removed {}, failed {}",
            report.removed,
            report.failed
        );
        report
    }

    /// End of life: removes everything this registry still tracks.
    pub fn dispose(self) -> CleanupReport {
        self.cleanup_all()
    }

    /// Sweeps every `every` until the task is dropped.
    pub async fn run_sweeper(self: Arc<Self>, every: Duration) {
        let every = every.clamp(MIN_SWEEP_INTERVAL, MAX_SWEEP_INTERVAL);
        let mut ticker = tokio::time::interval(every);
        // The first tick completes immediately; startup already cleaned up.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            log::info!("[TEMP] Periodic sweep");
            self.sweep_expired();
        }
    }

    fn sweep_directory(&self, now: SystemTime) -> CleanupReport {
        let mut report = CleanupReport::default();
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                log::error!("[TEMP] Failed to scan {}: {}", self.dir.display(), e);
                return report;
            }
        };

        for entry in entries.flatten() {
            let name = entry.file_name();
            let path = entry.path();
            // Registered files expire by registration time, not mtime.
            if !name.to_string_lossy().starts_with(TEMP_FILE_PREFIX) || self.contains(&path) {
                continue;
            }
            let modified = match entry.metadata().and_then(|m| m.modified()) {
                Ok(t) => t,
                Err(_) => continue,
            };
            if !self.is_expired(now, modified) {
                continue;
            }
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    log::info!("[TEMP] Deleted expired file {}", path.display());
                    report.removed += 1;
                }
                Err(e) => {
                    log::error!("[TEMP] Failed to delete {}: {}", path.display(), e);
                    report.failed += 1;
                }
            }
        }
        report
    }

    fn is_expired(&self, now: SystemTime, then: SystemTime) -> bool {
        now.duration_since(then)
            .map(|age| age > self.max_age)
            .unwrap_or(false)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PathBuf, SystemTime>> {
        self.files.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
