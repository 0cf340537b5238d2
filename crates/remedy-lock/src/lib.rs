//! Per-ticket advisory file locks with crash recovery
//!
//! One lock artifact per ticket id under `<home>/locks/`, created with
//! O_EXCL semantics and held via an exclusive OS advisory lock for the
//! lifetime of the acquisition. The locking is advisory: it coordinates
//! remedy processes sharing a home directory, it is not a security
//! boundary. If the holding process dies, the OS releases the advisory
//! lock and the orphaned artifact becomes reclaimable by pid liveness
//! and age checks.

use camino::Utf8PathBuf;
use chrono::{DateTime, Utc};
use fd_lock::RwLock;
use remedy_utils::error::LockError;
use remedy_utils::paths;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::process;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Default age threshold for considering an orphaned lock stale
pub const DEFAULT_STALE_THRESHOLD_SECS: u64 = 3600;

/// Poll interval while waiting for a contended lock
const ACQUIRE_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Metadata stamped into each lock artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockStamp {
    /// Process that created the lock
    pub pid: u32,
    /// Ticket id being locked
    pub ticket_id: String,
    /// ISO-8601 creation timestamp
    pub created_at: DateTime<Utc>,
    /// remedy version that created the lock
    pub version: String,
}

impl LockStamp {
    fn new(ticket_id: &str) -> Self {
        Self {
            pid: process::id(),
            ticket_id: ticket_id.to_string(),
            created_at: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Age of the stamp, saturating at zero on clock skew
    #[must_use]
    pub fn age(&self) -> Duration {
        let secs = Utc::now()
            .signed_duration_since(self.created_at)
            .num_seconds()
            .max(0) as u64;
        Duration::from_secs(secs)
    }
}

/// Exclusive hold on one ticket, released on drop
///
/// The open file handle keeps the OS advisory lock alive; dropping the
/// guard removes the artifact and closes the handle.
pub struct TicketLock {
    path: Utf8PathBuf,
    fd: Option<Box<RwLock<fs::File>>>,
    stamp: LockStamp,
}

impl TicketLock {
    #[must_use]
    pub fn ticket_id(&self) -> &str {
        &self.stamp.ticket_id
    }

    #[must_use]
    pub const fn stamp(&self) -> &LockStamp {
        &self.stamp
    }

    /// Release explicitly; equivalent to dropping the guard
    pub fn release(mut self) -> Result<(), LockError> {
        self.fd.take();
        if self.path.exists() {
            fs::remove_file(&self.path).map_err(|e| LockError::Io {
                ticket_id: self.stamp.ticket_id.clone(),
                source: e,
            })?;
        }
        debug!(ticket_id = %self.stamp.ticket_id, "lock released");
        Ok(())
    }
}

impl Drop for TicketLock {
    fn drop(&mut self) {
        self.fd.take();
        if self.path.exists()
            && let Err(e) = fs::remove_file(&self.path)
        {
            warn!(
                ticket_id = %self.stamp.ticket_id,
                error = %e,
                "failed to remove lock artifact on drop"
            );
        }
    }
}

/// Manager for the per-ticket lock directory
#[derive(Debug, Clone)]
pub struct LockManager {
    stale_threshold: Duration,
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_STALE_THRESHOLD_SECS))
    }
}

impl LockManager {
    #[must_use]
    pub const fn new(stale_threshold: Duration) -> Self {
        Self { stale_threshold }
    }

    /// Attempt to acquire the lock for `ticket_id`
    ///
    /// Returns `Ok(None)` when the lock is held by a live process and
    /// the wait budget runs out. With a non-zero `wait`, contention is
    /// re-probed once per second. Orphaned artifacts (dead holder pid,
    /// or older than the stale threshold) are reclaimed in place.
    pub fn acquire(
        &self,
        ticket_id: &str,
        wait: Duration,
    ) -> Result<Option<TicketLock>, LockError> {
        let locks_dir = paths::locks_dir();
        fs::create_dir_all(&locks_dir).map_err(|e| LockError::Directory {
            path: locks_dir.to_string(),
            reason: e.to_string(),
        })?;

        let path = Self::lock_path(ticket_id);
        let deadline = Instant::now() + wait;

        loop {
            match fs::OpenOptions::new()
                .create_new(true)
                .read(true)
                .write(true)
                .open(&path)
            {
                Ok(file) => {
                    return Self::finalize(path, file, LockStamp::new(ticket_id)).map(Some);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    if self.try_reclaim(ticket_id, &path)? {
                        // Artifact removed; immediately retry creation.
                        continue;
                    }
                    if Instant::now() + ACQUIRE_POLL_INTERVAL > deadline {
                        debug!(ticket_id, "lock contended, giving up");
                        return Ok(None);
                    }
                    std::thread::sleep(ACQUIRE_POLL_INTERVAL);
                }
                Err(e) => {
                    return Err(LockError::Io {
                        ticket_id: ticket_id.to_string(),
                        source: e,
                    });
                }
            }
        }
    }

    /// Remove the lock artifact for `ticket_id` if it is not held by a
    /// live foreign process. Returns whether an artifact was removed.
    pub fn release(&self, ticket_id: &str) -> Result<bool, LockError> {
        let path = Self::lock_path(ticket_id);
        if !path.exists() {
            return Ok(false);
        }

        if let Some(stamp) = Self::read_stamp(&path)?
            && stamp.pid != process::id()
            && is_process_running(stamp.pid)
        {
            return Err(LockError::AlreadyHeld {
                ticket_id: ticket_id.to_string(),
                pid: stamp.pid,
                held_for: format_duration(stamp.age()),
            });
        }

        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(LockError::Io {
                ticket_id: ticket_id.to_string(),
                source: e,
            }),
        }
    }

    /// Delete every reclaimable lock older than `max_age`, returning
    /// the number removed
    ///
    /// Each artifact is probed with a non-blocking exclusive lock; an
    /// artifact whose advisory lock is still held by a live process is
    /// never touched.
    pub fn cleanup_stale(&self, max_age: Duration) -> usize {
        let locks_dir = paths::locks_dir();
        let Ok(entries) = fs::read_dir(&locks_dir) else {
            return 0;
        };

        let mut removed = 0;
        for entry in entries.flatten() {
            let std_path = entry.path();
            if std_path.extension().and_then(|e| e.to_str()) != Some("lock") {
                continue;
            }
            let Ok(path) = Utf8PathBuf::from_path_buf(std_path) else {
                continue;
            };

            let Ok(file) = fs::OpenOptions::new().read(true).write(true).open(&path) else {
                continue;
            };
            let mut probe = RwLock::new(file);
            let Ok(_guard) = probe.try_write() else {
                // Advisory lock still held, holder is alive.
                continue;
            };

            let reclaimable = match Self::read_stamp(&path) {
                Ok(Some(stamp)) => !is_process_running(stamp.pid) || stamp.age() > max_age,
                // Unreadable stamps with a winnable flock are orphans.
                Ok(None) | Err(_) => true,
            };
            if !reclaimable {
                continue;
            }

            drop(_guard);
            drop(probe);
            if fs::remove_file(&path).is_ok() {
                debug!(path = %path, "removed stale lock");
                removed += 1;
            }
        }
        removed
    }

    /// Stamps for every readable lock artifact, keyed by ticket id
    #[must_use]
    pub fn list_active(&self) -> BTreeMap<String, LockStamp> {
        let locks_dir = paths::locks_dir();
        let mut active = BTreeMap::new();
        let Ok(entries) = fs::read_dir(&locks_dir) else {
            return active;
        };
        for entry in entries.flatten() {
            let Ok(path) = Utf8PathBuf::from_path_buf(entry.path()) else {
                continue;
            };
            if path.extension() != Some("lock") {
                continue;
            }
            if let Ok(Some(stamp)) = Self::read_stamp(&path) {
                active.insert(stamp.ticket_id.clone(), stamp);
            }
        }
        active
    }

    /// Whether a lock artifact exists for `ticket_id`
    #[must_use]
    pub fn exists(ticket_id: &str) -> bool {
        Self::lock_path(ticket_id).exists()
    }

    fn lock_path(ticket_id: &str) -> Utf8PathBuf {
        paths::locks_dir().join(format!("{ticket_id}.lock"))
    }

    /// Reclaim an orphaned artifact. Returns whether it was removed.
    fn try_reclaim(&self, ticket_id: &str, path: &Utf8PathBuf) -> Result<bool, LockError> {
        let stamp = match Self::read_stamp(path) {
            Ok(Some(stamp)) => stamp,
            // Missing or mid-write; treat as contended and let the
            // caller poll.
            Ok(None) | Err(_) => return Ok(false),
        };

        if is_process_running(stamp.pid) && stamp.age() <= self.stale_threshold {
            return Ok(false);
        }

        // Rename first so two reclaimers cannot both delete a fresh
        // replacement created in between.
        let stale_path = path.with_extension(format!("stale.{}", process::id()));
        match fs::rename(path, &stale_path) {
            Ok(()) => {
                let _ = fs::remove_file(&stale_path);
                warn!(
                    ticket_id,
                    pid = stamp.pid,
                    age_secs = stamp.age().as_secs(),
                    "reclaimed stale lock"
                );
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(true),
            Err(e) => Err(LockError::Io {
                ticket_id: ticket_id.to_string(),
                source: e,
            }),
        }
    }

    fn read_stamp(path: &Utf8PathBuf) -> Result<Option<LockStamp>, LockError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(LockError::CorruptStamp {
                    path: path.to_string(),
                    reason: e.to_string(),
                });
            }
        };
        if content.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| LockError::CorruptStamp {
                path: path.to_string(),
                reason: e.to_string(),
            })
    }

    fn finalize(
        path: Utf8PathBuf,
        file: fs::File,
        stamp: LockStamp,
    ) -> Result<TicketLock, LockError> {
        let json =
            serde_json::to_string_pretty(&stamp).map_err(|e| LockError::CorruptStamp {
                path: path.to_string(),
                reason: e.to_string(),
            })?;

        let mut fd = Box::new(RwLock::new(file));
        {
            let guard = fd.try_write().map_err(|e| LockError::Io {
                ticket_id: stamp.ticket_id.clone(),
                source: e,
            })?;

            use std::io::Write;
            let mut file_ref = &*guard;
            file_ref
                .write_all(json.as_bytes())
                .and_then(|()| file_ref.sync_all())
                .map_err(|e| LockError::Io {
                    ticket_id: stamp.ticket_id.clone(),
                    source: e,
                })?;

            // Keep the advisory lock held for the guard's lifetime: the
            // unlock only happens when the File closes on release.
            std::mem::forget(guard);
        }

        debug!(ticket_id = %stamp.ticket_id, pid = stamp.pid, "lock acquired");
        Ok(TicketLock {
            path,
            fd: Some(fd),
            stamp,
        })
    }
}

/// Check whether a process with the given pid is alive
fn is_process_running(pid: u32) -> bool {
    #[cfg(unix)]
    {
        // kill(pid, 0) probes existence; EPERM means alive but not ours.
        let rc = unsafe { libc::kill(pid as i32, 0) };
        if rc == 0 {
            true
        } else {
            matches!(
                io::Error::last_os_error().raw_os_error(),
                Some(code) if code == libc::EPERM
            )
        }
    }

    #[cfg(not(unix))]
    {
        let _ = pid;
        true
    }
}

/// Human-readable duration for lock diagnostics
#[must_use]
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs >= 3600 {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    } else if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{secs}s")
    }
}
