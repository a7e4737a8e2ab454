//! Store Lease - Exclusive lock held across a merge's read-modify-write
//!
//! The lock is an OS advisory lock on a sibling file. The file itself stays
//! on disk; the lock goes away when the holding handle closes, including
//! when the holding process dies.

use crate::error::{LedgerError, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// Held while a merge runs; the lock is released on drop.
#[derive(Debug)]
pub struct StoreLease {
    path: PathBuf,
    file: File,
}

impl StoreLease {
    /// Lock `lock_path` exclusively, retrying until `timeout` elapses.
    pub fn acquire(lock_path: &Path, timeout: Duration) -> Result<Self> {
        let started = Instant::now();
        if let Some(parent) = lock_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| LedgerError::store(lock_path, e))?;
            }
        }
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(lock_path)
            .map_err(|e| LedgerError::store(lock_path, e))?;

        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    if let Err(e) = record_holder(&mut file) {
                        debug!("Could not record lease holder in {}: {}", lock_path.display(), e);
                    }
                    debug!("Acquired store lease {}", lock_path.display());
                    return Ok(Self {
                        path: lock_path.to_path_buf(),
                        file,
                    });
                }
                Err(e) if is_contended(&e) => {
                    if started.elapsed() >= timeout {
                        let holder = fs::read_to_string(lock_path)
                            .ok()
                            .map(|pid| format!(" (held by pid {})", pid.trim()))
                            .unwrap_or_default();
                        return Err(LedgerError::store(
                            lock_path,
                            format!(
                                "timed out after {:?} waiting for store lease{}",
                                timeout, holder
                            ),
                        ));
                    }
                    std::thread::sleep(RETRY_INTERVAL);
                }
                Err(e) => return Err(LedgerError::store(lock_path, e)),
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StoreLease {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!("Failed to release store lease {}: {}", self.path.display(), e);
        }
    }
}

/// Overwrite the lock file with our pid, for operators inspecting a stuck merge.
fn record_holder(file: &mut File) -> io::Result<()> {
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    writeln!(file, "{}", std::process::id())?;
    file.flush()
}

fn is_contended(e: &io::Error) -> bool {
    e.kind() == ErrorKind::WouldBlock
        || e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lease_is_exclusive_until_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let lock = dir.path().join("history.csv.lock");

        let lease = StoreLease::acquire(&lock, Duration::from_millis(10)).unwrap();
        assert_eq!(lease.path(), lock.as_path());

        let err = StoreLease::acquire(&lock, Duration::from_millis(60)).unwrap_err();
        assert!(matches!(err, LedgerError::StoreUnavailable { .. }));
        assert!(err.to_string().contains(&format!("held by pid {}", std::process::id())));

        drop(lease);
        assert!(StoreLease::acquire(&lock, Duration::from_millis(10)).is_ok());
    }

    #[test]
    fn test_leftover_lock_file_is_reclaimed() {
        let dir = tempfile::tempdir().unwrap();
        let lock = dir.path().join("history.csv.lock");
        // Left behind by a merge that was killed mid-way
        fs::write(&lock, "4194303\n").unwrap();

        let lease = StoreLease::acquire(&lock, Duration::from_millis(10)).unwrap();
        assert_eq!(
            fs::read_to_string(&lock).unwrap().trim(),
            std::process::id().to_string()
        );
        drop(lease);
    }
}
