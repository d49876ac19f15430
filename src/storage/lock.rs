//! Advisory lock serializing mutations of one source directory.
//!
//! The lock file lives under `<root>/locks/` and is keyed by a hash of the
//! source path, so two data roots pointing at the same source still contend.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, trace};

use crate::error::{Result, SkillshareError};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Exclusive lock on a source directory, released on drop.
#[derive(Debug)]
pub struct SourceLock {
    file: File,
    lock_path: PathBuf,
}

impl SourceLock {
    /// Path of the lock file guarding `source`.
    #[must_use]
    pub fn lock_path(root: &Path, source: &Path) -> PathBuf {
        let digest = Sha256::digest(source.to_string_lossy().as_bytes());
        let key = hex::encode(digest);
        root.join("locks").join(format!("{}.lock", &key[..16]))
    }

    fn open(lock_path: &Path) -> io::Result<File> {
        if let Some(parent) = lock_path.parent() {
            fs::create_dir_all(parent)?;
        }
        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(lock_path)
    }

    /// Try once without blocking. `Ok(None)` when another holder has it.
    pub fn try_acquire(root: &Path, source: &Path) -> Result<Option<Self>> {
        let lock_path = Self::lock_path(root, source);
        let file = Self::open(&lock_path)?;
        match file.try_lock_exclusive() {
            Ok(()) => {}
            Err(err) if is_contended(&err) => return Ok(None),
            Err(err) => return Err(err.into()),
        }
        write_lock_info(&file)?;
        trace!(path = %lock_path.display(), "source lock acquired");
        Ok(Some(Self { file, lock_path }))
    }

    /// Poll until the lock is free or `timeout` elapses.
    pub fn acquire_timeout(root: &Path, source: &Path, timeout: Duration) -> Result<Self> {
        let start = Instant::now();
        loop {
            if let Some(lock) = Self::try_acquire(root, source)? {
                return Ok(lock);
            }
            if start.elapsed() >= timeout {
                let holder = Self::read_lock_info(root, source)
                    .ok()
                    .flatten()
                    .map(|info| format!(" (held by pid {} on {})", info.pid, info.hostname))
                    .unwrap_or_default();
                return Err(SkillshareError::LockTimeout(format!(
                    "{}{holder}",
                    source.display()
                )));
            }
            debug!(source = %source.display(), "waiting for source lock");
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    /// Holder info written by the current or last holder.
    pub fn read_lock_info(root: &Path, source: &Path) -> Result<Option<LockInfo>> {
        let lock_path = Self::lock_path(root, source);
        if !lock_path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&lock_path)?;
        Ok(serde_json::from_str(&content).ok())
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for SourceLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
        trace!(path = %self.lock_path.display(), "source lock released");
    }
}

/// Information about the lock holder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    pub pid: u32,
    pub acquired_at: DateTime<Utc>,
    pub hostname: String,
}

fn is_contended(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

fn write_lock_info(file: &File) -> io::Result<()> {
    let info = LockInfo {
        pid: std::process::id(),
        acquired_at: Utc::now(),
        hostname: hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "unknown".to_string()),
    };
    let json = serde_json::to_string_pretty(&info).map_err(io::Error::other)?;
    let mut file = file;
    file.set_len(0)?;
    file.write_all(json.as_bytes())?;
    file.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn lock_path_is_stable_per_source() {
        let root = Path::new("/data");
        let a = SourceLock::lock_path(root, Path::new("/skills"));
        let b = SourceLock::lock_path(root, Path::new("/skills"));
        let c = SourceLock::lock_path(root, Path::new("/other"));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("/data/locks"));
    }

    #[test]
    fn second_acquire_is_refused_until_release() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("skills");

        let lock = SourceLock::try_acquire(tmp.path(), &source).unwrap().unwrap();
        assert!(SourceLock::try_acquire(tmp.path(), &source).unwrap().is_none());

        let info = SourceLock::read_lock_info(tmp.path(), &source).unwrap().unwrap();
        assert_eq!(info.pid, std::process::id());

        drop(lock);
        assert!(SourceLock::try_acquire(tmp.path(), &source).unwrap().is_some());
    }

    #[test]
    fn acquire_timeout_reports_lock_timeout() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("skills");
        let _held = SourceLock::try_acquire(tmp.path(), &source).unwrap().unwrap();

        let err = SourceLock::acquire_timeout(tmp.path(), &source, Duration::from_millis(120))
            .unwrap_err();
        assert!(matches!(err, SkillshareError::LockTimeout(_)));
    }
}
