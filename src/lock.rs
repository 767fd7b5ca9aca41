//! Interprocess locks backed by lock files in the index directory.
//!
//! A lock file is created atomically (`create_new`) and holds the pid of the
//! owning process as plain text. The only blocking primitive is
//! `Lock::obtain_within`, which polls `obtain` until a timeout.

use std::fmt::Debug;
use std::fs;
use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use log::{debug, warn};
use thiserror::Error;

use crate::error::{Error, IoContext, Result};

pub const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(1000);
pub const WRITE_LOCK_NAME: &str = "write.lock";
pub const COMMIT_LOCK_NAME: &str = "commit.lock";

#[derive(Debug, Error)]
#[error(
    "timed out obtaining lock {path:?} after {attempts} attempts (held by {})",
    describe_holder(.holder, .holder_alive)
)]
pub struct LockTimeout {
    pub path: PathBuf,
    pub attempts: u32,
    pub holder: Option<u32>,
    pub holder_alive: Option<bool>,
}

fn describe_holder(holder: &Option<u32>, alive: &Option<bool>) -> String {
    match (*holder, *alive) {
        (Some(pid), Some(true)) => format!("pid {}, running", pid),
        (Some(pid), Some(false)) => format!("pid {}, not running; stale lock", pid),
        (Some(pid), None) => format!("pid {}", pid),
        (None, _) => "unknown process".to_string(),
    }
}

pub trait Lock: Send + Sync + Debug {
    /// One non-blocking attempt. `Ok(false)` means someone else holds it.
    fn obtain(&self) -> Result<bool>;

    fn release(&self) -> Result<()>;

    fn is_locked(&self) -> bool;

    fn path(&self) -> &Path;

    fn poll_interval(&self) -> Duration {
        LOCK_POLL_INTERVAL
    }

    /// Pid recorded by the current holder, if any.
    fn holder(&self) -> Option<u32> {
        None
    }

    fn obtain_within(&self, timeout: Duration) -> Result<()> {
        let interval = self.poll_interval().max(Duration::from_millis(1));
        let max_sleeps = (timeout.as_millis() / interval.as_millis()).max(1);
        let mut attempts = 1u32;
        if self.obtain()? {
            return Ok(());
        }
        for _ in 0..max_sleeps {
            thread::sleep(interval);
            attempts += 1;
            if self.obtain()? {
                return Ok(());
            }
        }
        let holder = self.holder();
        let timeout = LockTimeout {
            path: self.path().to_path_buf(),
            attempts,
            holder,
            holder_alive: holder.and_then(pid_alive),
        };
        debug!("{}", timeout);
        Err(timeout.into())
    }
}

#[derive(Debug)]
pub struct FsLock {
    path: PathBuf,
    held: AtomicBool,
    poll_interval: Duration,
}

impl FsLock {
    pub fn new<P: Into<PathBuf>>(path: P) -> FsLock {
        FsLock {
            path: path.into(),
            held: AtomicBool::new(false),
            poll_interval: LOCK_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> FsLock {
        self.poll_interval = poll_interval;
        self
    }

    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::SeqCst)
    }
}

impl Lock for FsLock {
    fn obtain(&self) -> Result<bool> {
        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(file) => file,
            Err(ref e) if e.kind() == io::ErrorKind::AlreadyExists => {
                debug!("lock {:?} busy", self.path);
                return Ok(false);
            }
            Err(e) => return Err(e).at("create lock", &self.path),
        };
        let written = write!(file, "{}", std::process::id()).and_then(|_| file.sync_all());
        if let Err(e) = written {
            let _ = fs::remove_file(&self.path);
            return Err(e).at("write lock", &self.path);
        }
        self.held.store(true, Ordering::SeqCst);
        debug!("obtained lock {:?}", self.path);
        Ok(true)
    }

    fn release(&self) -> Result<()> {
        if !self.held.swap(false, Ordering::SeqCst) {
            if cfg!(debug_assertions) {
                return Err(Error::LockNotHeld {
                    path: self.path.clone(),
                });
            }
            warn!("release of lock {:?} that is not held", self.path);
            return Ok(());
        }
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!("released lock {:?}", self.path);
                Ok(())
            }
            Err(ref e) if e.kind() == io::ErrorKind::NotFound => {
                warn!("lock file {:?} vanished while held", self.path);
                Ok(())
            }
            Err(e) => Err(e).at("release lock", &self.path),
        }
    }

    fn is_locked(&self) -> bool {
        self.path.exists()
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    fn holder(&self) -> Option<u32> {
        fs::read_to_string(&self.path)
            .ok()
            .and_then(|s| s.trim().parse().ok())
    }
}

impl Drop for FsLock {
    fn drop(&mut self) {
        if self.is_held() {
            if let Err(e) = self.release() {
                warn!("could not release lock on drop: {}", e);
            }
        }
    }
}

/// Lock that always succeeds, for indexes on read-only media.
#[derive(Debug)]
pub struct NoLock {
    path: PathBuf,
}

impl NoLock {
    pub fn new<P: Into<PathBuf>>(path: P) -> NoLock {
        NoLock { path: path.into() }
    }
}

impl Lock for NoLock {
    fn obtain(&self) -> Result<bool> {
        Ok(true)
    }

    fn release(&self) -> Result<()> {
        Ok(())
    }

    fn is_locked(&self) -> bool {
        false
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

/// Builds the lock for `name` inside an index directory.
pub fn index_lock(dir: &Path, name: &str, disabled: bool, poll_interval: Duration) -> Box<dyn Lock> {
    let path = dir.join(name);
    if disabled {
        Box::new(NoLock::new(path))
    } else {
        Box::new(FsLock::new(path).with_poll_interval(poll_interval))
    }
}

/// Releases the lock when dropped unless released explicitly.
pub struct LockGuard<'a> {
    lock: &'a dyn Lock,
    released: bool,
}

impl<'a> LockGuard<'a> {
    pub fn acquire(lock: &'a dyn Lock, timeout: Duration) -> Result<LockGuard<'a>> {
        lock.obtain_within(timeout)?;
        Ok(LockGuard {
            lock,
            released: false,
        })
    }

    pub fn release(mut self) -> Result<()> {
        self.released = true;
        self.lock.release()
    }
}

impl<'a> Drop for LockGuard<'a> {
    fn drop(&mut self) {
        if !self.released {
            if let Err(e) = self.lock.release() {
                warn!("failed to release {:?}: {}", self.lock.path(), e);
            }
        }
    }
}

/// Runs `f` while holding `lock`. The lock is released on every exit path;
/// an error from `f` takes precedence over an error from releasing.
pub fn with_lock<T, F>(lock: &dyn Lock, timeout: Duration, f: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    let guard = LockGuard::acquire(lock, timeout)?;
    let result = f();
    let released = guard.release();
    match (result, released) {
        (Err(e), _) => Err(e),
        (Ok(_), Err(e)) => Err(e),
        (Ok(value), Ok(())) => Ok(value),
    }
}

/// Whether process `pid` is running, `None` when that cannot be told.
#[cfg(unix)]
pub fn pid_alive(pid: u32) -> Option<bool> {
    if pid == 0 || pid > i32::MAX as u32 {
        return Some(false);
    }
    let res = unsafe { libc::kill(pid as libc::pid_t, 0) };
    if res == 0 {
        return Some(true);
    }
    match io::Error::last_os_error().raw_os_error() {
        Some(libc::EPERM) => Some(true),
        Some(libc::ESRCH) => Some(false),
        _ => None,
    }
}

#[cfg(not(unix))]
pub fn pid_alive(_pid: u32) -> Option<bool> {
    None
}
