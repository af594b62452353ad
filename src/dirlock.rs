//! Advisory lock implemented as a directory entry
//!
//! Creating a directory is atomic on every platform we care about, so the
//! lock is held by whoever managed to create `<base>/<name>.lock`.

use crate::error::{EqualizerError, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const LOCK_SUFFIX: &str = ".lock";

/// First sleep between attempts in [`DirLock::wait_lock`]; doubles after each try
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct DirLock {
    base_path: PathBuf,
    lock_name: String,
    initial_backoff: Duration,
}

impl DirLock {
    pub fn new(base_path: &Path, lock_name: &str) -> Result<Self> {
        if lock_name.is_empty() {
            return Err(EqualizerError::invalid_input("lock name cannot be empty"));
        }
        if !base_path.exists() {
            return Err(EqualizerError::lock(base_path, "base path does not exist"));
        }

        // trailing separators would otherwise end up inside the lock path
        let trimmed = base_path
            .to_string_lossy()
            .trim_end_matches(|c: char| c == '/' || c == '\\')
            .to_string();
        let base_path = if trimmed.is_empty() {
            base_path.to_path_buf()
        } else {
            PathBuf::from(trimmed)
        };

        Ok(Self {
            base_path,
            lock_name: lock_name.to_string(),
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
        })
    }

    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    pub fn lock_path(&self) -> PathBuf {
        self.base_path
            .join(format!("{}{}", self.lock_name, LOCK_SUFFIX))
    }

    /// Acquire the lock if it is free. Returns false when someone else holds it.
    pub fn try_lock(&self) -> Result<bool> {
        let path = self.lock_path();
        match fs::create_dir(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(EqualizerError::lock(
                path,
                format!("could not create lock entry: {}", e),
            )),
        }
    }

    pub fn is_locked(&self) -> Result<bool> {
        let path = self.lock_path();
        match fs::metadata(&path) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(EqualizerError::lock(
                path,
                format!("could not stat lock entry: {}", e),
            )),
        }
    }

    /// Retry [`try_lock`](Self::try_lock) with exponential backoff until `timeout` has elapsed.
    pub fn wait_lock(&self, timeout: Duration) -> Result<()> {
        if timeout.is_zero() {
            return Err(EqualizerError::invalid_input(
                "max wait time must be greater than 0",
            ));
        }

        let start = Instant::now();
        let mut sleep = self.initial_backoff;
        loop {
            if self.try_lock()? {
                return Ok(());
            }
            if start.elapsed() > timeout {
                return Err(EqualizerError::lock(
                    self.lock_path(),
                    format!("waited too long for lock ({:?})", timeout),
                ));
            }
            log::debug!("lock {} is held, retrying in {:?}", self.lock_path().display(), sleep);
            std::thread::sleep(sleep);
            sleep *= 2;
        }
    }

    /// Release the lock. Returns false when there was no lock to release.
    pub fn unlock(&self) -> Result<bool> {
        let path = self.lock_path();
        match fs::remove_dir(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(EqualizerError::lock(
                path,
                format!("could not remove lock entry: {}", e),
            )),
        }
    }
}
