//! Advisory per-target locking for the read-transform-write window.
//!
//! A sentinel file next to the target (`<name>.pweave.lock`) is created
//! with `create_new`, which is atomic on every platform we care about;
//! a second process attempting the same rewrite fails fast instead of
//! racing the rename. The sentinel is removed on drop. Single-process
//! callers applying rewrites sequentially do not need this; the plan
//! runner takes it once per target file.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LockError {
    #[error("{target} is locked by another process (lock file {lock} exists)")]
    Held { target: PathBuf, lock: PathBuf },

    #[error("failed to create lock file {lock}: {source}")]
    Io {
        lock: PathBuf,
        source: std::io::Error,
    },
}

/// Exclusive advisory lock on a target file, released on drop.
#[derive(Debug)]
#[must_use = "the lock is released when the guard is dropped"]
pub struct LockFile {
    lock_path: PathBuf,
}

impl LockFile {
    pub fn acquire(target: &Path) -> Result<Self, LockError> {
        let lock_path = lock_path_for(target);
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
        {
            Ok(_) => Ok(Self { lock_path }),
            Err(source) if source.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(LockError::Held {
                    target: target.to_path_buf(),
                    lock: lock_path,
                })
            }
            Err(source) => Err(LockError::Io {
                lock: lock_path,
                source,
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        // Nothing useful to do if removal fails; the stale sentinel is
        // visible and the error message names it
        let _ = std::fs::remove_file(&self.lock_path);
    }
}

fn lock_path_for(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "target".into());
    name.push(".pweave.lock");
    target.with_file_name(name)
}
