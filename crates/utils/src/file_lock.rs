//! Scoped advisory locks on open files
//!
//! `flock` locks belong to the open file description, so two threads using
//! the same descriptor do not exclude each other, and a `fork()`ed child
//! shares its parent's lock until it reopens the file. Callers pair these
//! guards with an in-process lock and reopen descriptors after a fork.

use fs2::FileExt;
use std::fs::File;
use std::io;

/// Held advisory lock, released on drop
#[derive(Debug)]
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct FileLockGuard<'a> {
    file: &'a File,
    exclusive: bool,
}

impl<'a> FileLockGuard<'a> {
    /// Block until a shared lock is held
    pub fn shared(file: &'a File) -> io::Result<Self> {
        FileExt::lock_shared(file)?;
        Ok(Self {
            file,
            exclusive: false,
        })
    }

    /// Block until an exclusive lock is held
    pub fn exclusive(file: &'a File) -> io::Result<Self> {
        FileExt::lock_exclusive(file)?;
        Ok(Self {
            file,
            exclusive: true,
        })
    }

    /// Take an exclusive lock without blocking; `None` if someone else holds it
    pub fn try_exclusive(file: &'a File) -> io::Result<Option<Self>> {
        match FileExt::try_lock_exclusive(file) {
            Ok(()) => Ok(Some(Self {
                file,
                exclusive: true,
            })),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn is_exclusive(&self) -> bool {
        self.exclusive
    }
}

impl Drop for FileLockGuard<'_> {
    fn drop(&mut self) {
        let _ = FileExt::unlock(self.file);
    }
}
