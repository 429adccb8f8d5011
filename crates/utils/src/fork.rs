//! Fork detection for objects that own OS-level handles
//!
//! File descriptors, advisory locks and HTTP connection pools are inherited by
//! a `fork()`ed child. Sharing them silently corrupts state (an inherited
//! `flock` is shared with the parent, an inherited TLS session is not), so
//! owners record the pid that created their handles and check it on use.

use blobio_core::{Error, Result};
use std::sync::atomic::{AtomicU32, Ordering};

/// What to do when a handle owner is used from a different process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ForkPolicy {
    /// Drop the inherited handles and build fresh ones
    #[default]
    Reset,
    /// Refuse with [`Error::ForkedWithoutReset`]
    Error,
}

/// Tracks the process that owns a set of OS handles
#[derive(Debug)]
pub struct ForkGuard {
    resource: &'static str,
    pid: AtomicU32,
    policy: ForkPolicy,
}

impl ForkGuard {
    /// Create a guard owned by the current process
    pub fn new(resource: &'static str, policy: ForkPolicy) -> Self {
        Self {
            resource,
            pid: AtomicU32::new(std::process::id()),
            policy,
        }
    }

    /// The pid whose handles are currently considered valid
    pub fn owner_pid(&self) -> u32 {
        self.pid.load(Ordering::Acquire)
    }

    pub fn policy(&self) -> ForkPolicy {
        self.policy
    }

    /// Whether the calling process differs from the owning one
    pub fn is_forked(&self) -> bool {
        self.owner_pid() != std::process::id()
    }

    /// Check the calling process against the owner.
    ///
    /// Returns `Ok(true)` when the caller must rebuild its handles. Under
    /// [`ForkPolicy::Reset`] the guard adopts the calling process as the new
    /// owner before returning.
    pub fn check(&self) -> Result<bool> {
        let current = std::process::id();
        let owner = self.owner_pid();
        if owner == current {
            return Ok(false);
        }

        match self.policy {
            ForkPolicy::Reset => {
                tracing::debug!(
                    resource = self.resource,
                    owner,
                    current,
                    "fork detected, resetting handles"
                );
                self.pid.store(current, Ordering::Release);
                Ok(true)
            }
            ForkPolicy::Error => Err(Error::forked_without_reset(self.resource, owner)),
        }
    }
}
