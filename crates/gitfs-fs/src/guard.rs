//! Working-tree lock shared by handle I/O and the sync engine
//!
//! Every byte-range read or write on an open handle runs while holding this
//! lock, so the seek and the transfer are observed as one step by any other
//! reader or writer. The sync engine takes the same lock while it inspects,
//! stages and commits the tree, which keeps a commit from capturing a write
//! that is only half applied.
//!
//! Metadata operations (create, unlink, rename, chmod, mkdir) do not take the
//! lock and may interleave freely with both.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Cloneable handle to the single working-tree mutex.
#[derive(Debug, Clone, Default)]
pub struct WorktreeLock {
    inner: Arc<Mutex<()>>,
}

/// RAII guard; the lock is released when this is dropped, including on
/// early returns and unwinding.
#[must_use = "the working tree is unlocked as soon as the guard is dropped"]
pub struct WorktreeGuard<'a> {
    _guard: MutexGuard<'a, ()>,
}

impl WorktreeLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until the lock is held.
    ///
    /// A panic in another holder poisons a std mutex; the protected data is
    /// `()`, so poisoning carries no broken invariant and is ignored.
    pub fn acquire(&self) -> WorktreeGuard<'_> {
        let guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        WorktreeGuard { _guard: guard }
    }

    /// Acquire the lock only if nobody holds it right now.
    pub fn try_acquire(&self) -> Option<WorktreeGuard<'_>> {
        match self.inner.try_lock() {
            Ok(guard) => Some(WorktreeGuard { _guard: guard }),
            Err(std::sync::TryLockError::Poisoned(poisoned)) => Some(WorktreeGuard {
                _guard: poisoned.into_inner(),
            }),
            Err(std::sync::TryLockError::WouldBlock) => None,
        }
    }
}
