//! Open file handle table
//!
//! FUSE identifies open files by an opaque 64-bit handle. The table maps
//! each handle to the `File` opened on the working tree.

use std::collections::HashMap;
use std::fs::File;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug)]
pub struct HandleTable {
    files: Mutex<HashMap<u64, Arc<File>>>,
    /// Next handle number (0 is never handed out)
    next_handle: AtomicU64,
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::new()
    }
}

impl HandleTable {
    pub fn new() -> Self {
        Self {
            files: Mutex::new(HashMap::new()),
            next_handle: AtomicU64::new(1),
        }
    }

    /// Register an open file and return its handle.
    pub fn insert(&self, file: File) -> u64 {
        let fh = self.next_handle.fetch_add(1, Ordering::SeqCst);
        self.lock().insert(fh, Arc::new(file));
        fh
    }

    /// Look up the file behind a handle.
    pub fn get(&self, fh: u64) -> Option<Arc<File>> {
        self.lock().get(&fh).cloned()
    }

    /// Forget a handle. The file is closed once the last in-flight user of
    /// it finishes.
    pub fn remove(&self, fh: u64) -> Option<Arc<File>> {
        self.lock().remove(&fh)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<u64, Arc<File>>> {
        self.files.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
