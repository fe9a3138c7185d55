use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{Result, StoreError};
use crate::traits::{check_bounds, BackingStore};

/// An in-memory store whose clones share the same bytes.
///
/// Two clones handed to a host-side and a guest-side channel behave like two
/// processes that opened the same image file. The fault latch is per handle.
#[derive(Clone)]
pub struct MemoryStore {
    bytes: Arc<Mutex<Vec<u8>>>,
    capacity: usize,
    faulted: bool,
}

impl MemoryStore {
    /// Create a zero-filled store of `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            bytes: Arc::new(Mutex::new(vec![0u8; capacity])),
            capacity,
            faulted: false,
        }
    }

    /// Copy of the current contents.
    pub fn snapshot(&self) -> Vec<u8> {
        self.lock().clone()
    }

    /// Mark this handle as failed, as if the medium had reported an error.
    pub fn inject_fault(&mut self) {
        self.faulted = true;
    }

    fn lock(&self) -> MutexGuard<'_, Vec<u8>> {
        // A panicking peer thread must not wedge the other end of a loopback pair.
        self.bytes.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn guard(&mut self, offset: u64, len: usize) -> Result<usize> {
        if self.faulted {
            return Err(StoreError::Faulted);
        }
        if let Err(err) = check_bounds(offset, len, self.capacity) {
            self.faulted = true;
            return Err(err);
        }
        Ok(offset as usize)
    }
}

impl BackingStore for MemoryStore {
    fn capacity(&self) -> usize {
        self.capacity
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let start = self.guard(offset, buf.len())?;
        let bytes = self.lock();
        buf.copy_from_slice(&bytes[start..start + buf.len()]);
        Ok(())
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        let start = self.guard(offset, data.len())?;
        let mut bytes = self.lock();
        bytes[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if self.faulted {
            return Err(StoreError::Faulted);
        }
        Ok(())
    }

    fn is_healthy(&self) -> bool {
        !self.faulted
    }

    fn clear_fault(&mut self) {
        self.faulted = false;
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("capacity", &self.capacity)
            .field("faulted", &self.faulted)
            .finish()
    }
}
