use std::io::{Read, Seek, SeekFrom, Write};

use crate::error::{Result, StoreError};

const ZERO_CHUNK: [u8; 4096] = [0u8; 4096];

/// A fixed-capacity, seekable byte store shared with a remote endpoint.
///
/// Offsets are absolute from the beginning of the store. Implementations must
/// reject accesses outside `[0, capacity)` and latch any failure so that
/// [`is_healthy`](BackingStore::is_healthy) keeps reporting it until
/// [`clear_fault`](BackingStore::clear_fault) is called.
pub trait BackingStore: Send {
    /// Total size of the store in bytes.
    fn capacity(&self) -> usize;

    /// Fill `buf` with the bytes starting at `offset`.
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()>;

    /// Write all of `data` starting at `offset`.
    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()>;

    /// Push buffered writes to the underlying medium.
    fn flush(&mut self) -> Result<()>;

    /// `false` once an operation has failed and the fault was not cleared.
    fn is_healthy(&self) -> bool;

    /// Reset the fault latch.
    fn clear_fault(&mut self);

    /// Overwrite the whole store with zero bytes.
    fn zero_fill(&mut self) -> Result<()> {
        let capacity = self.capacity();
        let mut offset = 0usize;
        while offset < capacity {
            let n = (capacity - offset).min(ZERO_CHUNK.len());
            self.write_at(offset as u64, &ZERO_CHUNK[..n])?;
            offset += n;
        }
        self.flush()
    }
}

impl<S: BackingStore + ?Sized> BackingStore for Box<S> {
    fn capacity(&self) -> usize {
        (**self).capacity()
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        (**self).read_at(offset, buf)
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        (**self).write_at(offset, data)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }

    fn is_healthy(&self) -> bool {
        (**self).is_healthy()
    }

    fn clear_fault(&mut self) {
        (**self).clear_fault()
    }

    fn zero_fill(&mut self) -> Result<()> {
        (**self).zero_fill()
    }
}

pub(crate) fn check_bounds(offset: u64, len: usize, capacity: usize) -> Result<()> {
    let end = offset.checked_add(len as u64);
    match end {
        Some(end) if end <= capacity as u64 => Ok(()),
        _ => Err(StoreError::OutOfBounds {
            offset,
            len,
            capacity,
        }),
    }
}

/// A [`BackingStore`] over any `Read + Write + Seek` stream.
pub struct IoStore<T> {
    inner: T,
    capacity: usize,
    faulted: bool,
}

impl<T: Read + Write + Seek> IoStore<T> {
    /// Wrap a stream whose usable size is `capacity` bytes.
    pub fn new(inner: T, capacity: usize) -> Self {
        Self {
            inner,
            capacity,
            faulted: false,
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the store and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    pub(crate) fn guarded<R>(
        &mut self,
        offset: u64,
        len: usize,
        op: impl FnOnce(&mut T) -> std::io::Result<R>,
    ) -> Result<R> {
        if self.faulted {
            return Err(StoreError::Faulted);
        }
        if let Err(err) = check_bounds(offset, len, self.capacity) {
            self.faulted = true;
            return Err(err);
        }
        op(&mut self.inner).map_err(|err| {
            self.faulted = true;
            StoreError::Io(err)
        })
    }
}

impl<T: Read + Write + Seek + Send> BackingStore for IoStore<T> {
    fn capacity(&self) -> usize {
        self.capacity
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.guarded(offset, buf.len(), |inner| {
            inner.seek(SeekFrom::Start(offset))?;
            inner.read_exact(buf)
        })
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        self.guarded(offset, data.len(), |inner| {
            inner.seek(SeekFrom::Start(offset))?;
            inner.write_all(data)
        })
    }

    fn flush(&mut self) -> Result<()> {
        self.guarded(0, 0, |inner| inner.flush())
    }

    fn is_healthy(&self) -> bool {
        !self.faulted
    }

    fn clear_fault(&mut self) {
        self.faulted = false;
    }
}

impl<T> std::fmt::Debug for IoStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IoStore")
            .field("capacity", &self.capacity)
            .field("faulted", &self.faulted)
            .finish()
    }
}
