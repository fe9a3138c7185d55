use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Result, StoreError};
use crate::traits::{BackingStore, IoStore};

/// Default image size: 28 KiB, the largest floppy image every common
/// hypervisor accepts without complaint.
pub const DEFAULT_CAPACITY: usize = 28672;

/// How [`FileStore::open`] treats the path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CreatePolicy {
    /// Create the file, discarding any previous contents.
    #[default]
    Truncate,
    /// The file (or device) must already exist.
    OpenExisting,
    /// Open an existing file, creating it if it is missing.
    OpenOrCreate,
}

/// Options for opening a [`FileStore`].
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Usable size of the store in bytes.
    pub capacity: usize,
    /// Create/truncate behavior.
    pub create: CreatePolicy,
    /// Zero-fill the store after opening. Freshly created files are always
    /// zero-filled.
    pub initialize: bool,
    /// Drop the page cache before every read and sync data on flush
    /// (Linux only; ignored elsewhere). Needed when the other endpoint writes
    /// to the underlying device behind this kernel's back.
    pub uncached: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            create: CreatePolicy::Truncate,
            initialize: true,
            uncached: false,
        }
    }
}

/// A backing store over a disk image or block device.
pub struct FileStore {
    store: IoStore<File>,
    path: PathBuf,
    uncached: bool,
}

impl FileStore {
    /// Open `path` according to `options`.
    pub fn open(path: impl AsRef<Path>, options: &StoreOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let open_err = |source: std::io::Error| StoreError::Open {
            path: path.clone(),
            source,
        };

        let (file, created) = match options.create {
            CreatePolicy::Truncate => {
                let file = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create(true)
                    .truncate(true)
                    .open(&path)
                    .map_err(open_err)?;
                (file, true)
            }
            CreatePolicy::OpenExisting => {
                let file = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .open(&path)
                    .map_err(open_err)?;
                (file, false)
            }
            CreatePolicy::OpenOrCreate => {
                match OpenOptions::new().read(true).write(true).open(&path) {
                    Ok(file) => (file, false),
                    Err(err) if err.kind() == ErrorKind::NotFound => {
                        debug!(?path, "backing file missing; creating it");
                        let file = OpenOptions::new()
                            .read(true)
                            .write(true)
                            .create_new(true)
                            .open(&path)
                            .map_err(open_err)?;
                        (file, true)
                    }
                    Err(err) => return Err(open_err(err)),
                }
            }
        };

        // Block devices report a zero length; only regular files are resized.
        let metadata = file.metadata().map_err(open_err)?;
        if metadata.is_file() && metadata.len() < options.capacity as u64 {
            file.set_len(options.capacity as u64).map_err(open_err)?;
        }

        let mut store = Self {
            store: IoStore::new(file, options.capacity),
            path,
            uncached: options.uncached,
        };

        if options.initialize || created {
            store.zero_fill()?;
            debug!(path = ?store.path, "zero-filled backing store");
        }

        info!(
            path = ?store.path,
            capacity = options.capacity,
            created,
            "opened backing store"
        );
        Ok(store)
    }

    /// The path this store was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Borrow the underlying file.
    pub fn file(&self) -> &File {
        self.store.get_ref()
    }

    #[cfg(target_os = "linux")]
    fn drop_page_cache(&self) {
        use std::os::fd::AsRawFd;

        let fd = self.store.get_ref().as_raw_fd();
        // SAFETY: `fd` is an open descriptor owned by this store for the duration
        // of the call; posix_fadvise only takes advisory action on it.
        let rc = unsafe { libc::posix_fadvise(fd, 0, 0, libc::POSIX_FADV_DONTNEED) };
        if rc != 0 {
            debug!(path = ?self.path, rc, "posix_fadvise(DONTNEED) failed");
        }
    }

    #[cfg(not(target_os = "linux"))]
    fn drop_page_cache(&self) {}
}

impl BackingStore for FileStore {
    fn capacity(&self) -> usize {
        self.store.capacity()
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        if self.uncached {
            self.drop_page_cache();
        }
        self.store.read_at(offset, buf)
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        self.store.write_at(offset, data)
    }

    fn flush(&mut self) -> Result<()> {
        if self.uncached {
            self.store.guarded(0, 0, |file| file.sync_data())
        } else {
            self.store.flush()
        }
    }

    fn is_healthy(&self) -> bool {
        self.store.is_healthy()
    }

    fn clear_fault(&mut self) {
        self.store.clear_fault()
    }
}

impl std::fmt::Debug for FileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStore")
            .field("path", &self.path)
            .field("capacity", &self.store.capacity())
            .field("healthy", &self.store.is_healthy())
            .field("uncached", &self.uncached)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("floppyio-store-{tag}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn truncate_creates_zeroed_image_of_capacity() {
        let dir = temp_dir("truncate");
        let path = dir.join("image.fp");
        std::fs::write(&path, vec![0xFFu8; 100]).unwrap();

        let store = FileStore::open(&path, &StoreOptions::default()).unwrap();
        assert_eq!(store.capacity(), DEFAULT_CAPACITY);
        drop(store);

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.len(), DEFAULT_CAPACITY);
        assert!(bytes.iter().all(|b| *b == 0));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn open_existing_requires_file() {
        let dir = temp_dir("existing");
        let path = dir.join("missing.fp");
        let options = StoreOptions {
            create: CreatePolicy::OpenExisting,
            initialize: false,
            ..StoreOptions::default()
        };

        let err = FileStore::open(&path, &options).unwrap_err();
        assert!(matches!(err, StoreError::Open { source, .. } if source.kind() == ErrorKind::NotFound));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn open_existing_without_init_keeps_contents() {
        let dir = temp_dir("keep");
        let path = dir.join("image.fp");
        let mut contents = vec![0u8; 64];
        contents[5] = 42;
        std::fs::write(&path, &contents).unwrap();

        let options = StoreOptions {
            capacity: 64,
            create: CreatePolicy::OpenExisting,
            initialize: false,
            uncached: false,
        };
        let mut store = FileStore::open(&path, &options).unwrap();
        let mut buf = [0u8; 1];
        store.read_at(5, &mut buf).unwrap();
        assert_eq!(buf[0], 42);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn open_or_create_initializes_new_file() {
        let dir = temp_dir("create");
        let path = dir.join("fresh.fp");
        let options = StoreOptions {
            capacity: 128,
            create: CreatePolicy::OpenOrCreate,
            initialize: false,
            uncached: false,
        };

        let store = FileStore::open(&path, &options).unwrap();
        assert_eq!(store.path(), path.as_path());
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 128);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn short_file_is_extended() {
        let dir = temp_dir("extend");
        let path = dir.join("short.fp");
        std::fs::write(&path, b"abc").unwrap();
        let options = StoreOptions {
            capacity: 256,
            create: CreatePolicy::OpenExisting,
            initialize: false,
            uncached: false,
        };

        let mut store = FileStore::open(&path, &options).unwrap();
        let mut buf = [0u8; 4];
        store.read_at(0, &mut buf).unwrap();
        assert_eq!(&buf, b"abc\0");
        store.read_at(252, &mut buf).unwrap();
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn two_handles_see_each_others_writes() {
        let dir = temp_dir("shared");
        let path = dir.join("shared.fp");
        let options = StoreOptions {
            capacity: 64,
            ..StoreOptions::default()
        };
        let mut host = FileStore::open(&path, &options).unwrap();
        let mut guest = FileStore::open(
            &path,
            &StoreOptions {
                create: CreatePolicy::OpenExisting,
                initialize: false,
                uncached: true,
                ..options
            },
        )
        .unwrap();

        host.write_at(63, &[1]).unwrap();
        host.flush().unwrap();

        let mut flag = [0u8; 1];
        guest.read_at(63, &mut flag).unwrap();
        assert_eq!(flag[0], 1);
        guest.flush().unwrap();
        let _ = std::fs::remove_dir_all(&dir);
    }
}
