//! Fixed-capacity backing stores.
//!
//! The only thing two endpoints of a floppyio channel share is a byte store of
//! known size: a floppy image on the hypervisor side, a block device such as
//! `/dev/fd0` inside the guest. This crate provides:
//! - [`BackingStore`], the seek/read/write contract the channel layer needs
//! - [`FileStore`] for images and devices, with create/initialize policy
//! - [`MemoryStore`] for in-process loopback pairs
//!
//! Stores latch failures the way a stream's bad-bit does: after any I/O error
//! [`BackingStore::is_healthy`] reports `false` until the fault is cleared.

pub mod error;
pub mod file;
pub mod memory;
pub mod traits;

pub use error::{Result, StoreError};
pub use file::{CreatePolicy, FileStore, StoreOptions, DEFAULT_CAPACITY};
pub use memory::MemoryStore;
pub use traits::{BackingStore, IoStore};
