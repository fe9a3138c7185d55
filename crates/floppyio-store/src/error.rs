use std::path::PathBuf;

/// Errors that can occur in backing store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Failed to open or create the backing file.
    #[error("failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    /// An I/O error occurred while seeking, reading or writing.
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The access falls outside the fixed capacity of the store.
    #[error("access of {len} bytes at offset {offset} exceeds capacity {capacity}")]
    OutOfBounds {
        offset: u64,
        len: usize,
        capacity: usize,
    },

    /// A previous failure left the store in a bad state.
    #[error("store is in a failed state")]
    Faulted,
}

pub type Result<T> = std::result::Result<T, StoreError>;
