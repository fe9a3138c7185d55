/// Errors that can occur while deriving the buffer layout.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// The capacity cannot hold two non-empty regions and two control bytes.
    #[error("invalid capacity {capacity}: {reason}")]
    InvalidCapacity {
        capacity: usize,
        reason: &'static str,
    },
}

pub type Result<T> = std::result::Result<T, FrameError>;
