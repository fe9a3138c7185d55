//! Duplex messaging over a shared fixed-size store.
//!
//! A [`Channel`] moves one frame at a time through its outbound region and
//! signals the peer with the control byte; with synchronization enabled it
//! polls until the peer has consumed the frame. [`StreamAdapter`] chains
//! frames into messages of any size using the end-of-data and aborted flags.

pub mod channel;
pub mod config;
pub mod error;
pub mod stream;
pub mod sync;

pub use channel::{Channel, Frame};
pub use config::{ChannelConfig, DEFAULT_POLL_INTERVAL};
pub use error::{ChannelError, ErrorCode, Result};
pub use floppyio_frame::{BufferLayout, ControlByte, Framing, Role};
pub use stream::StreamAdapter;
pub use sync::{CancelToken, SyncWaiter, WaitError};
