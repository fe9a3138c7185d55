//! The floppyio wire contract.
//!
//! Both endpoints derive the same geometry from three shared constants
//! (capacity, framing, and their own role) without ever negotiating it:
//!
//! ```text
//! Host view, capacity C, half = C/2 - 1
//! ┌────────────────────┬────────────────────┬──────────┬──────────┐
//! │ outbound (H -> G)  │ inbound (G -> H)   │ ctl out  │ ctl in   │
//! │ [0, half)          │ [half, 2*half)     │ C - 2    │ C - 1    │
//! └────────────────────┴────────────────────┴──────────┴──────────┘
//! ```
//!
//! The guest sees the same bytes with outbound and inbound swapped. In binary
//! framing every frame starts with a 4-byte little-endian payload length.
//!
//! Everything in this crate is pure: no I/O, no clocks.

pub mod codec;
pub mod control;
pub mod error;
pub mod layout;

pub use codec::{decode_length, encode_payload, text_len, LENGTH_PREFIX_SIZE};
pub use control::ControlByte;
pub use error::{FrameError, Result};
pub use layout::{BufferLayout, Framing, Role, MIN_CAPACITY};
