//! Duplex messaging between a hypervisor and its guests over a shared disk image.
//!
//! Both endpoints open the same fixed-size file or block device (a floppy
//! image by default) and exchange frames through two mirrored regions, each
//! guarded by a one-byte control flag.
//!
//! # Crate Structure
//!
//! - [`store`] — Fixed-capacity backing stores (files, block devices, memory)
//! - [`frame`] — Region layout, control-byte encoding and payload framing
//! - [`channel`] — Synchronized send/receive and multi-frame streaming
//!
//! ```no_run
//! use floppyio::channel::{Channel, ChannelConfig, ControlByte};
//! use floppyio::store::StoreOptions;
//!
//! # fn main() -> floppyio::channel::Result<()> {
//! let mut host = Channel::open("/var/lib/vm/floppy.img", ChannelConfig::host(), StoreOptions::default())?;
//! host.send(b"ping", ControlByte::CLEAR)?;
//! # Ok(())
//! # }
//! ```

/// Re-export store types.
pub mod store {
    pub use floppyio_store::*;
}

/// Re-export frame types.
pub mod frame {
    pub use floppyio_frame::*;
}

/// Re-export channel types.
pub mod channel {
    pub use floppyio_channel::*;
}
