use std::ffi::c_void;

use floppyio_channel::Channel;
use floppyio_store::FileStore;

/// Open as the host endpoint; the guest is the default.
pub const FPIO_HOST: u32 = 0x01;
/// Length-prefixed binary frames instead of null-terminated text.
pub const FPIO_BINARY: u32 = 0x02;
/// Block in send/receive until the peer acknowledges.
pub const FPIO_SYNCHRONIZED: u32 = 0x04;
/// Keep the existing contents instead of zero-filling on open.
pub const FPIO_NOINIT: u32 = 0x08;
/// Open without truncating. A missing image is still created, and zero-filled.
pub const FPIO_NOCREATE: u32 = 0x10;

pub(crate) const FPIO_KNOWN_FLAGS: u32 =
    FPIO_HOST | FPIO_BINARY | FPIO_SYNCHRONIZED | FPIO_NOINIT | FPIO_NOCREATE;

/// Send flag: this frame is the last of its message.
pub const FPIO_END_OF_DATA: u8 = 0x02;
/// Send flag: the sender gave up on the message.
pub const FPIO_ABORTED: u8 = 0x08;
/// Send flags: the high nibble carries the frame sequence number.
pub const FPIO_SEQUENCE_MASK: u8 = 0xF0;

pub const FPIO_OK: i32 = 0;
pub const FPIO_ERR_IO: i32 = -1;
pub const FPIO_ERR_TIMEOUT: i32 = -2;
pub const FPIO_ERR_CREATE: i32 = -3;
pub const FPIO_ERR_NOT_READY: i32 = -4;
pub const FPIO_ERR_INPUT: i32 = -5;
pub const FPIO_ERR_ABORTED: i32 = -6;

pub type FpioHandle = *mut c_void;

pub(crate) struct ChannelHandle {
    pub(crate) channel: Channel<FileStore>,
}
