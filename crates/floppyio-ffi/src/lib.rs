//! floppyio-ffi: C-ABI exports for floppyio channels.
//!
//! Every function returns one of the stable `FPIO_*` codes (0 on success,
//! negative on failure) unless documented otherwise. The message for the
//! most recent failure on the calling thread is available from
//! [`fpio_last_error`].

mod args;
mod channel;
mod error;
mod types;

use std::panic::AssertUnwindSafe;

pub use channel::{
    fpio_clear_error, fpio_close, fpio_open, fpio_payload_capacity, fpio_ready, fpio_receive,
    fpio_reset, fpio_send,
};
pub use types::{
    FpioHandle, FPIO_ABORTED, FPIO_BINARY, FPIO_END_OF_DATA, FPIO_ERR_ABORTED, FPIO_ERR_CREATE,
    FPIO_ERR_INPUT, FPIO_ERR_IO, FPIO_ERR_NOT_READY, FPIO_ERR_TIMEOUT, FPIO_HOST, FPIO_NOCREATE,
    FPIO_NOINIT, FPIO_OK, FPIO_SEQUENCE_MASK, FPIO_SYNCHRONIZED,
};

fn ffi_boundary<T>(on_panic: T, f: impl FnOnce() -> T) -> T {
    match std::panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => value,
        Err(_) => {
            error::set_panic_error();
            on_panic
        }
    }
}

/// Message for the last failure on this thread, empty after a success.
#[no_mangle]
pub extern "C" fn fpio_last_error() -> *const std::os::raw::c_char {
    ffi_boundary(std::ptr::null(), error::last_error_ptr)
}

/// Code of the last failure on this thread, `FPIO_OK` after a success.
#[no_mangle]
pub extern "C" fn fpio_last_error_code() -> i32 {
    ffi_boundary(FPIO_ERR_IO, error::last_error_code)
}
