use std::cell::{Cell, RefCell};
use std::ffi::CString;
use std::os::raw::c_char;

use floppyio_channel::{ChannelError, ErrorCode};

/// Returned when a call unwinds instead of completing.
pub(crate) const PANIC_CODE: i32 = ErrorCode::IoError as i32;

thread_local! {
    static LAST_ERROR: RefCell<CString> = RefCell::new(CString::default());
    static LAST_CODE: Cell<ErrorCode> = const { Cell::new(ErrorCode::NoError) };
}

pub(crate) fn clear_error_state() {
    LAST_ERROR.with(|state| *state.borrow_mut() = CString::default());
    LAST_CODE.with(|code| code.set(ErrorCode::NoError));
}

pub(crate) fn set_error(code: ErrorCode, message: impl Into<String>) -> i32 {
    let sanitized = message.into().replace('\0', "?");
    LAST_ERROR.with(|state| {
        *state.borrow_mut() = CString::new(sanitized).unwrap_or_default();
    });
    LAST_CODE.with(|cell| cell.set(code));
    code.as_i32()
}

pub(crate) fn set_invalid_argument(message: impl Into<String>) -> i32 {
    set_error(ErrorCode::InputError, message)
}

pub(crate) fn set_panic_error() {
    set_error(ErrorCode::IoError, "panic across FFI boundary");
}

pub(crate) fn map_channel_error(err: &ChannelError) -> i32 {
    set_error(err.code(), err.to_string())
}

pub(crate) fn last_error_ptr() -> *const c_char {
    LAST_ERROR.with(|state| state.borrow().as_ptr())
}

pub(crate) fn last_error_code() -> i32 {
    LAST_CODE.with(|code| code.get().as_i32())
}
