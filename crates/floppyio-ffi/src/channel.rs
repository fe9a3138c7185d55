use std::os::raw::c_char;
use std::time::Duration;

use floppyio_channel::{Channel, ChannelConfig, ControlByte, Framing, Role, DEFAULT_POLL_INTERVAL};
use floppyio_store::{CreatePolicy, StoreOptions, DEFAULT_CAPACITY};

use crate::args;
use crate::error;
use crate::types::{
    ChannelHandle, FpioHandle, FPIO_BINARY, FPIO_HOST, FPIO_KNOWN_FLAGS, FPIO_NOCREATE,
    FPIO_NOINIT, FPIO_OK, FPIO_SYNCHRONIZED,
};

fn with_channel_mut<T>(
    handle: FpioHandle,
    on_error: impl FnOnce() -> T,
    f: impl FnOnce(&mut ChannelHandle) -> T,
) -> T {
    if handle.is_null() {
        let _ = error::set_invalid_argument("channel handle cannot be null");
        return on_error();
    }

    let channel_handle = {
        // SAFETY: Pointer validity is guaranteed by the caller.
        unsafe { &mut *(handle as *mut ChannelHandle) }
    };

    f(channel_handle)
}

fn config_from_flags(capacity: usize, flags: u32, timeout_secs: u32) -> ChannelConfig {
    ChannelConfig {
        capacity: if capacity == 0 { DEFAULT_CAPACITY } else { capacity },
        role: if flags & FPIO_HOST != 0 {
            Role::Host
        } else {
            Role::Guest
        },
        framing: if flags & FPIO_BINARY != 0 {
            Framing::Binary
        } else {
            Framing::Text
        },
        synchronized: flags & FPIO_SYNCHRONIZED != 0,
        sync_timeout: Duration::from_secs(u64::from(timeout_secs)),
        raise_on_error: false,
        poll_interval: DEFAULT_POLL_INTERVAL,
    }
}

fn options_from_flags(flags: u32) -> StoreOptions {
    StoreOptions {
        create: if flags & FPIO_NOCREATE != 0 {
            CreatePolicy::OpenOrCreate
        } else {
            CreatePolicy::Truncate
        },
        initialize: flags & FPIO_NOINIT == 0,
        ..StoreOptions::default()
    }
}

/// Open the image or device at `path` as one endpoint of a channel.
///
/// A `capacity` of zero selects the standard 28672-byte floppy image and a
/// `timeout_secs` of zero waits forever. Returns null on failure; the reason
/// is available from `fpio_last_error`.
///
/// # Safety
/// `path` must be a non-null pointer to a valid UTF-8, NUL-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn fpio_open(
    path: *const c_char,
    capacity: usize,
    flags: u32,
    timeout_secs: u32,
) -> FpioHandle {
    crate::ffi_boundary(std::ptr::null_mut(), || {
        error::clear_error_state();

        let path = {
            // SAFETY: We validate null and UTF-8 in helper.
            match unsafe { args::required_str_arg(path, "path") } {
                Some(v) => v,
                None => return std::ptr::null_mut(),
            }
        };

        if flags & !FPIO_KNOWN_FLAGS != 0 {
            let _ = error::set_invalid_argument(format!("unknown flag bits {flags:#x}"));
            return std::ptr::null_mut();
        }

        let config = config_from_flags(capacity, flags, timeout_secs);
        match Channel::open(path, config, options_from_flags(flags)) {
            Ok(channel) => Box::into_raw(Box::new(ChannelHandle { channel })) as FpioHandle,
            Err(err) => {
                let _ = error::map_channel_error(&err);
                std::ptr::null_mut()
            }
        }
    })
}

/// Close a channel handle.
///
/// # Safety
/// `handle` must be null or a handle previously returned by `fpio_open`.
#[no_mangle]
pub unsafe extern "C" fn fpio_close(handle: FpioHandle) {
    crate::ffi_boundary((), || {
        if handle.is_null() {
            return;
        }

        // SAFETY: Caller guarantees this handle was allocated by fpio_open.
        unsafe {
            drop(Box::from_raw(handle as *mut ChannelHandle));
        }
    });
}

/// Send one frame. Oversized payloads are truncated to the frame capacity.
///
/// `flags` is a control byte: `FPIO_END_OF_DATA`, `FPIO_ABORTED` and the
/// sequence number in `FPIO_SEQUENCE_MASK`. The data-present and
/// length-prefix bits are always set by the channel.
///
/// # Safety
/// `handle` must be a valid channel handle. If `len > 0`, `data` must be
/// non-null and readable for `len` bytes. `out_sent` may be null.
#[no_mangle]
pub unsafe extern "C" fn fpio_send(
    handle: FpioHandle,
    data: *const u8,
    len: usize,
    flags: u8,
    out_sent: *mut usize,
) -> i32 {
    crate::ffi_boundary(error::PANIC_CODE, || {
        error::clear_error_state();

        let payload = {
            // SAFETY: We validate pointer/length pairing in helper.
            match unsafe { args::bytes_arg(data, len, "data") } {
                Some(v) => v,
                None => return error::last_error_code(),
            }
        };

        with_channel_mut(handle, error::last_error_code, |h| {
            match h.channel.send(payload, ControlByte::decode(flags)) {
                Ok(sent) => {
                    // SAFETY: Out-pointer is null or writable per the caller contract.
                    unsafe { args::write_out(out_sent, sent) };
                    FPIO_OK
                }
                Err(err) => error::map_channel_error(&err),
            }
        })
    })
}

/// Receive one frame into `buf`.
///
/// On success `out_len` holds the payload length and `out_flags` the raw
/// control byte the sender wrote. A payload longer than `cap` is cut to `cap`
/// bytes and reported as an input error; the frame is consumed either way.
///
/// # Safety
/// `handle` must be a valid channel handle. If `cap > 0`, `buf` must be
/// non-null and writable for `cap` bytes. `out_len` and `out_flags` may be null.
#[no_mangle]
pub unsafe extern "C" fn fpio_receive(
    handle: FpioHandle,
    buf: *mut u8,
    cap: usize,
    out_len: *mut usize,
    out_flags: *mut u8,
) -> i32 {
    crate::ffi_boundary(error::PANIC_CODE, || {
        error::clear_error_state();

        let buffer = {
            // SAFETY: We validate pointer/capacity pairing in helper.
            match unsafe { args::buffer_arg(buf, cap, "buf") } {
                Some(v) => v,
                None => return error::last_error_code(),
            }
        };

        with_channel_mut(handle, error::last_error_code, |h| {
            let frame = match h.channel.receive() {
                Ok(frame) => frame,
                Err(err) => return error::map_channel_error(&err),
            };

            let copied = frame.payload.len().min(buffer.len());
            buffer[..copied].copy_from_slice(&frame.payload[..copied]);
            // SAFETY: Out-pointers are null or writable per the caller contract.
            unsafe {
                args::write_out(out_len, copied);
                args::write_out(out_flags, frame.control.encode());
            }

            if copied < frame.payload.len() {
                return error::set_invalid_argument(format!(
                    "receive buffer of {cap} bytes is too small for a {} byte frame",
                    frame.payload.len()
                ));
            }
            FPIO_OK
        })
    })
}

/// Zero-fill the backing store. Fails with not-ready while an error is pending.
///
/// # Safety
/// `handle` must be a valid channel handle.
#[no_mangle]
pub unsafe extern "C" fn fpio_reset(handle: FpioHandle) -> i32 {
    crate::ffi_boundary(error::PANIC_CODE, || {
        error::clear_error_state();

        with_channel_mut(handle, error::last_error_code, |h| {
            match h.channel.reset() {
                Ok(()) => FPIO_OK,
                Err(err) => error::map_channel_error(&err),
            }
        })
    })
}

/// Returns 1 when the channel has no pending error and a healthy store, else 0.
///
/// # Safety
/// `handle` must be null or a valid channel handle.
#[no_mangle]
pub unsafe extern "C" fn fpio_ready(handle: FpioHandle) -> i32 {
    crate::ffi_boundary(0, || {
        if handle.is_null() {
            return 0;
        }
        with_channel_mut(handle, || 0, |h| i32::from(h.channel.ready()))
    })
}

/// Forget the pending error and clear the store fault.
///
/// # Safety
/// `handle` must be a valid channel handle.
#[no_mangle]
pub unsafe extern "C" fn fpio_clear_error(handle: FpioHandle) -> i32 {
    crate::ffi_boundary(error::PANIC_CODE, || {
        error::clear_error_state();

        with_channel_mut(handle, error::last_error_code, |h| {
            h.channel.clear_error();
            FPIO_OK
        })
    })
}

/// Largest payload a single frame carries, or 0 for a null handle.
///
/// # Safety
/// `handle` must be null or a valid channel handle.
#[no_mangle]
pub unsafe extern "C" fn fpio_payload_capacity(handle: FpioHandle) -> usize {
    crate::ffi_boundary(0, || {
        if handle.is_null() {
            return 0;
        }
        with_channel_mut(handle, || 0, |h| h.channel.layout().payload_capacity())
    })
}

#[cfg(test)]
mod tests {
    use std::ffi::{CStr, CString};
    use std::path::PathBuf;

    use super::*;
    use crate::types::{
        FPIO_ABORTED, FPIO_END_OF_DATA, FPIO_ERR_CREATE, FPIO_ERR_INPUT, FPIO_ERR_NOT_READY,
        FPIO_ERR_TIMEOUT, FPIO_SEQUENCE_MASK,
    };

    fn temp_image(tag: &str) -> (PathBuf, CString) {
        let dir = std::env::temp_dir().join(format!("floppyio-ffi-{tag}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("channel.fp");
        let c_path = CString::new(path.to_str().unwrap()).unwrap();
        (dir, c_path)
    }

    fn last_error() -> String {
        // SAFETY: fpio_last_error returns a pointer to a thread-local CString.
        unsafe { CStr::from_ptr(crate::fpio_last_error()) }
            .to_string_lossy()
            .into_owned()
    }

    #[test]
    fn host_and_guest_exchange_a_frame() {
        let (dir, path) = temp_image("exchange");

        // SAFETY: Valid C string and handles throughout.
        unsafe {
            let host = fpio_open(path.as_ptr(), 1024, FPIO_HOST | FPIO_BINARY, 0);
            assert!(!host.is_null(), "{}", last_error());
            let guest = fpio_open(path.as_ptr(), 1024, FPIO_BINARY | FPIO_NOINIT | FPIO_NOCREATE, 0);
            assert!(!guest.is_null(), "{}", last_error());
            assert_eq!(fpio_ready(host), 1);

            let payload = b"a\0b";
            let mut sent = 0usize;
            assert_eq!(fpio_send(host, payload.as_ptr(), payload.len(), 0, &mut sent), FPIO_OK);
            assert_eq!(sent, 3);

            let mut buf = [0u8; 64];
            let mut len = 0usize;
            let mut flags = 0u8;
            assert_eq!(
                fpio_receive(guest, buf.as_mut_ptr(), buf.len(), &mut len, &mut flags),
                FPIO_OK
            );
            assert_eq!(&buf[..len], payload);
            assert_eq!(flags & 0x01, 0x01);
            assert_eq!(flags & 0x04, 0x04);

            fpio_close(guest);
            fpio_close(host);
        }
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn small_receive_buffer_is_input_error() {
        let (dir, path) = temp_image("smallbuf");

        // SAFETY: Valid C string and handles throughout.
        unsafe {
            let host = fpio_open(path.as_ptr(), 512, FPIO_HOST, 0);
            let guest = fpio_open(path.as_ptr(), 512, FPIO_NOINIT | FPIO_NOCREATE, 0);
            assert!(!host.is_null() && !guest.is_null());

            let payload = b"twelve bytes";
            assert_eq!(fpio_send(host, payload.as_ptr(), payload.len(), 0, std::ptr::null_mut()), FPIO_OK);

            let mut buf = [0u8; 4];
            let mut len = 0usize;
            let code = fpio_receive(guest, buf.as_mut_ptr(), buf.len(), &mut len, std::ptr::null_mut());
            assert_eq!(code, FPIO_ERR_INPUT);
            assert_eq!(len, 4);
            assert_eq!(&buf, b"twel");
            assert!(last_error().contains("too small"));

            fpio_close(guest);
            fpio_close(host);
        }
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn synchronized_timeout_then_clear_error() {
        let (dir, path) = temp_image("timeout");

        // SAFETY: Valid C string and handles throughout.
        unsafe {
            let host = fpio_open(path.as_ptr(), 256, FPIO_HOST | FPIO_SYNCHRONIZED, 1);
            assert!(!host.is_null());

            let payload = b"unanswered";
            let code = fpio_send(host, payload.as_ptr(), payload.len(), 0, std::ptr::null_mut());
            assert_eq!(code, FPIO_ERR_TIMEOUT);
            assert_eq!(crate::fpio_last_error_code(), FPIO_ERR_TIMEOUT);
            assert_eq!(fpio_ready(host), 0);
            assert_eq!(fpio_reset(host), FPIO_ERR_NOT_READY);

            assert_eq!(fpio_clear_error(host), FPIO_OK);
            assert_eq!(fpio_ready(host), 1);
            assert_eq!(fpio_reset(host), FPIO_OK);

            fpio_close(host);
        }
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn unreachable_image_fails() {
        let path = CString::new("/nonexistent/floppyio/image.fp").unwrap();

        // SAFETY: Valid C string.
        let handle = unsafe { fpio_open(path.as_ptr(), 0, FPIO_NOCREATE, 0) };
        assert!(handle.is_null());
        assert_eq!(crate::fpio_last_error_code(), FPIO_ERR_CREATE);
        assert!(last_error().contains("/nonexistent/floppyio/image.fp"));
    }

    #[test]
    fn rejects_bad_arguments() {
        // SAFETY: Null pointers are rejected before use.
        unsafe {
            assert!(fpio_open(std::ptr::null(), 0, 0, 0).is_null());
            assert!(last_error().contains("path cannot be null"));

            let path = CString::new("/tmp/unused.fp").unwrap();
            assert!(fpio_open(path.as_ptr(), 0, 0x80, 0).is_null());
            assert!(last_error().contains("unknown flag bits"));

            assert_eq!(
                fpio_send(std::ptr::null_mut(), std::ptr::null(), 0, 0, std::ptr::null_mut()),
                FPIO_ERR_INPUT
            );
            assert!(last_error().contains("handle cannot be null"));

            assert_eq!(fpio_ready(std::ptr::null_mut()), 0);
            assert_eq!(fpio_payload_capacity(std::ptr::null_mut()), 0);
            fpio_close(std::ptr::null_mut());
        }
    }

    #[test]
    fn flags_select_configuration() {
        let config = config_from_flags(0, FPIO_HOST | FPIO_BINARY | FPIO_SYNCHRONIZED, 3);
        assert_eq!(config.capacity, DEFAULT_CAPACITY);
        assert_eq!(config.role, Role::Host);
        assert_eq!(config.framing, Framing::Binary);
        assert!(config.synchronized);
        assert_eq!(config.sync_timeout, Duration::from_secs(3));
        assert!(!config.raise_on_error);

        let options = options_from_flags(FPIO_NOINIT | FPIO_NOCREATE);
        assert_eq!(options.create, CreatePolicy::OpenOrCreate);
        assert!(!options.initialize);

        let options = options_from_flags(0);
        assert_eq!(options.create, CreatePolicy::Truncate);
        assert!(options.initialize);
    }

    #[test]
    fn open_without_nocreate_truncates_the_image() {
        let (dir, path) = temp_image("truncate");
        let image = dir.join("channel.fp");
        std::fs::write(&image, vec![0xAAu8; 2048]).unwrap();

        // SAFETY: Valid C string and handle.
        unsafe {
            let host = fpio_open(path.as_ptr(), 1024, FPIO_HOST | FPIO_NOINIT, 0);
            assert!(!host.is_null(), "{}", last_error());
            fpio_close(host);
        }

        let contents = std::fs::read(&image).unwrap();
        assert_eq!(contents.len(), 1024);
        assert!(contents.iter().all(|&b| b == 0));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn nocreate_keeps_existing_contents() {
        let (dir, path) = temp_image("keep");
        let image = dir.join("channel.fp");
        std::fs::write(&image, vec![0xAAu8; 1024]).unwrap();

        // SAFETY: Valid C string and handle.
        unsafe {
            let guest = fpio_open(path.as_ptr(), 1024, FPIO_NOINIT | FPIO_NOCREATE, 0);
            assert!(!guest.is_null(), "{}", last_error());
            fpio_close(guest);
        }

        assert!(std::fs::read(&image).unwrap().iter().all(|&b| b == 0xAA));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn send_flags_end_a_stream() {
        let (dir, path) = temp_image("eod");

        // SAFETY: Valid C string and handle throughout.
        let host = unsafe { fpio_open(path.as_ptr(), 1024, FPIO_HOST, 0) };
        assert!(!host.is_null(), "{}", last_error());

        let payload = b"whole message";
        // SAFETY: Valid handle and payload.
        let code = unsafe {
            fpio_send(host, payload.as_ptr(), payload.len(), FPIO_END_OF_DATA, std::ptr::null_mut())
        };
        assert_eq!(code, FPIO_OK);

        let config = ChannelConfig {
            capacity: 1024,
            synchronized: true,
            sync_timeout: Duration::from_secs(2),
            ..ChannelConfig::guest()
        };
        let options = StoreOptions {
            create: CreatePolicy::OpenExisting,
            initialize: false,
            ..StoreOptions::default()
        };
        let mut guest = Channel::open(dir.join("channel.fp"), config, options).unwrap();
        let mut sink = Vec::new();
        let received = guest.stream().receive_stream(&mut sink).unwrap();

        assert_eq!(received, payload.len());
        assert_eq!(sink, payload);

        // SAFETY: Handle came from fpio_open.
        unsafe { fpio_close(host) };
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn send_flags_reach_the_receiver() {
        let (dir, path) = temp_image("flags");

        // SAFETY: Valid C string and handles throughout.
        unsafe {
            let host = fpio_open(path.as_ptr(), 512, FPIO_HOST, 0);
            let guest = fpio_open(path.as_ptr(), 512, FPIO_NOINIT | FPIO_NOCREATE, 0);
            assert!(!host.is_null() && !guest.is_null());

            let flags = FPIO_ABORTED | (0x3 << 4);
            assert_eq!(fpio_send(host, b"x".as_ptr(), 1, flags, std::ptr::null_mut()), FPIO_OK);

            let mut buf = [0u8; 8];
            let mut out_flags = 0u8;
            assert_eq!(
                fpio_receive(guest, buf.as_mut_ptr(), buf.len(), std::ptr::null_mut(), &mut out_flags),
                FPIO_OK
            );
            assert_eq!(out_flags & 0x01, 0x01);
            assert_eq!(out_flags & FPIO_ABORTED, FPIO_ABORTED);
            assert_eq!(out_flags & FPIO_END_OF_DATA, 0);
            assert_eq!((out_flags & FPIO_SEQUENCE_MASK) >> 4, 0x3);

            fpio_close(guest);
            fpio_close(host);
        }
        let _ = std::fs::remove_dir_all(&dir);
    }
}
