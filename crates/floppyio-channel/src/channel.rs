use std::path::Path;

use bytes::{Bytes, BytesMut};
use floppyio_frame::control::DATA_PRESENT;
use floppyio_frame::{
    decode_length, encode_payload, text_len, BufferLayout, ControlByte, Framing, LENGTH_PREFIX_SIZE,
};
use floppyio_store::{BackingStore, FileStore, StoreOptions};
use tracing::{debug, info, warn};

use crate::config::ChannelConfig;
use crate::error::{ChannelError, Result};
use crate::stream::StreamAdapter;
use crate::sync::{CancelToken, SyncWaiter};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// One received frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The payload, without prefix or terminator.
    pub payload: Bytes,
    /// Control byte as the sender wrote it.
    pub control: ControlByte,
}

/// One endpoint of a duplex channel over a shared store.
///
/// The first failure is recorded on the channel and later ones are chained to
/// it. While an error is pending the channel is not [`ready`](Channel::ready)
/// and rejects data operations with [`ErrorCode::NotReady`](crate::ErrorCode::NotReady) until
/// [`clear_error`](Channel::clear_error) is called.
pub struct Channel<S> {
    store: S,
    config: ChannelConfig,
    layout: BufferLayout,
    waiter: SyncWaiter,
    error: Option<ChannelError>,
    buf: BytesMut,
}

impl Channel<FileStore> {
    /// Open a disk image or block device and bind a channel to it.
    ///
    /// `options.capacity` is overridden by `config.capacity`.
    pub fn open(path: impl AsRef<Path>, config: ChannelConfig, options: StoreOptions) -> Result<Self> {
        let options = StoreOptions {
            capacity: config.capacity,
            ..options
        };
        let store = FileStore::open(path, &options)?;
        Self::new(store, config)
    }
}

impl<S: BackingStore> Channel<S> {
    /// Bind a channel to `store`, deriving the layout once from `config`.
    pub fn new(store: S, config: ChannelConfig) -> Result<Self> {
        let layout = BufferLayout::compute(config.capacity, config.role, config.framing)?;
        if store.capacity() != config.capacity {
            return Err(ChannelError::create(format!(
                "store capacity {} does not match configured capacity {}",
                store.capacity(),
                config.capacity
            )));
        }

        debug!(
            role = config.role.as_str(),
            framing = config.framing.as_str(),
            capacity = config.capacity,
            synchronized = config.synchronized,
            "channel bound"
        );

        Ok(Self {
            waiter: SyncWaiter::new(config.poll_interval),
            store,
            config,
            layout,
            error: None,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        })
    }

    /// Let `token` interrupt synchronized waits.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.waiter = self.waiter.with_cancel_token(token);
        self
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    pub fn layout(&self) -> &BufferLayout {
        &self.layout
    }

    /// Borrow the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Mutably borrow the underlying store.
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Consume the channel and return the store.
    pub fn into_inner(self) -> S {
        self.store
    }

    /// No pending error and a healthy store.
    pub fn ready(&self) -> bool {
        self.error.is_none() && self.store.is_healthy()
    }

    /// The pending error, if any.
    pub fn error(&self) -> Option<&ChannelError> {
        self.error.as_ref()
    }

    /// Remove and return the pending error, clearing the store fault as well.
    pub fn take_error(&mut self) -> Option<ChannelError> {
        self.store.clear_fault();
        self.error.take()
    }

    /// Forget the pending error and clear the store fault.
    pub fn clear_error(&mut self) {
        let _ = self.take_error();
    }

    /// Zero-fill the whole store. Requires a ready channel.
    pub fn reset(&mut self) -> Result<()> {
        self.ensure_ready()?;
        if let Err(err) = self.store.zero_fill() {
            return Err(self.record(err.into()));
        }
        info!(capacity = self.config.capacity, "store reset");
        Ok(())
    }

    /// Multi-frame message operations over this channel.
    pub fn stream(&mut self) -> StreamAdapter<'_, S> {
        StreamAdapter::new(self)
    }

    /// Write one frame and raise the outbound flag.
    ///
    /// The payload is silently truncated to the frame capacity. `flags`
    /// contribute end-of-data, aborted and sequence; data-present and the
    /// length-prefix bit are set by the channel. When synchronized, blocks
    /// until the peer has cleared the flag.
    ///
    /// Returns the number of payload bytes written.
    pub fn send(&mut self, payload: &[u8], flags: ControlByte) -> Result<usize> {
        self.ensure_ready()?;

        let capacity = self.layout.payload_capacity();
        if payload.len() > capacity {
            warn!(len = payload.len(), capacity, "payload truncated to frame capacity");
        }
        let written = encode_payload(payload, self.layout.framing, capacity, &mut self.buf);
        let control = ControlByte {
            data_present: true,
            length_prefix: self.layout.framing == Framing::Binary,
            ..flags
        };

        let offset = self.layout.outbound_offset as u64;
        let flag_offset = self.layout.control_out_offset as u64;
        let outcome = self
            .store
            .write_at(offset, &self.buf)
            .and_then(|()| self.store.write_at(flag_offset, &[control.encode()]))
            .and_then(|()| self.store.flush());
        if let Err(err) = outcome {
            return Err(self.record(err.into()));
        }

        debug!(
            offset,
            len = written,
            control = control.encode(),
            "frame written"
        );

        if self.config.synchronized {
            self.wait_for(self.layout.control_out_offset, 0)?;
        }
        Ok(written)
    }

    /// Read one frame and clear the inbound flag.
    ///
    /// When synchronized, blocks until the peer has raised the flag.
    pub fn receive(&mut self) -> Result<Frame> {
        self.ensure_ready()?;

        if self.config.synchronized {
            self.wait_for(self.layout.control_in_offset, DATA_PRESENT)?;
        }

        match self.read_inbound() {
            Ok(frame) => {
                debug!(
                    offset = self.layout.inbound_offset,
                    len = frame.payload.len(),
                    control = frame.control.encode(),
                    "frame received"
                );
                Ok(frame)
            }
            Err(err) => Err(self.record(err)),
        }
    }

    /// Decode the inbound control byte without acknowledging it.
    pub fn peek_inbound(&mut self) -> Result<ControlByte> {
        self.peek(self.layout.control_in_offset)
    }

    /// Decode the outbound control byte as the peer currently sees it.
    pub fn peek_outbound(&mut self) -> Result<ControlByte> {
        self.peek(self.layout.control_out_offset)
    }

    fn peek(&mut self, offset: usize) -> Result<ControlByte> {
        self.ensure_ready()?;
        let mut raw = [0u8; 1];
        match self.store.read_at(offset as u64, &mut raw) {
            Ok(()) => Ok(ControlByte::decode(raw[0])),
            Err(err) => Err(self.record(err.into())),
        }
    }

    fn read_inbound(&mut self) -> Result<Frame> {
        let layout = self.layout;
        let mut raw = [0u8; 1];
        self.store
            .read_at(layout.control_in_offset as u64, &mut raw)?;
        let control = ControlByte::decode(raw[0]);

        let base = layout.inbound_offset as u64;
        let (start, len) = match (layout.framing, control.length_prefix) {
            (Framing::Binary, true) => {
                let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
                self.store.read_at(base, &mut prefix)?;
                let len = decode_length(prefix, layout.inbound_size);
                (base + LENGTH_PREFIX_SIZE as u64, len)
            }
            (Framing::Binary, false) => (base + LENGTH_PREFIX_SIZE as u64, layout.inbound_size),
            (Framing::Text, _) => (base, layout.inbound_size),
        };

        self.buf.clear();
        self.buf.resize(len, 0);
        self.store.read_at(start, &mut self.buf)?;
        if layout.framing == Framing::Text {
            let len = text_len(&self.buf);
            self.buf.truncate(len);
        }
        let payload = self.buf.split().freeze();

        self.store
            .write_at(layout.control_in_offset as u64, &[ControlByte::CLEAR.encode()])?;
        self.store.flush()?;

        Ok(Frame { payload, control })
    }

    fn wait_for(&mut self, offset: usize, expected: u8) -> Result<()> {
        let timeout = self.config.effective_timeout();
        match self
            .waiter
            .wait(&mut self.store, offset, timeout, expected, DATA_PRESENT)
        {
            Ok(_) => Ok(()),
            Err(err) => Err(self.record(err.into())),
        }
    }

    fn ensure_ready(&self) -> Result<()> {
        if let Some(pending) = &self.error {
            return Err(self.raise(ChannelError::not_ready(format!(
                "channel has a pending error: {pending}"
            ))));
        }
        if !self.store.is_healthy() {
            return Err(self.raise(ChannelError::not_ready(
                "backing store is in a failed state",
            )));
        }
        Ok(())
    }

    /// Record `err` on the channel (chaining onto a pending error) and hand
    /// it back for the caller to return.
    pub(crate) fn record(&mut self, err: ChannelError) -> ChannelError {
        warn!(code = err.code().as_i32(), error = %err, "channel error");
        match &mut self.error {
            Some(pending) => pending.chain(err.clone()),
            None => self.error = Some(err.clone()),
        }
        self.raise(err)
    }

    fn raise(&self, err: ChannelError) -> ChannelError {
        if self.config.raise_on_error {
            std::panic::panic_any(err);
        }
        err
    }
}

impl<S> std::fmt::Debug for Channel<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("layout", &self.layout)
            .field("synchronized", &self.config.synchronized)
            .field("error", &self.error.as_ref().map(ChannelError::code))
            .finish()
    }
}
