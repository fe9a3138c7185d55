use std::io::{self, ErrorKind, Read, Write};

use floppyio_frame::ControlByte;
use floppyio_store::BackingStore;
use tracing::{debug, warn};

use crate::channel::Channel;
use crate::error::{ChannelError, Result};

const SEQUENCE_MODULUS: usize = 16;

/// Moves messages of any size through a [`Channel`], one frame at a time.
///
/// Each chunk fills a frame up to its payload capacity. The last frame of a
/// message carries end-of-data; a sender whose source fails mid-message
/// finishes with an empty frame flagged both aborted and end-of-data.
pub struct StreamAdapter<'a, S> {
    channel: &'a mut Channel<S>,
}

impl<'a, S: BackingStore> StreamAdapter<'a, S> {
    pub fn new(channel: &'a mut Channel<S>) -> Self {
        Self { channel }
    }

    /// Send everything `source` yields as one message.
    ///
    /// Returns the number of payload bytes sent. Without synchronization only
    /// a single frame can be delivered reliably, so the first chunk is sent
    /// with end-of-data and any remainder is dropped with a warning.
    pub fn send_stream<R: Read>(&mut self, mut source: R) -> Result<usize> {
        let chunk_size = self.channel.layout().payload_capacity();
        let synchronized = self.channel.config().synchronized;
        let mut chunk = vec![0u8; chunk_size];
        let mut total = 0usize;
        let mut index = 0usize;

        loop {
            let filled = match fill_chunk(&mut source, &mut chunk) {
                Ok(n) => n,
                Err(err) => return Err(self.abort(index, err)),
            };
            let exhausted = filled < chunk_size;

            if !synchronized && !exhausted {
                let mut probe = [0u8; 1];
                if matches!(fill_chunk(&mut source, &mut probe), Ok(1)) {
                    warn!(
                        sent = filled,
                        "unsynchronized channel carries one frame; remaining input dropped"
                    );
                }
            }
            let end_of_data = exhausted || !synchronized;

            let flags = ControlByte::CLEAR
                .with_end_of_data(end_of_data)
                .with_sequence((index % SEQUENCE_MODULUS) as u8);
            total += self.channel.send(&chunk[..filled], flags)?;
            index += 1;

            if end_of_data {
                debug!(frames = index, bytes = total, "stream sent");
                return Ok(total);
            }
        }
    }

    /// Receive one message into `sink`.
    ///
    /// Returns the number of payload bytes written. A message the sender
    /// aborted fails with [`ErrorCode::Aborted`](crate::ErrorCode::Aborted)
    /// after its partial contents have already reached `sink`.
    pub fn receive_stream<W: Write>(&mut self, mut sink: W) -> Result<usize> {
        let synchronized = self.channel.config().synchronized;
        let mut total = 0usize;
        let mut expected = 0u8;
        let mut frames = 0usize;

        loop {
            let frame = self.channel.receive()?;
            frames += 1;

            if synchronized && frame.control.sequence != expected {
                warn!(
                    expected,
                    got = frame.control.sequence,
                    "frame sequence gap"
                );
            }
            expected = (frame.control.sequence + 1) % SEQUENCE_MODULUS as u8;

            if let Err(err) = sink.write_all(&frame.payload) {
                return Err(self.channel.record(ChannelError::io(format!(
                    "failed to write received data: {err}"
                ))));
            }
            total += frame.payload.len();

            if frame.control.aborted {
                let _ = sink.flush();
                warn!(frames, bytes = total, "sender aborted the stream");
                return Err(self.channel.record(ChannelError::aborted(format!(
                    "sender aborted the stream after {total} bytes"
                ))));
            }

            if frame.control.end_of_data || !synchronized {
                if let Err(err) = sink.flush() {
                    return Err(self.channel.record(ChannelError::io(format!(
                        "failed to flush received data: {err}"
                    ))));
                }
                debug!(frames, bytes = total, "stream received");
                return Ok(total);
            }
        }
    }

    /// Tell the peer the message is dead, then report the source failure.
    fn abort(&mut self, index: usize, source_err: io::Error) -> ChannelError {
        warn!(error = %source_err, "source failed; aborting stream");
        let flags = ControlByte::CLEAR
            .with_end_of_data(true)
            .with_aborted(true)
            .with_sequence((index % SEQUENCE_MODULUS) as u8);

        if let Err(send_err) = self.channel.send(&[], flags) {
            debug!(error = %send_err, "abort frame not delivered");
        }
        self.channel
            .record(ChannelError::input(format!("failed to read input: {source_err}")))
    }
}

/// Read until `buf` is full or the source is exhausted.
fn fill_chunk<R: Read>(source: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::time::Duration;

    use floppyio_frame::{Framing, Role};
    use floppyio_store::MemoryStore;

    use super::*;
    use crate::config::ChannelConfig;
    use crate::error::ErrorCode;

    const CAPACITY: usize = 256;

    fn config(role: Role, framing: Framing, synchronized: bool) -> ChannelConfig {
        ChannelConfig {
            capacity: CAPACITY,
            role,
            framing,
            synchronized,
            sync_timeout: Duration::from_secs(5),
            raise_on_error: false,
            poll_interval: Duration::from_millis(1),
        }
    }

    fn pair(framing: Framing, synchronized: bool) -> (Channel<MemoryStore>, Channel<MemoryStore>) {
        let store = MemoryStore::new(CAPACITY);
        let host = Channel::new(store.clone(), config(Role::Host, framing, synchronized)).unwrap();
        let guest = Channel::new(store, config(Role::Guest, framing, synchronized)).unwrap();
        (host, guest)
    }

    /// Receives frames one by one and records their control bytes.
    fn collect_frames(guest: &mut Channel<MemoryStore>) -> Vec<(usize, ControlByte)> {
        let mut frames = Vec::new();
        loop {
            let frame = guest.receive().unwrap();
            let done = frame.control.end_of_data;
            frames.push((frame.payload.len(), frame.control));
            if done {
                return frames;
            }
        }
    }

    /// Yields `good` bytes, then fails.
    struct FailingReader {
        good: usize,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.good == 0 {
                return Err(io::Error::new(ErrorKind::BrokenPipe, "source went away"));
            }
            let n = buf.len().min(self.good);
            buf[..n].fill(b'z');
            self.good -= n;
            Ok(n)
        }
    }

    #[test]
    fn sends_k_plus_one_frames_with_final_end_of_data() {
        for framing in [Framing::Text, Framing::Binary] {
            let (mut host, mut guest) = pair(framing, true);
            let chunk = host.layout().payload_capacity();
            let data: Vec<u8> = (0..3 * chunk + 17).map(|i| b'a' + (i % 26) as u8).collect();
            let len = data.len();

            let sender = std::thread::spawn(move || host.stream().send_stream(Cursor::new(data)));
            let frames = collect_frames(&mut guest);

            assert_eq!(sender.join().unwrap().unwrap(), len);
            assert_eq!(frames.len(), 4);
            for (i, (len, control)) in frames.iter().enumerate() {
                assert_eq!(control.sequence as usize, i);
                assert_eq!(control.end_of_data, i == 3);
                assert_eq!(*len, if i == 3 { 17 } else { chunk });
            }
        }
    }

    #[test]
    fn exact_multiple_ends_with_empty_frame() {
        let (mut host, mut guest) = pair(Framing::Binary, true);
        let chunk = host.layout().payload_capacity();
        let data = vec![7u8; 2 * chunk];

        let sender = std::thread::spawn(move || host.stream().send_stream(Cursor::new(data)));
        let frames = collect_frames(&mut guest);

        assert_eq!(sender.join().unwrap().unwrap(), 2 * chunk);
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[2].0, 0);
        assert!(frames[2].1.end_of_data);
    }

    #[test]
    fn receive_stream_reassembles_message() {
        for framing in [Framing::Text, Framing::Binary] {
            let (mut host, mut guest) = pair(framing, true);
            let data: Vec<u8> = (0..1000).map(|i| b'A' + (i % 26) as u8).collect();
            let expected = data.clone();

            let sender = std::thread::spawn(move || host.stream().send_stream(Cursor::new(data)));
            let mut sink = Vec::new();
            let received = guest.stream().receive_stream(&mut sink).unwrap();

            assert_eq!(sender.join().unwrap().unwrap(), expected.len());
            assert_eq!(received, expected.len());
            assert_eq!(sink, expected);
        }
    }

    #[test]
    fn binary_stream_keeps_zero_bytes() {
        let (mut host, mut guest) = pair(Framing::Binary, true);
        let data: Vec<u8> = (0..600u32).map(|i| (i % 3) as u8).collect();
        let expected = data.clone();

        let sender = std::thread::spawn(move || host.stream().send_stream(Cursor::new(data)));
        let mut sink = Vec::new();
        guest.stream().receive_stream(&mut sink).unwrap();

        sender.join().unwrap().unwrap();
        assert_eq!(sink, expected);
    }

    #[test]
    fn empty_source_sends_single_end_of_data_frame() {
        let (mut host, mut guest) = pair(Framing::Text, true);

        let sender = std::thread::spawn(move || host.stream().send_stream(io::empty()));
        let mut sink = Vec::new();
        let received = guest.stream().receive_stream(&mut sink).unwrap();

        assert_eq!(sender.join().unwrap().unwrap(), 0);
        assert_eq!(received, 0);
        assert!(sink.is_empty());
    }

    #[test]
    fn failing_source_aborts_and_receiver_reports_aborted() {
        let (mut host, mut guest) = pair(Framing::Binary, true);
        let chunk = host.layout().payload_capacity();
        let good = chunk + chunk / 2;

        let sender = std::thread::spawn(move || {
            let result = host.stream().send_stream(FailingReader { good });
            (result, host)
        });
        let mut sink = Vec::new();
        let err = guest.stream().receive_stream(&mut sink).unwrap_err();

        assert_eq!(err.code(), ErrorCode::Aborted);
        // The first full chunk arrived; the partial second chunk was dropped.
        assert_eq!(sink.len(), chunk);
        assert!(!guest.ready());

        let (result, host) = sender.join().unwrap();
        assert_eq!(result.unwrap_err().code(), ErrorCode::InputError);
        assert_eq!(host.error().unwrap().code(), ErrorCode::InputError);
    }

    #[test]
    fn abort_frame_carries_both_flags() {
        let (mut host, mut guest) = pair(Framing::Text, true);

        let sender =
            std::thread::spawn(move || host.stream().send_stream(FailingReader { good: 0 }));
        let frame = guest.receive().unwrap();

        assert!(frame.control.aborted);
        assert!(frame.control.end_of_data);
        assert!(frame.payload.is_empty());
        assert_eq!(sender.join().unwrap().unwrap_err().code(), ErrorCode::InputError);
    }

    #[test]
    fn unsynchronized_stream_is_a_single_frame() {
        let (mut host, mut guest) = pair(Framing::Text, false);
        let chunk = host.layout().payload_capacity();
        let data = vec![b'q'; chunk * 2];

        let sent = host.stream().send_stream(Cursor::new(data)).unwrap();
        assert_eq!(sent, chunk);

        let mut sink = Vec::new();
        let received = guest.stream().receive_stream(&mut sink).unwrap();
        assert_eq!(received, chunk);
        assert_eq!(sink, vec![b'q'; chunk]);
    }

    #[test]
    fn unsynchronized_receive_without_end_of_data_returns_after_one_frame() {
        let (mut host, mut guest) = pair(Framing::Binary, false);

        host.send(b"first", ControlByte::CLEAR).unwrap();
        let mut sink = Vec::new();
        let received = guest.stream().receive_stream(&mut sink).unwrap();

        assert_eq!(received, 5);
        assert_eq!(sink, b"first");
    }

    #[test]
    fn failing_sink_is_io_error() {
        struct BrokenSink;
        impl Write for BrokenSink {
            fn write(&mut self, _: &[u8]) -> io::Result<usize> {
                Err(io::Error::new(ErrorKind::Other, "disk full"))
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let (mut host, mut guest) = pair(Framing::Text, false);
        host.send(b"data", ControlByte::CLEAR.with_end_of_data(true)).unwrap();

        let err = guest.stream().receive_stream(BrokenSink).unwrap_err();
        assert_eq!(err.code(), ErrorCode::IoError);
        assert!(err.message().contains("disk full"));
    }

    #[test]
    fn fill_chunk_retries_interrupted_reads() {
        struct Flaky {
            interrupted: bool,
            data: Cursor<Vec<u8>>,
        }
        impl Read for Flaky {
            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                if !self.interrupted {
                    self.interrupted = true;
                    return Err(io::Error::from(ErrorKind::Interrupted));
                }
                let n = buf.len().min(2);
                self.data.read(&mut buf[..n])
            }
        }

        let mut source = Flaky {
            interrupted: false,
            data: Cursor::new(b"abcdef".to_vec()),
        };
        let mut buf = [0u8; 4];
        assert_eq!(fill_chunk(&mut source, &mut buf).unwrap(), 4);
        assert_eq!(&buf, b"abcd");
        assert_eq!(fill_chunk(&mut source, &mut buf).unwrap(), 2);
    }
}
