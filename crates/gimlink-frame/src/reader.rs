use bytes::{Buf, BytesMut};
use tracing::{trace, warn};

use crate::codec::{Frame, FrameConfig, PacketCodec};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 4 * 1024;

/// One step of progress through the inbound buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadEvent {
    /// A complete, CRC-valid frame.
    Frame(Frame),
    /// Bytes dropped while resynchronizing.
    Discarded(usize),
}

/// Turns arbitrarily chunked inbound bytes into frames.
///
/// Feed bytes with [`push`](Self::push) as they arrive, then pull frames
/// until none are left. Frames split across pushes are emitted once the last
/// piece arrives; several frames in one push are emitted in order.
#[derive(Debug)]
pub struct FrameReader {
    buf: BytesMut,
    codec: PacketCodec,
    max_buffer_size: usize,
    discarded: u64,
}

impl Default for FrameReader {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameReader {
    /// Create a frame reader with default configuration.
    pub fn new() -> Self {
        Self::with_config(&FrameConfig::default())
    }

    /// Create a frame reader with explicit configuration.
    pub fn with_config(config: &FrameConfig) -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            codec: config.codec(),
            max_buffer_size: config.max_buffer_size,
            discarded: 0,
        }
    }

    /// Append newly arrived bytes.
    ///
    /// If the buffered backlog would exceed the configured bound, the backlog
    /// is dropped first and `BufferOverflow` is returned. The newest bytes
    /// (at most `max_buffer_size` of them) are kept so decoding can continue.
    pub fn push(&mut self, bytes: &[u8]) -> Result<()> {
        let size = self.buf.len() + bytes.len();
        if size > self.max_buffer_size {
            warn!(
                buffered = self.buf.len(),
                incoming = bytes.len(),
                max = self.max_buffer_size,
                "receive buffer overflow, resetting"
            );
            let keep = bytes.len().min(self.max_buffer_size);
            let dropped = self.buf.len() + (bytes.len() - keep);
            self.discarded += dropped as u64;
            self.buf.clear();
            self.buf.extend_from_slice(&bytes[bytes.len() - keep..]);
            return Err(FrameError::BufferOverflow {
                size,
                max: self.max_buffer_size,
            });
        }
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    /// Decode the next frame or discarded span.
    ///
    /// Returns `None` when the buffer holds no complete frame.
    pub fn next_event(&mut self) -> Option<ReadEvent> {
        let (frame, consumed) = self.codec.decode(&self.buf);
        if consumed == 0 {
            return None;
        }
        self.buf.advance(consumed);

        match frame {
            Some(frame) => {
                trace!(
                    seq = frame.sequence,
                    cmd = frame.command_id,
                    len = frame.payload.len(),
                    "decoded frame"
                );
                Some(ReadEvent::Frame(frame))
            }
            None => {
                self.discarded += consumed as u64;
                trace!(consumed, "resync: discarded bytes");
                Some(ReadEvent::Discarded(consumed))
            }
        }
    }

    /// Next complete frame, skipping over any garbage.
    pub fn next_frame(&mut self) -> Option<Frame> {
        while let Some(event) = self.next_event() {
            if let ReadEvent::Frame(frame) = event {
                return Some(frame);
            }
        }
        None
    }

    /// Iterate over every frame currently decodable.
    pub fn drain(&mut self) -> Drain<'_> {
        Drain { reader: self }
    }

    /// Bytes buffered but not yet decoded.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Total bytes dropped by resynchronization and overflow resets.
    pub fn discarded_bytes(&self) -> u64 {
        self.discarded
    }

    /// Drop any partial data, e.g. when a new session starts or a datagram
    /// ended mid-frame. Returns the number of bytes dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.buf.len();
        self.discarded += dropped as u64;
        self.buf.clear();
        dropped
    }
}

/// Iterator returned by [`FrameReader::drain`].
pub struct Drain<'a> {
    reader: &'a mut FrameReader,
}

impl Iterator for Drain<'_> {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        self.reader.next_frame()
    }
}
