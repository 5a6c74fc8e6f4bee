use bytes::{BufMut, Bytes, BytesMut};

use crate::crc::{crc16, Crc16};
use crate::error::{FrameError, Result};

/// Default frame marker. Transmitted low byte first: `0x55 0x66`.
pub const MARKER: u16 = 0x6655;

/// Header: marker (2) + control (1) + length (2) + sequence (2) + command (1).
pub const HEADER_SIZE: usize = 8;

/// Trailing CRC-16.
pub const CRC_SIZE: usize = 2;

/// Smallest possible frame (empty payload).
pub const MIN_FRAME_SIZE: usize = HEADER_SIZE + CRC_SIZE;

/// Largest payload the 2-byte length field can describe.
pub const MAX_PAYLOAD: usize = u16::MAX as usize;

/// Largest possible frame on the wire.
pub const MAX_FRAME_SIZE: usize = MIN_FRAME_SIZE + MAX_PAYLOAD;

/// Default bound on buffered, not yet decoded, inbound bytes.
pub const DEFAULT_MAX_BUFFER: usize = 2 * MAX_FRAME_SIZE;

/// Control bit: the sender wants an acknowledgement.
pub const CTRL_NEEDS_ACK: u8 = 0x01;

/// Control bit: this frame is an acknowledgement.
pub const CTRL_IS_ACK: u8 = 0x02;

/// One unit of the wire protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Correlates a command with its acknowledgement. Wraps at 65535.
    pub sequence: u16,
    /// Command identifier. Meaning is device specific.
    pub command_id: u8,
    pub payload: Bytes,
    pub needs_ack: bool,
    pub is_ack: bool,
}

impl Frame {
    /// A plain command frame with no flags set.
    pub fn new(sequence: u16, command_id: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            sequence,
            command_id,
            payload: payload.into(),
            needs_ack: false,
            is_ack: false,
        }
    }

    /// An acknowledgement for `sequence`.
    pub fn ack(sequence: u16, command_id: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            is_ack: true,
            ..Self::new(sequence, command_id, payload)
        }
    }

    pub fn with_needs_ack(mut self, needs_ack: bool) -> Self {
        self.needs_ack = needs_ack;
        self
    }

    /// Packed control byte.
    pub fn control(&self) -> u8 {
        let mut ctrl = 0;
        if self.needs_ack {
            ctrl |= CTRL_NEEDS_ACK;
        }
        if self.is_ack {
            ctrl |= CTRL_IS_ACK;
        }
        ctrl
    }

    /// The total wire size of this frame (header + payload + CRC).
    pub fn wire_size(&self) -> usize {
        MIN_FRAME_SIZE + self.payload.len()
    }
}

/// Encoder/decoder for one marker value.
///
/// Pure: no state beyond the marker chosen at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketCodec {
    marker: [u8; 2],
}

impl Default for PacketCodec {
    fn default() -> Self {
        Self::new(MARKER)
    }
}

impl PacketCodec {
    pub const fn new(marker: u16) -> Self {
        Self {
            marker: marker.to_le_bytes(),
        }
    }

    pub fn marker(&self) -> u16 {
        u16::from_le_bytes(self.marker)
    }

    /// Encode a frame into a fresh buffer.
    pub fn encode(&self, frame: &Frame) -> Result<Bytes> {
        let mut dst = BytesMut::with_capacity(frame.wire_size());
        self.encode_to(frame, &mut dst)?;
        Ok(dst.freeze())
    }

    /// Append the wire form of `frame` to `dst`.
    ///
    /// Wire format:
    /// ```text
    /// ┌─────────┬──────┬─────────┬─────────┬─────┬─────────┬─────────┐
    /// │ Marker  │ Ctrl │ Length  │ Seq     │ Cmd │ Payload │ CRC16   │
    /// │ 2B LE   │ 1B   │ 2B LE   │ 2B LE   │ 1B  │ N bytes │ 2B LE   │
    /// └─────────┴──────┴─────────┴─────────┴─────┴─────────┴─────────┘
    ///            └──────────── CRC covers these ─────────────┘
    /// ```
    pub fn encode_to(&self, frame: &Frame, dst: &mut BytesMut) -> Result<()> {
        if frame.payload.len() > MAX_PAYLOAD {
            return Err(FrameError::PayloadTooLarge {
                size: frame.payload.len(),
                max: MAX_PAYLOAD,
            });
        }

        dst.reserve(frame.wire_size());
        dst.put_slice(&self.marker);
        let body_start = dst.len();
        dst.put_u8(frame.control());
        dst.put_u16_le(frame.payload.len() as u16);
        dst.put_u16_le(frame.sequence);
        dst.put_u8(frame.command_id);
        dst.put_slice(&frame.payload);

        let mut crc = Crc16::new();
        crc.update(&dst[body_start..]);
        dst.put_u16_le(crc.finish());
        Ok(())
    }

    /// Try to decode one frame from the front of `buf`.
    ///
    /// Returns the frame (if any) and how many bytes the caller must drop
    /// from the front of the buffer:
    /// - `(None, 0)`: not enough data yet, wait for more bytes
    /// - `(None, 1)`: marker mismatch, skip one byte
    /// - `(None, 2)`: CRC mismatch, skip the marker
    /// - `(Some(frame), n)`: a complete frame of `n` bytes
    ///
    /// Callers must always advance by the returned count, even without a
    /// frame, or corrupted input will stall the stream.
    pub fn decode(&self, buf: &[u8]) -> (Option<Frame>, usize) {
        if buf.len() < MIN_FRAME_SIZE {
            return (None, 0);
        }

        if buf[0..2] != self.marker {
            return (None, 1);
        }

        let length = usize::from(u16::from_le_bytes([buf[3], buf[4]]));
        let total = MIN_FRAME_SIZE + length;
        if buf.len() < total {
            return (None, 0);
        }

        let crc_at = HEADER_SIZE + length;
        let expected = u16::from_le_bytes([buf[crc_at], buf[crc_at + 1]]);
        if crc16(&buf[2..crc_at]) != expected {
            return (None, 2);
        }

        let ctrl = buf[2];
        let frame = Frame {
            sequence: u16::from_le_bytes([buf[5], buf[6]]),
            command_id: buf[7],
            payload: Bytes::copy_from_slice(&buf[HEADER_SIZE..crc_at]),
            needs_ack: ctrl & CTRL_NEEDS_ACK != 0,
            is_ack: ctrl & CTRL_IS_ACK != 0,
        };
        (Some(frame), total)
    }
}

/// Encode with the default marker.
pub fn encode_frame(frame: &Frame, dst: &mut BytesMut) -> Result<()> {
    PacketCodec::default().encode_to(frame, dst)
}

/// Decode with the default marker. See [`PacketCodec::decode`].
pub fn decode_frame(buf: &[u8]) -> (Option<Frame>, usize) {
    PacketCodec::default().decode(buf)
}

/// Configuration for the frame layer.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Frame marker. Default: `0x6655`.
    pub marker: u16,
    /// Maximum outbound payload size in bytes. Default: 65535.
    pub max_payload_size: usize,
    /// Bound on buffered inbound bytes before the buffer is reset.
    pub max_buffer_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            marker: MARKER,
            max_payload_size: MAX_PAYLOAD,
            max_buffer_size: DEFAULT_MAX_BUFFER,
        }
    }
}

impl FrameConfig {
    pub fn codec(&self) -> PacketCodec {
        PacketCodec::new(self.marker)
    }
}
