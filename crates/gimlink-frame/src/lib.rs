//! Packet framing for the gimbal wire protocol.
//!
//! Every frame carries:
//! - A 2-byte marker (`55 66` by default) for stream synchronization
//! - A control byte (bit0 = needs ACK, bit1 = is ACK)
//! - 2-byte little-endian payload length and sequence number
//! - A 1-byte command id, the payload, and a CRC-16 over control..payload
//!
//! Decoding never fails on bad input: it reports how many bytes to skip,
//! so a corrupted stream always makes forward progress.

pub mod codec;
pub mod crc;
pub mod error;
pub mod reader;
pub mod writer;

pub use codec::{
    decode_frame, encode_frame, Frame, FrameConfig, PacketCodec, CTRL_IS_ACK, CTRL_NEEDS_ACK,
    DEFAULT_MAX_BUFFER, HEADER_SIZE, MARKER, MAX_FRAME_SIZE, MAX_PAYLOAD, MIN_FRAME_SIZE,
};
pub use crc::{crc16, Crc16};
pub use error::{FrameError, Result};
pub use reader::{Drain, FrameReader, ReadEvent};
pub use writer::FrameWriter;
