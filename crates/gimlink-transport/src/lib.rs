//! Link layer for gimbal control.
//!
//! Provides one interface over the two ways a gimbal is reached:
//! - a serial port (continuous byte stream)
//! - a UDP socket (one frame per datagram)
//!
//! This is the lowest layer of gimlink. Everything else builds on top of
//! the [`Link`] type provided here.

pub mod endpoint;
pub mod error;
pub mod link;
pub mod serial;

pub use endpoint::{Endpoint, DEFAULT_BAUD, DEFAULT_UDP_HOST, DEFAULT_UDP_PORT};
pub use error::{Result, TransportError};
pub use link::{Link, LinkReader, LinkWriter, StreamIo};
pub use serial::{available_ports, PortInfo};
