//! Protocol driver for serial/UDP camera gimbals.
//!
//! # Crate Structure
//!
//! - [`transport`] — Serial and UDP links, endpoint parsing, port listing
//! - [`frame`] — Wire framing: CRC-16, encode/decode, resynchronizing reader
//! - [`driver`] — Command/ACK correlation, retries, heartbeat, device state

/// Re-export transport types.
pub mod transport {
    pub use gimlink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use gimlink_frame::*;
}

/// Re-export driver types.
pub mod driver {
    pub use gimlink_driver::*;
}
