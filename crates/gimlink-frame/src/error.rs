/// Errors that can occur during frame encoding and buffering.
///
/// Corrupt input is never an error: the decoder resynchronizes past it.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload exceeds what the length field (or configuration) allows.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The receive buffer grew past its bound and was reset.
    #[error("receive buffer overflow ({size} bytes, max {max}); buffer reset")]
    BufferOverflow { size: usize, max: usize },

    /// An I/O error occurred while writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The sink accepted zero bytes.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
