use std::net::SocketAddr;

/// Errors that can occur in link operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to open a serial port.
    #[error("failed to open serial port {path}: {source}")]
    Open {
        path: String,
        source: std::io::Error,
    },

    /// Failed to bind the local UDP socket.
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// Failed to connect the UDP socket to the remote address.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// The endpoint string could not be parsed.
    #[error("invalid endpoint '{input}': {reason}")]
    InvalidEndpoint { input: String, reason: String },

    /// Serial port enumeration failed.
    #[error("failed to enumerate serial ports: {0}")]
    PortList(std::io::Error),

    /// An I/O error occurred on an open link.
    #[error("link I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A datagram write sent fewer bytes than the frame holds.
    #[error("short datagram write ({written} of {expected} bytes)")]
    ShortWrite { written: usize, expected: usize },

    /// A datagram was refused by the remote host (ICMP unreachable).
    ///
    /// The socket stays usable; the device may simply not be listening yet.
    #[error("datagram refused by peer: {0}")]
    Unreachable(std::io::Error),

    /// The remote side closed the link.
    #[error("link closed")]
    Closed,
}

impl TransportError {
    /// Whether the link is still usable after this error.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unreachable(_))
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    #[test]
    fn only_refused_datagrams_are_transient() {
        let refused = TransportError::Unreachable(io::ErrorKind::ConnectionRefused.into());
        assert!(refused.is_transient());
        assert!(!TransportError::Closed.is_transient());
        assert!(!TransportError::Io(io::Error::other("boom")).is_transient());
    }
}
