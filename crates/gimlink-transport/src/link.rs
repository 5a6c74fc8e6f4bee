use std::fmt;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream, ReadHalf, WriteHalf};
use tokio::net::UdpSocket;
use tracing::{debug, info};

use crate::endpoint::Endpoint;
use crate::error::{Result, TransportError};
use crate::serial;

/// Byte-stream transports usable as a link.
pub trait StreamIo: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> StreamIo for T {}

/// An open bidirectional channel to the device.
///
/// Serial ports and in-memory pipes are continuous byte streams; UDP links
/// carry exactly one frame per datagram. Both are consumed the same way by
/// splitting into a [`LinkReader`] and a [`LinkWriter`].
pub struct Link {
    inner: LinkInner,
    label: String,
}

enum LinkInner {
    Stream(Box<dyn StreamIo>),
    Datagram(UdpSocket),
}

impl Link {
    /// Open the transport described by `endpoint`.
    pub async fn open(endpoint: &Endpoint) -> Result<Self> {
        match endpoint {
            Endpoint::Serial { path, baud } => {
                let stream = serial::open(path, *baud)?;
                info!(%path, baud, "opened serial link");
                Ok(Self {
                    inner: LinkInner::Stream(Box::new(stream)),
                    label: endpoint.to_string(),
                })
            }
            Endpoint::Udp { remote, local } => {
                let local = local.unwrap_or_else(|| unspecified_for(remote));
                let socket = UdpSocket::bind(local)
                    .await
                    .map_err(|source| TransportError::Bind {
                        addr: local,
                        source,
                    })?;
                socket
                    .connect(remote)
                    .await
                    .map_err(|source| TransportError::Connect {
                        addr: *remote,
                        source,
                    })?;
                info!(%remote, %local, "opened udp link");
                Ok(Self {
                    inner: LinkInner::Datagram(socket),
                    label: endpoint.to_string(),
                })
            }
        }
    }

    /// Wrap any async byte stream (e.g. a PTY or TCP bridge) as a link.
    pub fn from_stream(stream: impl StreamIo + 'static, label: impl Into<String>) -> Self {
        Self {
            inner: LinkInner::Stream(Box::new(stream)),
            label: label.into(),
        }
    }

    /// Wrap an already connected UDP socket as a datagram link.
    pub fn from_udp(socket: UdpSocket, label: impl Into<String>) -> Self {
        Self {
            inner: LinkInner::Datagram(socket),
            label: label.into(),
        }
    }

    /// Create an in-memory link. The returned stream is the device side.
    pub fn memory(capacity: usize) -> (Self, DuplexStream) {
        let (near, far) = tokio::io::duplex(capacity);
        (Self::from_stream(near, "memory"), far)
    }

    /// Human-readable description of where this link goes.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Whether inbound data arrives as whole datagrams.
    pub fn is_datagram(&self) -> bool {
        matches!(self.inner, LinkInner::Datagram(_))
    }

    /// Split into independently owned read and write halves.
    pub fn into_split(self) -> (LinkReader, LinkWriter) {
        match self.inner {
            LinkInner::Stream(stream) => {
                let (read, write) = tokio::io::split(stream);
                (
                    LinkReader {
                        inner: ReaderInner::Stream(read),
                    },
                    LinkWriter {
                        inner: WriterInner::Stream(write),
                        label: self.label,
                    },
                )
            }
            LinkInner::Datagram(socket) => {
                let socket = Arc::new(socket);
                (
                    LinkReader {
                        inner: ReaderInner::Datagram(Arc::clone(&socket)),
                    },
                    LinkWriter {
                        inner: WriterInner::Datagram(socket),
                        label: self.label,
                    },
                )
            }
        }
    }
}

impl fmt::Debug for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.inner {
            LinkInner::Stream(_) => "stream",
            LinkInner::Datagram(_) => "datagram",
        };
        f.debug_struct("Link")
            .field("type", &kind)
            .field("label", &self.label)
            .finish()
    }
}

/// Inbound half of a [`Link`].
pub struct LinkReader {
    inner: ReaderInner,
}

enum ReaderInner {
    Stream(ReadHalf<Box<dyn StreamIo>>),
    Datagram(Arc<UdpSocket>),
}

impl LinkReader {
    /// Wait for the next chunk of inbound bytes.
    ///
    /// Stream links return whatever is available; datagram links return one
    /// datagram (truncated to `buf`). End of stream is [`TransportError::Closed`].
    /// A refused datagram is [`TransportError::Unreachable`] and the link stays
    /// open.
    pub async fn recv(&mut self, buf: &mut [u8]) -> Result<usize> {
        match &mut self.inner {
            ReaderInner::Stream(stream) => match stream.read(buf).await? {
                0 => Err(TransportError::Closed),
                n => Ok(n),
            },
            ReaderInner::Datagram(socket) => socket.recv(buf).await.map_err(datagram_error),
        }
    }

    /// Whether each [`recv`](Self::recv) returns exactly one datagram.
    pub fn is_datagram(&self) -> bool {
        matches!(self.inner, ReaderInner::Datagram(_))
    }
}

impl fmt::Debug for LinkReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkReader").finish_non_exhaustive()
    }
}

/// Outbound half of a [`Link`].
pub struct LinkWriter {
    inner: WriterInner,
    label: String,
}

enum WriterInner {
    Stream(WriteHalf<Box<dyn StreamIo>>),
    Datagram(Arc<UdpSocket>),
}

impl LinkWriter {
    /// Write one complete encoded frame.
    pub async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        match &mut self.inner {
            WriterInner::Stream(stream) => {
                stream.write_all(bytes).await?;
                stream.flush().await?;
                Ok(())
            }
            WriterInner::Datagram(socket) => {
                let written = socket.send(bytes).await.map_err(datagram_error)?;
                if written != bytes.len() {
                    return Err(TransportError::ShortWrite {
                        written,
                        expected: bytes.len(),
                    });
                }
                Ok(())
            }
        }
    }

    /// Close the outbound side. Datagram links have nothing to flush.
    pub async fn close(&mut self) -> Result<()> {
        match &mut self.inner {
            WriterInner::Stream(stream) => {
                stream.shutdown().await?;
            }
            WriterInner::Datagram(_) => {}
        }
        debug!(label = %self.label, "link writer closed");
        Ok(())
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl fmt::Debug for LinkWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkWriter")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// Connected UDP sockets report ICMP errors for earlier datagrams on the
/// next call. Those concern one datagram, not the socket.
fn datagram_error(err: io::Error) -> TransportError {
    match err.kind() {
        io::ErrorKind::ConnectionRefused | io::ErrorKind::ConnectionReset => {
            TransportError::Unreachable(err)
        }
        _ => TransportError::Io(err),
    }
}

fn unspecified_for(remote: &SocketAddr) -> SocketAddr {
    match remote {
        SocketAddr::V4(_) => SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
        SocketAddr::V6(_) => SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0)),
    }
}
