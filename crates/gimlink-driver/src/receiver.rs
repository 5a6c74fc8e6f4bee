use std::sync::Arc;

use gimlink_frame::{FrameConfig, FrameReader, MAX_FRAME_SIZE};
use gimlink_transport::{LinkReader, TransportError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::correlator::Correlator;

/// Spawn the task that drains the link into the correlator.
///
/// Frames are dispatched in arrival order. When the link fails the task
/// detaches the correlator (failing pending commands) and cancels `session`,
/// which stops the heartbeat too. Refused datagrams only count as errors.
pub(crate) fn spawn_receiver(
    reader: LinkReader,
    correlator: Arc<Correlator>,
    frame: &FrameConfig,
    chunk_size: usize,
    session: CancellationToken,
) -> JoinHandle<()> {
    let frames = FrameReader::with_config(frame);
    tokio::spawn(receive_loop(reader, correlator, frames, chunk_size, session))
}

async fn receive_loop(
    mut reader: LinkReader,
    correlator: Arc<Correlator>,
    mut frames: FrameReader,
    chunk_size: usize,
    session: CancellationToken,
) {
    // A datagram larger than the buffer is silently truncated by the OS.
    let datagram = reader.is_datagram();
    let chunk_size = if datagram {
        chunk_size.max(MAX_FRAME_SIZE)
    } else {
        chunk_size.max(1)
    };
    let mut chunk = vec![0u8; chunk_size];

    loop {
        let read = tokio::select! {
            _ = session.cancelled() => {
                debug!("receiver stopped");
                return;
            }
            read = reader.recv(&mut chunk) => read,
        };

        let n = match read {
            Ok(n) => n,
            Err(err) if err.is_transient() => {
                warn!(error = %err, "datagram refused, link kept");
                correlator.state().record_error();
                continue;
            }
            Err(err) => {
                match err {
                    TransportError::Closed => info!("link closed by peer"),
                    ref other => error!(error = %other, "link read failed"),
                }
                correlator.state().record_error();
                correlator.detach().await;
                session.cancel();
                return;
            }
        };

        if let Err(err) = frames.push(&chunk[..n]) {
            warn!(error = %err, "inbound buffer reset");
            correlator.state().record_error();
        }
        for frame in frames.drain() {
            correlator.on_frame(frame);
        }
        // Datagrams are self-delimited: leftovers can never be completed.
        if datagram && frames.buffered() > 0 {
            let dropped = frames.clear();
            debug!(dropped, "discarded partial frame at end of datagram");
        }
    }
}
