//! Command/ACK correlation.
//!
//! Every outbound command gets a fresh sequence number. Commands that need an
//! ACK register a waiter in the [`PendingTable`] *before* the bytes hit the
//! link, so a reply that races the write is never lost. The receive loop feeds
//! inbound frames to [`Correlator::on_frame`], which either completes a waiter
//! or hands the frame to the state decoders.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use bytes::Bytes;
use gimlink_frame::{Frame, FrameConfig, FrameError, PacketCodec};
use gimlink_transport::{LinkWriter, TransportError};
use tokio::sync::Mutex;
use tracing::{debug, trace, warn};

use crate::commands::CommandSpec;
use crate::config::{DEFAULT_ACK_TIMEOUT, DEFAULT_MAX_RETRIES};
use crate::decoders::DecoderRegistry;
use crate::pending::PendingTable;
use crate::sequence::SequenceAllocator;
use crate::state::SharedState;

/// One command to deliver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendRequest {
    pub command_id: u8,
    pub payload: Bytes,
    pub needs_ack: bool,
    /// ACK wait per attempt.
    pub timeout: Duration,
    /// Retransmissions after the first attempt.
    pub max_retries: u32,
}

impl SendRequest {
    /// A request that needs an ACK, with default timeout and retries.
    pub fn new(command_id: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            command_id,
            payload: payload.into(),
            needs_ack: true,
            timeout: DEFAULT_ACK_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// A request using the table entry's id and ACK flag.
    pub fn from_spec(spec: CommandSpec, payload: impl Into<Bytes>) -> Self {
        Self::new(spec.id, payload).with_needs_ack(spec.needs_ack)
    }

    pub fn with_needs_ack(mut self, needs_ack: bool) -> Self {
        self.needs_ack = needs_ack;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// How a [`SendRequest`] ended.
#[derive(Debug)]
pub enum SendOutcome {
    /// Written without requesting an ACK.
    Sent { sequence: u16 },
    /// The device acknowledged the attempt carrying `sequence`.
    Acknowledged {
        sequence: u16,
        attempts: u32,
        reply: Frame,
    },
    /// Every attempt timed out.
    Exhausted { attempts: u32 },
    /// Writing to the link failed; no further attempts were made.
    TransportFailed {
        sequence: u16,
        attempts: u32,
        error: TransportError,
    },
    /// No link was open when an attempt was due.
    NotConnected,
    /// The link went away while waiting for the ACK.
    Disconnected { sequence: u16 },
    /// The request cannot be framed.
    Invalid(FrameError),
}

impl SendOutcome {
    /// `true` for [`Sent`](Self::Sent) and [`Acknowledged`](Self::Acknowledged).
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Sent { .. } | Self::Acknowledged { .. })
    }

    /// The ACK frame, if one was received.
    pub fn reply(&self) -> Option<&Frame> {
        match self {
            Self::Acknowledged { reply, .. } => Some(reply),
            _ => None,
        }
    }

    /// Attempts made before the outcome was decided.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Sent { .. } | Self::Disconnected { .. } => 1,
            Self::Acknowledged { attempts, .. }
            | Self::Exhausted { attempts }
            | Self::TransportFailed { attempts, .. } => *attempts,
            Self::NotConnected | Self::Invalid(_) => 0,
        }
    }

    /// Short machine-readable label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sent { .. } => "sent",
            Self::Acknowledged { .. } => "acknowledged",
            Self::Exhausted { .. } => "exhausted",
            Self::TransportFailed { .. } => "transport_failed",
            Self::NotConnected => "not_connected",
            Self::Disconnected { .. } => "disconnected",
            Self::Invalid(_) => "invalid",
        }
    }
}

/// Shared core used by the driver, the receive loop and the heartbeat.
#[derive(Debug)]
pub struct Correlator {
    codec: PacketCodec,
    max_payload_size: usize,
    sequence: SequenceAllocator,
    pending: PendingTable,
    state: Arc<SharedState>,
    decoders: DecoderRegistry,
    writer: Mutex<Option<LinkWriter>>,
}

impl Correlator {
    pub fn new(frame: &FrameConfig, decoders: DecoderRegistry, state: Arc<SharedState>) -> Self {
        Self {
            codec: frame.codec(),
            max_payload_size: frame.max_payload_size,
            sequence: SequenceAllocator::new(),
            pending: PendingTable::new(),
            state,
            decoders,
            writer: Mutex::new(None),
        }
    }

    pub fn state(&self) -> &Arc<SharedState> {
        &self.state
    }

    pub fn pending(&self) -> &PendingTable {
        &self.pending
    }

    /// Install the outbound half of a freshly opened link.
    pub async fn attach_writer(&self, writer: LinkWriter) {
        *self.writer.lock().await = Some(writer);
    }

    /// Drop the link, fail every pending command and mark the device offline.
    pub async fn detach(&self) {
        let writer = self.writer.lock().await.take();
        if let Some(mut writer) = writer {
            if let Err(err) = writer.close().await {
                debug!(error = %err, "error closing link writer");
            }
        }
        let failed = self.pending.fail_all();
        if failed > 0 {
            debug!(failed, "failed pending commands on disconnect");
        }
        self.state.mark_disconnected();
    }

    /// Deliver one command, retrying on ACK timeout.
    ///
    /// Each attempt uses a new sequence number. Requests with
    /// `needs_ack == false` return right after the write.
    pub async fn send(&self, request: &SendRequest) -> SendOutcome {
        if request.payload.len() > self.max_payload_size {
            return SendOutcome::Invalid(FrameError::PayloadTooLarge {
                size: request.payload.len(),
                max: self.max_payload_size,
            });
        }

        if !request.needs_ack {
            let sequence = self.sequence.next();
            let frame = Frame::new(sequence, request.command_id, request.payload.clone());
            return match self.transmit(&frame).await {
                Ok(()) => SendOutcome::Sent { sequence },
                Err(failure) => failure.into_outcome(sequence, 1),
            };
        }

        let attempts = request.max_retries.saturating_add(1);
        for attempt in 1..=attempts {
            let sequence = self.sequence.next();
            let frame = Frame::new(sequence, request.command_id, request.payload.clone())
                .with_needs_ack(true);

            let waiter = self.pending.register(sequence);
            let _slot = PendingSlot {
                pending: &self.pending,
                sequence,
            };
            if let Err(failure) = self.transmit(&frame).await {
                return failure.into_outcome(sequence, attempt);
            }

            match tokio::time::timeout(request.timeout, waiter).await {
                Ok(Ok(reply)) => {
                    trace!(seq = sequence, cmd = request.command_id, attempt, "acknowledged");
                    return SendOutcome::Acknowledged {
                        sequence,
                        attempts: attempt,
                        reply,
                    };
                }
                Ok(Err(_)) => {
                    debug!(seq = sequence, cmd = request.command_id, "link lost while awaiting ack");
                    return SendOutcome::Disconnected { sequence };
                }
                Err(_) => {
                    self.state.record_retry();
                    warn!(
                        seq = sequence,
                        cmd = request.command_id,
                        attempt,
                        max_attempts = attempts,
                        "ack timeout"
                    );
                }
            }
        }

        SendOutcome::Exhausted { attempts }
    }

    /// Boolean form of [`send`](Self::send).
    pub async fn send_cmd(
        &self,
        command_id: u8,
        payload: impl Into<Bytes>,
        needs_ack: bool,
        timeout: Duration,
        max_retries: u32,
    ) -> bool {
        let request = SendRequest::new(command_id, payload)
            .with_needs_ack(needs_ack)
            .with_timeout(timeout)
            .with_max_retries(max_retries);
        self.send(&request).await.is_success()
    }

    /// Route one inbound frame.
    pub fn on_frame(&self, frame: Frame) {
        if frame.is_ack {
            let sequence = frame.sequence;
            if self.pending.resolve(frame) {
                self.state.record_ack(SystemTime::now());
                trace!(seq = sequence, "ack matched");
            } else {
                debug!(seq = sequence, "discarding unmatched ack");
            }
            return;
        }

        let handled = self
            .state
            .update(|state| self.decoders.apply(&frame, state));
        if !handled {
            trace!(cmd = frame.command_id, len = frame.payload.len(), "ignoring unsolicited frame");
        }
    }

    async fn transmit(&self, frame: &Frame) -> Result<(), Failure> {
        let wire = self.codec.encode(frame).map_err(Failure::Frame)?;

        let mut slot = self.writer.lock().await;
        let writer = slot.as_mut().ok_or(Failure::NotConnected)?;
        if let Err(err) = writer.send(&wire).await {
            self.state.record_error();
            if err.is_transient() {
                // Counts as a lost datagram; the ACK wait decides what happens next.
                warn!(seq = frame.sequence, cmd = frame.command_id, error = %err, "datagram refused");
                return Ok(());
            }
            warn!(seq = frame.sequence, cmd = frame.command_id, error = %err, "link write failed");
            return Err(Failure::Transport(err));
        }
        trace!(seq = frame.sequence, cmd = frame.command_id, len = wire.len(), "frame sent");
        Ok(())
    }
}

/// Removes a pending entry when its attempt ends, including when the
/// `send` future is dropped mid-wait.
struct PendingSlot<'a> {
    pending: &'a PendingTable,
    sequence: u16,
}

impl Drop for PendingSlot<'_> {
    fn drop(&mut self) {
        self.pending.remove(self.sequence);
    }
}

enum Failure {
    Frame(FrameError),
    NotConnected,
    Transport(TransportError),
}

impl Failure {
    fn into_outcome(self, sequence: u16, attempts: u32) -> SendOutcome {
        match self {
            Self::Frame(err) => SendOutcome::Invalid(err),
            Self::NotConnected => SendOutcome::NotConnected,
            Self::Transport(error) => SendOutcome::TransportFailed {
                sequence,
                attempts,
                error,
            },
        }
    }
}
