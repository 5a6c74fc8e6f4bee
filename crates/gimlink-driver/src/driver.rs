use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use gimlink_transport::{Endpoint, Link};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::commands::{self, CommandTable};
use crate::config::DriverConfig;
use crate::correlator::{Correlator, SendOutcome, SendRequest};
use crate::decoders::DecoderRegistry;
use crate::error::{DriverError, Result};
use crate::heartbeat::HeartbeatMonitor;
use crate::receiver::spawn_receiver;
use crate::state::{DeviceState, SharedState};

/// Tasks and token owned by one open link.
struct Session {
    cancel: CancellationToken,
    receiver: JoinHandle<()>,
    heartbeat: Option<HeartbeatMonitor>,
    label: String,
}

/// Gimbal protocol driver.
///
/// Owns at most one link at a time. While connected, a receive task routes
/// inbound frames and, if enabled, a heartbeat task probes the device.
/// [`DeviceState`] outlives individual connections.
///
/// All methods take `&self`, so one driver can serve concurrent senders.
pub struct GimbalDriver {
    config: DriverConfig,
    correlator: Arc<Correlator>,
    session: Mutex<Option<Session>>,
}

impl GimbalDriver {
    /// Create a disconnected driver with the default decoders for
    /// `config.commands`.
    pub fn new(config: DriverConfig) -> Self {
        let decoders = DecoderRegistry::with_defaults(&config.commands);
        Self::with_decoders(config, decoders)
    }

    /// Create a disconnected driver with a custom decoder registry.
    pub fn with_decoders(config: DriverConfig, decoders: DecoderRegistry) -> Self {
        let state = Arc::new(SharedState::new());
        let correlator = Arc::new(Correlator::new(&config.frame, decoders, state));
        Self {
            config,
            correlator,
            session: Mutex::new(None),
        }
    }

    /// Open `endpoint` and start the session tasks.
    ///
    /// An existing link is disconnected first.
    pub async fn connect(&self, endpoint: &Endpoint) -> Result<()> {
        match Link::open(endpoint).await {
            Ok(link) => self.attach(link).await,
            Err(err) => {
                self.correlator.state().record_error();
                error!(endpoint = %endpoint, error = %err, "connect failed");
                Err(DriverError::Transport(err))
            }
        }
    }

    /// Start a session on an already opened link.
    pub async fn attach(&self, link: Link) -> Result<()> {
        let mut session = self.session.lock().await;
        if let Some(previous) = session.take() {
            self.teardown(previous).await;
        }

        let label = link.label().to_string();
        let (reader, writer) = link.into_split();
        self.correlator.attach_writer(writer).await;
        self.correlator.state().mark_connected();

        let cancel = CancellationToken::new();
        let receiver = spawn_receiver(
            reader,
            Arc::clone(&self.correlator),
            &self.config.frame,
            self.config.read_chunk_size,
            cancel.clone(),
        );
        let heartbeat = match self.heartbeat_probe() {
            Some(probe) if self.config.heartbeat.enabled => Some(HeartbeatMonitor::spawn(
                Arc::clone(&self.correlator),
                probe,
                self.config.heartbeat.interval,
                cancel.child_token(),
            )),
            _ => None,
        };

        info!(link = %label, heartbeat = heartbeat.is_some(), "connected");
        *session = Some(Session {
            cancel,
            receiver,
            heartbeat,
            label,
        });
        Ok(())
    }

    /// Stop the session tasks, close the link and fail pending commands.
    ///
    /// Calling this while disconnected is a no-op apart from clearing the
    /// `connected` flag.
    pub async fn disconnect(&self) {
        let previous = self.session.lock().await.take();
        match previous {
            Some(session) => self.teardown(session).await,
            None => self.correlator.detach().await,
        }
    }

    async fn teardown(&self, session: Session) {
        session.cancel.cancel();
        if let Some(heartbeat) = session.heartbeat {
            heartbeat.stop().await;
        }
        if let Err(err) = session.receiver.await {
            error!(error = %err, "receive task ended abnormally");
        }
        self.correlator.detach().await;
        info!(link = %session.label, "disconnected");
    }

    /// Deliver one command. See [`Correlator::send`].
    pub async fn send(&self, request: &SendRequest) -> SendOutcome {
        self.correlator.send(request).await
    }

    /// Boolean form of [`send`](Self::send): `true` on ACK (or on a
    /// successful write when `needs_ack` is false).
    pub async fn send_cmd(
        &self,
        command_id: u8,
        payload: impl Into<Bytes>,
        needs_ack: bool,
        timeout: Duration,
        max_retries: u32,
    ) -> bool {
        self.correlator
            .send_cmd(command_id, payload, needs_ack, timeout, max_retries)
            .await
    }

    /// Send a command from the command table with the configured timeout and
    /// retry policy.
    pub async fn send_named(&self, name: &str, payload: impl Into<Bytes>) -> Result<SendOutcome> {
        let spec = self
            .config
            .commands
            .get(name)
            .ok_or_else(|| DriverError::UnknownCommand(name.to_string()))?;
        let request = SendRequest::from_spec(spec, payload)
            .with_timeout(self.config.ack_timeout)
            .with_max_retries(self.config.max_retries);
        Ok(self.send(&request).await)
    }

    /// Snapshot of the device state.
    pub fn current_state(&self) -> DeviceState {
        self.correlator.state().snapshot()
    }

    pub fn is_connected(&self) -> bool {
        self.correlator.state().is_connected()
    }

    pub fn commands(&self) -> &CommandTable {
        &self.config.commands
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Commands currently awaiting an ACK.
    pub fn pending_commands(&self) -> usize {
        self.correlator.pending().len()
    }

    fn heartbeat_probe(&self) -> Option<SendRequest> {
        let spec = self.config.commands.get(commands::HEARTBEAT)?;
        Some(
            SendRequest::new(spec.id, Bytes::new())
                .with_timeout(self.config.heartbeat.timeout)
                .with_max_retries(self.config.heartbeat.max_retries),
        )
    }
}

impl Drop for GimbalDriver {
    fn drop(&mut self) {
        // Tasks exit on cancellation; the link closes once they drop it.
        if let Some(session) = self.session.get_mut().take() {
            session.cancel.cancel();
        }
    }
}

impl std::fmt::Debug for GimbalDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GimbalDriver")
            .field("connected", &self.is_connected())
            .field("pending", &self.pending_commands())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HeartbeatConfig;

    fn quiet_config() -> DriverConfig {
        DriverConfig {
            heartbeat: HeartbeatConfig::disabled(),
            ..DriverConfig::default()
        }
    }

    #[tokio::test]
    async fn starts_disconnected() {
        let driver = GimbalDriver::new(quiet_config());
        assert!(!driver.is_connected());
        let outcome = driver.send(&SendRequest::new(0, Bytes::new())).await;
        assert!(matches!(outcome, SendOutcome::NotConnected));
        assert!(
            !driver
                .send_cmd(0, Bytes::new(), false, Duration::from_millis(10), 0)
                .await
        );
    }

    #[tokio::test]
    async fn unknown_named_command() {
        let driver = GimbalDriver::new(quiet_config());
        let err = driver.send_named("warp", Bytes::new()).await.unwrap_err();
        assert!(matches!(err, DriverError::UnknownCommand(name) if name == "warp"));
    }

    #[tokio::test]
    async fn connect_failure_counts_error() {
        let driver = GimbalDriver::new(quiet_config());
        let endpoint = Endpoint::serial("/dev/gimlink-does-not-exist");
        assert!(driver.connect(&endpoint).await.is_err());
        assert!(!driver.is_connected());
        assert_eq!(driver.current_state().error_count, 1);
    }

    #[tokio::test]
    async fn attach_and_disconnect() {
        let driver = GimbalDriver::new(quiet_config());
        let (link, _device) = Link::memory(1024);
        driver.attach(link).await.unwrap();
        assert!(driver.is_connected());

        driver.disconnect().await;
        assert!(!driver.is_connected());
        driver.disconnect().await;
    }

    #[tokio::test]
    async fn attach_replaces_existing_session() {
        let driver = GimbalDriver::new(quiet_config());
        let (first, _dev1) = Link::memory(1024);
        let (second, _dev2) = Link::memory(1024);
        driver.attach(first).await.unwrap();
        driver.attach(second).await.unwrap();
        assert!(driver.is_connected());
    }
}
