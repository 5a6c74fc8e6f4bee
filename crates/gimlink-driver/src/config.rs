use std::time::Duration;

use gimlink_frame::FrameConfig;

use crate::commands::CommandTable;

/// Default ACK wait per attempt.
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(1);
/// Default retransmissions after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Default keepalive period.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);
/// Default keepalive ACK wait.
pub const DEFAULT_HEARTBEAT_TIMEOUT: Duration = Duration::from_millis(500);
/// Default size of one link read.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 4 * 1024;

/// Keepalive probe settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatConfig {
    pub enabled: bool,
    pub interval: Duration,
    /// ACK wait for each probe, shorter than for user commands.
    pub timeout: Duration,
    pub max_retries: u32,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: DEFAULT_HEARTBEAT_INTERVAL,
            timeout: DEFAULT_HEARTBEAT_TIMEOUT,
            max_retries: 0,
        }
    }
}

impl HeartbeatConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

/// Driver configuration.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub frame: FrameConfig,
    /// ACK wait per attempt for [`send_named`](crate::GimbalDriver::send_named).
    pub ack_timeout: Duration,
    pub max_retries: u32,
    pub heartbeat: HeartbeatConfig,
    /// Bytes per stream read. Datagram links always read whole datagrams.
    pub read_chunk_size: usize,
    pub commands: CommandTable,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            frame: FrameConfig::default(),
            ack_timeout: DEFAULT_ACK_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            heartbeat: HeartbeatConfig::default(),
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            commands: CommandTable::default(),
        }
    }
}
