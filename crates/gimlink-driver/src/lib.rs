//! Gimbal protocol driver.
//!
//! Sits on top of [`gimlink_transport`] and [`gimlink_frame`] and provides:
//! - sequence-numbered commands with ACK correlation, per-attempt timeout and
//!   retry ([`Correlator`], [`SendRequest`], [`SendOutcome`])
//! - a keepalive probe while connected ([`HeartbeatMonitor`])
//! - device status derived from ACKs and unsolicited reports
//!   ([`DeviceState`], [`StateDecoder`])
//!
//! [`GimbalDriver`] ties these together around one link:
//!
//! ```no_run
//! use gimlink_driver::{DriverConfig, GimbalDriver};
//! use gimlink_transport::Endpoint;
//!
//! # async fn run() -> gimlink_driver::Result<()> {
//! let driver = GimbalDriver::new(DriverConfig::default());
//! driver.connect(&"udp:192.168.144.25:37260".parse()?).await?;
//! let outcome = driver.send_named("center", Vec::new()).await?;
//! println!("{} {:?}", outcome.as_str(), driver.current_state());
//! driver.disconnect().await;
//! # Ok(())
//! # }
//! ```

pub mod commands;
pub mod config;
pub mod correlator;
pub mod decoders;
pub mod driver;
pub mod error;
pub mod heartbeat;
pub mod pending;
mod receiver;
pub mod sequence;
pub mod state;

pub use commands::{CommandSpec, CommandTable};
pub use config::{DriverConfig, HeartbeatConfig};
pub use correlator::{Correlator, SendOutcome, SendRequest};
pub use decoders::{AttitudeDecoder, DecoderRegistry, StateDecoder, StatusDecoder};
pub use driver::GimbalDriver;
pub use error::{DriverError, Result};
pub use heartbeat::HeartbeatMonitor;
pub use pending::PendingTable;
pub use sequence::SequenceAllocator;
pub use state::{DeviceState, RecordState, SharedState, ZoomState};
