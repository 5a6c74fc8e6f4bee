use std::time::Duration;

use clap::{Args, Subcommand};
use gimlink_driver::{CommandTable, DriverConfig, GimbalDriver};
use gimlink_transport::Endpoint;

use crate::exit::{driver_error, transport_error, CliError, CliResult, INTERNAL};
use crate::output::OutputFormat;

pub mod decode;
pub mod encode;
pub mod monitor;
pub mod ports;
pub mod probe;
pub mod send;
pub mod version;

/// Settings shared by every subcommand.
pub struct Context {
    pub format: OutputFormat,
    pub commands: CommandTable,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List serial ports.
    Ports(PortsArgs),
    /// Connect and send one heartbeat query.
    Probe(ProbeArgs),
    /// Send one command and wait for its ACK.
    Send(SendArgs),
    /// Connect and print device state until interrupted.
    Monitor(MonitorArgs),
    /// Encode a frame without sending it.
    Encode(EncodeArgs),
    /// Decode frames from hex bytes.
    Decode(DecodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, ctx: &Context) -> CliResult<i32> {
    match command {
        Command::Ports(args) => ports::run(args, ctx),
        Command::Probe(args) => probe::run(args, ctx),
        Command::Send(args) => send::run(args, ctx),
        Command::Monitor(args) => monitor::run(args, ctx),
        Command::Encode(args) => encode::run(args, ctx),
        Command::Decode(args) => decode::run(args, ctx),
        Command::Version(args) => version::run(args, ctx),
    }
}

#[derive(Args, Debug)]
pub struct PortsArgs {}

#[derive(Args, Debug)]
pub struct ProbeArgs {
    /// Endpoint (e.g. /dev/ttyUSB0, serial:/dev/ttyUSB0@115200, udp:192.168.144.25:37260).
    pub endpoint: String,
    /// ACK wait per attempt (e.g. 500ms, 1s).
    #[arg(long, default_value = "1s")]
    pub timeout: String,
    /// Retransmissions after the first attempt.
    #[arg(long, default_value = "2")]
    pub retries: u32,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Endpoint to connect to.
    pub endpoint: String,
    /// Command name from the command table, or a numeric id (decimal or 0x hex).
    #[arg(long)]
    pub cmd: String,
    /// Payload as hex (e.g. "14" or "01 02 ff").
    #[arg(long, default_value = "")]
    pub data: String,
    /// Send without requesting an ACK.
    #[arg(long)]
    pub no_ack: bool,
    /// ACK wait per attempt (e.g. 500ms, 1s).
    #[arg(long, default_value = "1s")]
    pub timeout: String,
    /// Retransmissions after the first attempt.
    #[arg(long, default_value = "3")]
    pub retries: u32,
}

#[derive(Args, Debug)]
pub struct MonitorArgs {
    /// Endpoint to connect to.
    pub endpoint: String,
    /// Time between printed snapshots (e.g. 200ms, 1s).
    #[arg(long, default_value = "1s")]
    pub interval: String,
    /// Exit after N snapshots.
    #[arg(long)]
    pub count: Option<usize>,
    /// Do not send keepalive probes.
    #[arg(long)]
    pub no_heartbeat: bool,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Sequence number.
    #[arg(long, default_value = "1")]
    pub seq: u16,
    /// Command name or numeric id.
    #[arg(long)]
    pub cmd: String,
    /// Payload as hex.
    #[arg(long, default_value = "")]
    pub data: String,
    /// Set the needs-ACK flag.
    #[arg(long)]
    pub need_ack: bool,
    /// Set the is-ACK flag.
    #[arg(long)]
    pub ack: bool,
    /// Write the encoded bytes to stdout instead of formatted output.
    #[arg(long)]
    pub raw: bool,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Hex bytes; whitespace, ':' and a leading 0x are ignored.
    pub hex: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn parse_endpoint(input: &str) -> CliResult<Endpoint> {
    input
        .parse()
        .map_err(|err| transport_error("invalid endpoint", err))
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::usage("duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::usage(format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::usage("duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

pub(crate) fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let trimmed = input.trim();
    let trimmed = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let digits: String = trimmed
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .collect();
    hex::decode(&digits).map_err(|err| CliError::usage(format!("invalid hex '{input}': {err}")))
}

/// Build a driver from the shared context and connect it.
pub(crate) async fn connect(
    ctx: &Context,
    endpoint: &Endpoint,
    configure: impl FnOnce(&mut DriverConfig),
) -> CliResult<GimbalDriver> {
    let mut config = DriverConfig {
        commands: ctx.commands.clone(),
        ..DriverConfig::default()
    };
    configure(&mut config);

    let driver = GimbalDriver::new(config);
    driver
        .connect(endpoint)
        .await
        .map_err(|err| driver_error("connect failed", err))?;
    Ok(driver)
}

pub(crate) fn runtime() -> CliResult<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| CliError::new(INTERNAL, format!("failed to start runtime: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn parse_hex_forms() {
        assert_eq!(parse_hex("").unwrap(), Vec::<u8>::new());
        assert_eq!(parse_hex("0x5566").unwrap(), vec![0x55, 0x66]);
        assert_eq!(parse_hex("55 66 01").unwrap(), vec![0x55, 0x66, 0x01]);
        assert_eq!(parse_hex("aa:BB").unwrap(), vec![0xaa, 0xbb]);
        assert!(parse_hex("abc").is_err());
        assert!(parse_hex("zz").is_err());
    }

    #[test]
    fn parse_endpoint_maps_errors_to_usage() {
        assert!(parse_endpoint("udp:127.0.0.1:37260").is_ok());
        let err = parse_endpoint("udp:not-an-address").unwrap_err();
        assert_eq!(err.code, crate::exit::USAGE);
    }
}
