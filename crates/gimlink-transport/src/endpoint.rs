use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TransportError;

/// Default serial baud rate.
pub const DEFAULT_BAUD: u32 = 115_200;

/// Default UDP control port of the gimbal.
pub const DEFAULT_UDP_PORT: u16 = 37260;

/// Factory address of the gimbal on its UDP network.
pub const DEFAULT_UDP_HOST: Ipv4Addr = Ipv4Addr::new(192, 168, 144, 25);

/// Where and how to reach the device.
///
/// Supplied at connect time and not retained beyond the session.
///
/// Accepted string forms:
/// - `serial:/dev/ttyUSB0` or `serial:/dev/ttyUSB0@57600`
/// - `udp:192.168.144.25:37260` or `udp:192.168.144.25` (default port)
/// - a bare path (`/dev/ttyACM0`, `COM3`) is taken as a serial port
/// - a bare `ip:port` is taken as UDP
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Endpoint {
    Serial {
        path: String,
        baud: u32,
    },
    Udp {
        remote: SocketAddr,
        /// Local bind address. Unspecified address and ephemeral port if `None`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        local: Option<SocketAddr>,
    },
}

impl Endpoint {
    /// Serial endpoint with the default baud rate.
    pub fn serial(path: impl Into<String>) -> Self {
        Self::Serial {
            path: path.into(),
            baud: DEFAULT_BAUD,
        }
    }

    /// UDP endpoint with an ephemeral local port.
    pub fn udp(remote: SocketAddr) -> Self {
        Self::Udp {
            remote,
            local: None,
        }
    }

    /// The factory-default UDP endpoint.
    pub fn default_udp() -> Self {
        Self::udp(SocketAddr::new(IpAddr::V4(DEFAULT_UDP_HOST), DEFAULT_UDP_PORT))
    }

    /// Short transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        match self {
            Self::Serial { .. } => "serial",
            Self::Udp { .. } => "udp",
        }
    }

    /// Whether frames arrive as self-delimited datagrams.
    pub fn is_datagram(&self) -> bool {
        matches!(self, Self::Udp { .. })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serial { path, baud } => write!(f, "serial:{path}@{baud}"),
            Self::Udp { remote, .. } => write!(f, "udp:{remote}"),
        }
    }
}

impl FromStr for Endpoint {
    type Err = TransportError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(invalid(input, "endpoint must not be empty"));
        }

        if let Some(rest) = trimmed.strip_prefix("serial:") {
            return parse_serial(input, rest);
        }
        if let Some(rest) = trimmed.strip_prefix("udp:") {
            return parse_udp(input, rest);
        }

        if let Ok(remote) = trimmed.parse::<SocketAddr>() {
            return Ok(Self::udp(remote));
        }
        parse_serial(input, trimmed)
    }
}

fn parse_serial(input: &str, rest: &str) -> Result<Endpoint, TransportError> {
    let (path, baud) = match rest.rsplit_once('@') {
        Some((path, baud)) => {
            let baud = baud
                .parse::<u32>()
                .map_err(|_| invalid(input, format!("invalid baud rate '{baud}'")))?;
            if baud == 0 {
                return Err(invalid(input, "baud rate must be greater than zero"));
            }
            (path, baud)
        }
        None => (rest, DEFAULT_BAUD),
    };

    if path.is_empty() {
        return Err(invalid(input, "serial path must not be empty"));
    }

    Ok(Endpoint::Serial {
        path: path.to_string(),
        baud,
    })
}

fn parse_udp(input: &str, rest: &str) -> Result<Endpoint, TransportError> {
    if let Ok(remote) = rest.parse::<SocketAddr>() {
        return Ok(Endpoint::udp(remote));
    }
    let ip = rest
        .parse::<IpAddr>()
        .map_err(|_| invalid(input, format!("invalid UDP address '{rest}'")))?;
    Ok(Endpoint::udp(SocketAddr::new(ip, DEFAULT_UDP_PORT)))
}

fn invalid(input: &str, reason: impl Into<String>) -> TransportError {
    TransportError::InvalidEndpoint {
        input: input.to_string(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_prefixed_serial_with_baud() {
        let ep: Endpoint = "serial:/dev/ttyUSB0@57600".parse().unwrap();
        assert_eq!(
            ep,
            Endpoint::Serial {
                path: "/dev/ttyUSB0".to_string(),
                baud: 57600
            }
        );
    }

    #[test]
    fn bare_path_defaults_to_serial() {
        let ep: Endpoint = "/dev/ttyACM0".parse().unwrap();
        assert_eq!(ep, Endpoint::serial("/dev/ttyACM0"));

        let ep: Endpoint = "COM3".parse().unwrap();
        assert_eq!(ep, Endpoint::serial("COM3"));
    }

    #[test]
    fn parses_udp_with_and_without_port() {
        let ep: Endpoint = "udp:10.0.0.2:9000".parse().unwrap();
        assert_eq!(ep, Endpoint::udp("10.0.0.2:9000".parse().unwrap()));

        let ep: Endpoint = "udp:192.168.144.25".parse().unwrap();
        assert_eq!(ep, Endpoint::default_udp());
    }

    #[test]
    fn bare_socket_addr_is_udp() {
        let ep: Endpoint = "127.0.0.1:37260".parse().unwrap();
        assert!(ep.is_datagram());
        assert_eq!(ep.transport_name(), "udp");
    }

    #[test]
    fn rejects_bad_inputs() {
        assert!(matches!(
            "".parse::<Endpoint>(),
            Err(TransportError::InvalidEndpoint { .. })
        ));
        assert!("serial:/dev/ttyUSB0@fast".parse::<Endpoint>().is_err());
        assert!("serial:/dev/ttyUSB0@0".parse::<Endpoint>().is_err());
        assert!("serial:@9600".parse::<Endpoint>().is_err());
        assert!("udp:not-an-ip".parse::<Endpoint>().is_err());
    }

    #[test]
    fn display_round_trips_through_parse() {
        for input in ["serial:/dev/ttyUSB1@9600", "udp:127.0.0.1:4000"] {
            let ep: Endpoint = input.parse().unwrap();
            assert_eq!(ep.to_string(), input);
            assert_eq!(ep.to_string().parse::<Endpoint>().unwrap(), ep);
        }
    }
}
