use serde::Serialize;
use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, SerialPortType, SerialStream, StopBits};
use tracing::debug;

use crate::error::{Result, TransportError};

/// A serial endpoint discovered on this host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortInfo {
    /// Device path or port name (`/dev/ttyUSB0`, `COM3`).
    pub path: String,
    /// Port kind: `usb`, `pci`, `bluetooth` or `unknown`.
    pub kind: &'static str,
    /// USB product string, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// List the serial ports available for connecting.
pub fn available_ports() -> Result<Vec<PortInfo>> {
    let ports = tokio_serial::available_ports()
        .map_err(|err| TransportError::PortList(std::io::Error::from(err)))?;
    debug!(count = ports.len(), "enumerated serial ports");

    Ok(ports
        .into_iter()
        .map(|port| {
            let (kind, description) = match port.port_type {
                SerialPortType::UsbPort(usb) => ("usb", usb.product),
                SerialPortType::PciPort => ("pci", None),
                SerialPortType::BluetoothPort => ("bluetooth", None),
                SerialPortType::Unknown => ("unknown", None),
            };
            PortInfo {
                path: port.port_name,
                kind,
                description,
            }
        })
        .collect())
}

/// Open `path` at `baud`, 8N1, no flow control.
pub(crate) fn open(path: &str, baud: u32) -> Result<SerialStream> {
    tokio_serial::new(path, baud)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .open_native_async()
        .map_err(|err| TransportError::Open {
            path: path.to_string(),
            source: std::io::Error::from(err),
        })
}
