//! Serial port discovery and opening.
//!
//! Requires the `serial` feature.
//!
//! Ports are reported as `ASRL<port>::INSTR` addresses so they can be handed
//! straight to [`crate::session::open_session`].

use crate::error::{SmuError, SmuResult};
use crate::session::{Address, Discovery};
use serialport::SerialPortType;
use tracing::debug;

/// One serial port as reported by the operating system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortListing {
    /// Session address, e.g. `ASRL/dev/ttyUSB0::INSTR`
    pub address: String,
    /// Human-readable description (USB vendor/product when known)
    pub description: String,
}

/// Discovery over the serial ports present on this machine.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialDiscovery;

impl SerialDiscovery {
    /// Enumerate ports with descriptions, for listing to a user.
    pub fn list_ports(&self) -> SmuResult<Vec<PortListing>> {
        let ports = serialport::available_ports().map_err(|e| {
            SmuError::Communication(format!("failed to enumerate serial ports: {}", e))
        })?;

        let listings: Vec<PortListing> = ports
            .into_iter()
            .map(|info| {
                let description = match &info.port_type {
                    SerialPortType::UsbPort(usb) => format!(
                        "USB {:04x}:{:04x} {} {}",
                        usb.vid,
                        usb.pid,
                        usb.manufacturer.as_deref().unwrap_or(""),
                        usb.product.as_deref().unwrap_or("")
                    )
                    .trim_end()
                    .to_string(),
                    SerialPortType::PciPort => "PCI".to_string(),
                    SerialPortType::BluetoothPort => "Bluetooth".to_string(),
                    SerialPortType::Unknown => "Unknown".to_string(),
                };
                PortListing {
                    address: Address::Serial {
                        path: info.port_name,
                    }
                    .to_string(),
                    description,
                }
            })
            .collect();

        debug!(count = listings.len(), "enumerated serial ports");
        Ok(listings)
    }
}

impl Discovery for SerialDiscovery {
    fn list_addresses(&self) -> SmuResult<Vec<String>> {
        Ok(self
            .list_ports()?
            .into_iter()
            .map(|listing| listing.address)
            .collect())
    }
}

/// Open a serial port with 8N1 framing and no flow control.
///
/// Opening runs on the blocking pool so a slow driver does not stall the
/// runtime.
pub async fn open_serial_async(
    port_path: &str,
    baud_rate: u32,
) -> SmuResult<tokio_serial::SerialStream> {
    use tokio::task::spawn_blocking;
    use tokio_serial::SerialPortBuilderExt;

    let port_path_owned = port_path.to_string();

    spawn_blocking(move || {
        tokio_serial::new(&port_path_owned, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| {
                SmuError::Communication(format!(
                    "failed to open serial port {}: {}",
                    port_path_owned, e
                ))
            })
    })
    .await
    .map_err(|e| {
        SmuError::Communication(format!("spawn_blocking for serial port opening failed: {}", e))
    })?
}
