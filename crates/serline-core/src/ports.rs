use serialport::{SerialPortInfo, SerialPortType};

pub const UNKNOWN_DEVICE: &str = "unknown device";

/// What the platform tells us about one serial device.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawPortInfo {
    pub name: String,
    pub description: Option<String>,
    pub manufacturer: Option<String>,
}

impl From<SerialPortInfo> for RawPortInfo {
    fn from(info: SerialPortInfo) -> Self {
        let (description, manufacturer) = match info.port_type {
            SerialPortType::UsbPort(usb) => (usb.product, usb.manufacturer),
            SerialPortType::PciPort => (Some("PCI serial port".to_string()), None),
            SerialPortType::BluetoothPort => (Some("Bluetooth serial port".to_string()), None),
            SerialPortType::Unknown => (None, None),
        };
        Self {
            name: info.port_name,
            description,
            manufacturer,
        }
    }
}

/// Name plus display label of an enumerated port. Not a live handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortDescriptor {
    pub name: String,
    pub label: String,
}

impl From<RawPortInfo> for PortDescriptor {
    fn from(info: RawPortInfo) -> Self {
        let label = describe(info.description.as_deref(), info.manufacturer.as_deref());
        Self {
            name: info.name,
            label,
        }
    }
}

/// `"description (manufacturer)"`, or whichever half exists.
pub fn describe(description: Option<&str>, manufacturer: Option<&str>) -> String {
    let description = description.filter(|s| !s.is_empty());
    let manufacturer = manufacturer.filter(|s| !s.is_empty());
    match (description, manufacturer) {
        (Some(d), Some(m)) => format!("{d} ({m})"),
        (Some(d), None) => d.to_string(),
        (None, Some(m)) => m.to_string(),
        (None, None) => UNKNOWN_DEVICE.to_string(),
    }
}
