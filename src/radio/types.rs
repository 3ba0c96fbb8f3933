// Types shared between the tool wrappers and the manager

use std::fmt;

use strum::Display;

/// External-tool operation, used to tag timeouts so the caller can tell
/// a pairing timeout from a connection timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Operation {
    Scan,
    Discovery,
    Pairing,
    Connection,
    Dhcp,
    Probe,
}

/// A WiFi network seen in the latest scan cycle. Not persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedNetwork {
    pub ssid: String,
    /// Signal strength, 0 to 100.
    pub strength: u8,
    pub secured: bool,
}

/// A Bluetooth device seen in the latest discovery cycle. Not persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedDevice {
    pub mac: String,
    pub name: String,
}

impl fmt::Display for ScannedDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            write!(f, "{}", self.mac)
        } else {
            write!(f, "{}", self.name)
        }
    }
}

/// Last-observed radio state from a non-mutating probe.
/// An unreachable tool resolves to `false` ("unknown" is treated as down).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RadioStatus {
    pub wifi_up: bool,
    pub bluetooth_up: bool,
}
