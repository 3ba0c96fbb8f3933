// Defensive parsers for the line-oriented output of the radio tools.
//
// The tools are external and their output drifts between versions, so a
// malformed block is dropped at the next delimiter instead of failing
// the whole scan.

use crate::radio::types::{ScannedDevice, ScannedNetwork};

#[derive(Default)]
struct PartialNetwork {
    ssid: Option<String>,
    strength: u8,
    secured: bool,
}

impl PartialNetwork {
    /// A record without an ESSID is incomplete and gets discarded.
    fn complete(self) -> Option<ScannedNetwork> {
        self.ssid.map(|ssid| ScannedNetwork {
            ssid,
            strength: self.strength,
            secured: self.secured,
        })
    }
}

/// Parse `iwlist <iface> scan` output into scan records.
///
/// Blocks are delimited by `Cell` lines; the fields of interest are
/// `ESSID:"..."`, `Quality=n/m` (the numerator is the displayed
/// strength) and `Encryption key:on|off`.
pub fn parse_wifi_scan(output: &str) -> Vec<ScannedNetwork> {
    let mut networks = Vec::new();
    let mut current = PartialNetwork::default();

    for line in output.lines() {
        let line = line.trim();

        if line.starts_with("Cell ") {
            if let Some(network) = std::mem::take(&mut current).complete() {
                networks.push(network);
            }
        } else if let Some((_, rest)) = line.split_once("ESSID:\"") {
            current.ssid = Some(rest.trim_end_matches('"').to_string());
        } else if let Some((_, rest)) = line.split_once("Quality=") {
            let quality = rest.split_whitespace().next().unwrap_or("");
            let numerator = quality.split('/').next().unwrap_or("");
            current.strength = numerator.parse::<u8>().unwrap_or(0).min(100);
        } else if let Some((_, rest)) = line.split_once("Encryption key:") {
            current.secured = rest.trim().starts_with("on");
        }
    }

    if let Some(network) = current.complete() {
        networks.push(network);
    }

    networks
}

/// Parse `bluetoothctl devices` output: one `Device <mac> <name>` line
/// per discovered device. Lines that do not match are skipped.
pub fn parse_device_list(output: &str) -> Vec<ScannedDevice> {
    let mut devices = Vec::new();

    for line in output.lines() {
        let mut parts = line.split_whitespace();
        if parts.next() != Some("Device") {
            continue;
        }
        let Some(mac) = parts.next() else { continue };
        if !mac.contains(':') {
            continue;
        }

        let name = parts.collect::<Vec<_>>().join(" ");
        devices.push(ScannedDevice {
            mac: mac.to_string(),
            name,
        });
    }

    devices
}

/// Whether a `bluetoothctl show` dump reports the controller as powered.
pub fn parse_powered(output: &str) -> bool {
    output.contains("Powered: yes")
}

/// Whether a `bluetoothctl info <mac>` dump reports the device as connected.
pub fn parse_info_connected(output: &str) -> bool {
    output
        .lines()
        .any(|line| line.trim().starts_with("Connected:") && line.contains("yes"))
}
