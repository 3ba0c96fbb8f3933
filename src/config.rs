use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use serde::Deserialize;

use crate::manager::ManagerTimings;
use crate::radio::Timings;

#[derive(Deserialize, Debug)]
pub struct Config {
    #[serde(default)]
    pub wifi: WifiConfig,

    #[serde(default)]
    pub bluetooth: BluetoothConfig,

    /// Background status poll interval, in seconds.
    #[serde(default = "default_status_poll")]
    pub status_poll_secs: u64,

    /// Background WiFi rescan interval, in seconds.
    #[serde(default = "default_scan_refresh")]
    pub scan_refresh_secs: u64,

    #[serde(default = "default_esc_quit")]
    pub esc_quit: bool,

    #[serde(default)]
    pub keys: KeyBindings,
}

#[derive(Deserialize, Debug)]
pub struct WifiConfig {
    #[serde(default = "default_interface")]
    pub interface: String,

    #[serde(default = "default_scan_timeout")]
    pub scan_timeout_secs: u64,

    #[serde(default = "default_dhcp_timeout")]
    pub dhcp_timeout_secs: u64,
}

#[derive(Deserialize, Debug)]
pub struct BluetoothConfig {
    #[serde(default = "default_pair_timeout")]
    pub pair_timeout_secs: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Bounded wait for discovery results before a scan reports.
    #[serde(default = "default_discovery_wait")]
    pub discovery_wait_secs: u64,

    #[serde(default = "default_discovery_poll")]
    pub discovery_poll_msecs: u64,

    /// Pause between pairing and the first connect attempt.
    #[serde(default = "default_settle")]
    pub settle_msecs: u64,

    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
}

#[derive(Deserialize, Debug)]
pub struct KeyBindings {
    #[serde(default = "default_scan_key")]
    pub scan: char,

    #[serde(default = "default_forget_key")]
    pub forget: char,

    #[serde(default = "default_toggle_power_key")]
    pub toggle_power: char,

    #[serde(default = "default_toggle_autoconnect_key")]
    pub toggle_autoconnect: char,
}

fn default_status_poll() -> u64 {
    10
}

fn default_scan_refresh() -> u64 {
    30
}

fn default_esc_quit() -> bool {
    false
}

fn default_interface() -> String {
    "wlan0".to_string()
}

fn default_scan_timeout() -> u64 {
    20
}

fn default_dhcp_timeout() -> u64 {
    30
}

fn default_pair_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_discovery_wait() -> u64 {
    5
}

fn default_discovery_poll() -> u64 {
    500
}

fn default_settle() -> u64 {
    2000
}

fn default_command_timeout() -> u64 {
    10
}

fn default_scan_key() -> char {
    's'
}

fn default_forget_key() -> char {
    'd'
}

fn default_toggle_power_key() -> char {
    'o'
}

fn default_toggle_autoconnect_key() -> char {
    'a'
}

impl Default for Config {
    fn default() -> Self {
        Self {
            wifi: WifiConfig::default(),
            bluetooth: BluetoothConfig::default(),
            status_poll_secs: default_status_poll(),
            scan_refresh_secs: default_scan_refresh(),
            esc_quit: default_esc_quit(),
            keys: KeyBindings::default(),
        }
    }
}

impl Default for WifiConfig {
    fn default() -> Self {
        Self {
            interface: default_interface(),
            scan_timeout_secs: default_scan_timeout(),
            dhcp_timeout_secs: default_dhcp_timeout(),
        }
    }
}

impl Default for BluetoothConfig {
    fn default() -> Self {
        Self {
            pair_timeout_secs: default_pair_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            discovery_wait_secs: default_discovery_wait(),
            discovery_poll_msecs: default_discovery_poll(),
            settle_msecs: default_settle(),
            command_timeout_secs: default_command_timeout(),
        }
    }
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            scan: default_scan_key(),
            forget: default_forget_key(),
            toggle_power: default_toggle_power_key(),
            toggle_autoconnect: default_toggle_autoconnect_key(),
        }
    }
}

impl Config {
    /// Read `config.toml` from `dir`, falling back to defaults when the
    /// file does not exist.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join("config.toml");
        let mut config: Self = match std::fs::read_to_string(&path) {
            Ok(body) => toml::from_str(&body)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => return Err(e.into()),
        };

        // A zero interval would divide the tick counters by zero.
        config.status_poll_secs = config.status_poll_secs.max(1);
        config.scan_refresh_secs = config.scan_refresh_secs.max(1);
        Ok(config)
    }

    /// The directory holding the config file and the persisted store:
    /// the CLI override when given, otherwise the user config directory.
    pub fn resolve_dir(cli_override: Option<&str>) -> Result<PathBuf> {
        if let Some(dir) = cli_override {
            return Ok(PathBuf::from(dir));
        }
        let base = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Can not find the user config directory"))?;
        Ok(base.join("padctl"))
    }

    pub fn radio_timings(&self) -> Timings {
        Timings {
            command: Duration::from_secs(self.bluetooth.command_timeout_secs),
            scan: Duration::from_secs(self.wifi.scan_timeout_secs),
            pair: Duration::from_secs(self.bluetooth.pair_timeout_secs),
            connect: Duration::from_secs(self.bluetooth.connect_timeout_secs),
            dhcp: Duration::from_secs(self.wifi.dhcp_timeout_secs),
        }
    }

    pub fn manager_timings(&self) -> ManagerTimings {
        ManagerTimings {
            discovery_wait: Duration::from_secs(self.bluetooth.discovery_wait_secs),
            discovery_poll: Duration::from_millis(self.bluetooth.discovery_poll_msecs),
            settle: Duration::from_millis(self.bluetooth.settle_msecs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.wifi.interface, "wlan0");
        assert_eq!(config.status_poll_secs, 10);
        assert_eq!(config.keys.scan, 's');
    }

    #[test]
    fn partial_file_keeps_defaults_for_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.toml"),
            "[wifi]\ninterface = \"wlp2s0\"\n\n[keys]\nscan = \"r\"\n",
        )
        .unwrap();

        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.wifi.interface, "wlp2s0");
        assert_eq!(config.keys.scan, 'r');
        assert_eq!(config.bluetooth.pair_timeout_secs, 30);
        assert_eq!(config.keys.forget, 'd');
    }

    #[test]
    fn zero_intervals_are_clamped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.toml"),
            "status_poll_secs = 0\nscan_refresh_secs = 0\n",
        )
        .unwrap();

        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.status_poll_secs, 1);
        assert_eq!(config.scan_refresh_secs, 1);
    }
}
