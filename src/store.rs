// Persisted network preferences.
//
// One JSON file with two top-level collections:
//
//   { "wifi_networks": { "networks": { "<ssid>": { ... } } },
//     "bluetooth_devices": { "devices": { "<mac>": { ... } } } }
//
// Writes go through a temp file and an atomic rename so a crash never
// leaves a half-written store, and every mutation is a single
// read-modify-write section.

use std::collections::HashMap;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::Result;

/// A WiFi network with saved connection preferences, keyed by ssid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnownNetwork {
    pub password: String,
    pub auto_connect: bool,
    /// Unix seconds of the last connect, absent before the first one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_connected: Option<i64>,
}

/// A Bluetooth device with a saved pairing record, keyed by mac address.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PairedDevice {
    pub auto_connect: bool,
    /// Last-observed connection state, refreshed on probes only.
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_connected: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct WifiSection {
    #[serde(default)]
    networks: HashMap<String, KnownNetwork>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct BluetoothSection {
    #[serde(default)]
    devices: HashMap<String, PairedDevice>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreData {
    #[serde(default)]
    wifi_networks: WifiSection,
    #[serde(default)]
    bluetooth_devices: BluetoothSection,
}

impl StoreData {
    pub fn networks(&self) -> &HashMap<String, KnownNetwork> {
        &self.wifi_networks.networks
    }

    pub fn networks_mut(&mut self) -> &mut HashMap<String, KnownNetwork> {
        &mut self.wifi_networks.networks
    }

    pub fn devices(&self) -> &HashMap<String, PairedDevice> {
        &self.bluetooth_devices.devices
    }

    pub fn devices_mut(&mut self) -> &mut HashMap<String, PairedDevice> {
        &mut self.bluetooth_devices.devices
    }
}

#[derive(Debug)]
pub struct Store {
    path: PathBuf,
    data: StoreData,
}

impl Store {
    /// Open the store at `path`, starting empty when the file does not
    /// exist yet.
    pub fn load(path: PathBuf) -> Result<Self> {
        let data = match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoreData::default(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, data })
    }

    pub fn data(&self) -> &StoreData {
        &self.data
    }

    /// Apply one mutation and persist it before returning. The closure's
    /// return value is handed back so callers can report what changed.
    pub fn update<T>(&mut self, mutate: impl FnOnce(&mut StoreData) -> T) -> Result<T> {
        let out = mutate(&mut self.data);
        self.save()?;
        Ok(out)
    }

    /// Write-temp-then-rename; the store carries credentials, so it is
    /// readable by the owner only.
    fn save(&self) -> Result<()> {
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(&self.data)?)?;
        fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600))?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(dir: &tempfile::TempDir) -> Store {
        Store::load(dir.path().join("store.json")).unwrap()
    }

    #[test]
    fn missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir);
        assert!(store.data().networks().is_empty());
        assert!(store.data().devices().is_empty());
    }

    #[test]
    fn update_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open(&dir);

        store
            .update(|data| {
                data.networks_mut().insert(
                    "Home".to_string(),
                    KnownNetwork {
                        password: "hunter2".to_string(),
                        auto_connect: true,
                        last_connected: Some(1_700_000_000),
                    },
                );
                data.devices_mut().insert(
                    "AA:BB:CC:DD:EE:FF".to_string(),
                    PairedDevice {
                        auto_connect: true,
                        connected: false,
                        last_connected: None,
                    },
                );
            })
            .unwrap();

        let reloaded = open(&dir);
        let network = reloaded.data().networks().get("Home").unwrap();
        assert_eq!(network.password, "hunter2");
        assert_eq!(network.last_connected, Some(1_700_000_000));
        assert!(reloaded.data().devices().contains_key("AA:BB:CC:DD:EE:FF"));
    }

    #[test]
    fn layout_uses_the_two_top_level_collections() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open(&dir);
        store
            .update(|data| {
                data.networks_mut()
                    .insert("Home".to_string(), KnownNetwork::default());
            })
            .unwrap();

        let raw = fs::read_to_string(dir.path().join("store.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert!(value["wifi_networks"]["networks"]["Home"].is_object());
        assert!(value["bluetooth_devices"]["devices"].is_object());
    }

    #[test]
    fn store_file_is_owner_only() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open(&dir);
        store.update(|_| ()).unwrap();

        let mode = fs::metadata(dir.path().join("store.json"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
