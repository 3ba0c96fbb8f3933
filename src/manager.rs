// Network state reconciliation.
//
// The manager owns the persisted known-network / paired-device records,
// probes live radio state through `RadioClient`, and mediates every
// mutating operation. It never raises an error that would take the UI
// loop down: each operation returns a discriminated result and surfaces
// its outcome through the notification sink.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::sync::mpsc::UnboundedSender;

use crate::event::Event;
use crate::notification::{Notification, NotificationLevel};
use crate::radio::{RadioClient, RadioStatus, ScannedDevice, ScannedNetwork, parse};
use crate::store::{KnownNetwork, PairedDevice, Store};
use crate::{Error, Result};

/// Result of a scan request. A request made while a scan of the same
/// kind is outstanding is dropped, not queued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome<T> {
    Completed(Vec<T>),
    Dropped,
}

/// Result of a WiFi connect. The tools return before association is
/// confirmed, so "the commands went through" and "the link came up on
/// the requested ssid" are reported separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiConnectOutcome {
    Issued,
    Verified,
}

/// Wait policy knobs owned by the manager rather than the tool layer.
#[derive(Debug, Clone, Copy)]
pub struct ManagerTimings {
    /// Total bounded wait for Bluetooth discovery to populate.
    pub discovery_wait: Duration,
    /// Device-list poll interval inside the discovery window.
    pub discovery_poll: Duration,
    /// Pause between a successful pairing and the connect attempt.
    pub settle: Duration,
}

impl Default for ManagerTimings {
    fn default() -> Self {
        Self {
            discovery_wait: Duration::from_secs(5),
            discovery_poll: Duration::from_millis(500),
            settle: Duration::from_secs(2),
        }
    }
}

/// Clears the in-flight flag when the scan ends, whichever way it ends.
struct ScanGuard<'a>(&'a AtomicBool);

impl<'a> ScanGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
            .then_some(Self(flag))
    }
}

impl Drop for ScanGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct NetworkStateManager {
    radio: RadioClient,
    store: Mutex<Store>,
    sender: UnboundedSender<Event>,
    timings: ManagerTimings,
    wifi_scan_busy: AtomicBool,
    bluetooth_scan_busy: AtomicBool,
    cancel_tx: async_channel::Sender<()>,
    cancel_rx: async_channel::Receiver<()>,
}

impl NetworkStateManager {
    pub fn new(
        radio: RadioClient,
        store: Store,
        sender: UnboundedSender<Event>,
        timings: ManagerTimings,
    ) -> Self {
        let (cancel_tx, cancel_rx) = async_channel::unbounded();
        Self {
            radio,
            store: Mutex::new(store),
            sender,
            timings,
            wifi_scan_busy: AtomicBool::new(false),
            bluetooth_scan_busy: AtomicBool::new(false),
            cancel_tx,
            cancel_rx,
        }
    }

    fn notify(&self, title: &str, message: impl Into<String>, level: NotificationLevel) {
        let _ = Notification::send(title, message, level, &self.sender);
    }

    /// One WiFi scan cycle: invoke the scan tool, parse, sort by
    /// descending signal strength. A tool failure degrades to an empty
    /// result; the parser already drops malformed blocks.
    pub async fn scan_wifi(&self) -> ScanOutcome<ScannedNetwork> {
        let Some(_guard) = ScanGuard::acquire(&self.wifi_scan_busy) else {
            log::debug!("wifi scan already in flight, dropping request");
            return ScanOutcome::Dropped;
        };

        let raw = match self.radio.wifi_scan().await {
            Ok(raw) => raw,
            Err(e) => {
                log::warn!("wifi scan failed: {e}");
                self.notify(
                    "WiFi Error",
                    "Failed to scan networks",
                    NotificationLevel::Error,
                );
                return ScanOutcome::Completed(Vec::new());
            }
        };

        let mut networks = parse::parse_wifi_scan(&raw);
        networks.sort_by(|a, b| b.strength.cmp(&a.strength));
        ScanOutcome::Completed(networks)
    }

    /// Point the supplicant at `ssid` and record it as known once the
    /// commands return. The record is written regardless of whether the
    /// association is confirmed afterwards; the outcome says which.
    pub async fn connect_wifi(&self, ssid: &str, password: &str) -> Result<WifiConnectOutcome> {
        if let Err(e) = self.radio.connect_wifi(ssid, password).await {
            log::warn!("wifi connect to {ssid} failed: {e}");
            self.notify(
                "WiFi Error",
                format!("Failed to connect to {ssid}"),
                NotificationLevel::Error,
            );
            return Err(e);
        }

        self.store.lock().await.update(|data| {
            let entry = data.networks_mut().entry(ssid.to_string()).or_default();
            entry.password = password.to_string();
            entry.auto_connect = true;
            entry.last_connected = Some(Utc::now().timestamp());
        })?;

        let verified = matches!(
            self.radio.current_ssid().await,
            Ok(Some(current)) if current == ssid
        );

        if verified {
            self.notify(
                "WiFi Connected",
                format!("Connected to {ssid}"),
                NotificationLevel::Info,
            );
            Ok(WifiConnectOutcome::Verified)
        } else {
            self.notify(
                "WiFi",
                format!("Connection to {ssid} started, not confirmed yet"),
                NotificationLevel::Warning,
            );
            Ok(WifiConnectOutcome::Issued)
        }
    }

    /// Reconnect to a saved network using its stored credentials.
    pub async fn connect_known_wifi(&self, ssid: &str) -> Result<WifiConnectOutcome> {
        let password = {
            let store = self.store.lock().await;
            store
                .data()
                .networks()
                .get(ssid)
                .map(|n| n.password.clone())
                .ok_or_else(|| Error::NotFound(ssid.to_string()))?
        };
        self.connect_wifi(ssid, &password).await
    }

    /// Drop the persisted record only; an active session stays up.
    /// Returns whether the ssid was known.
    pub async fn forget_wifi(&self, ssid: &str) -> Result<bool> {
        let removed = self
            .store
            .lock()
            .await
            .update(|data| data.networks_mut().remove(ssid).is_some())?;

        if removed {
            self.notify(
                "WiFi Forgotten",
                format!("Removed {ssid} from known networks"),
                NotificationLevel::Info,
            );
        } else {
            self.notify(
                "WiFi",
                format!("{ssid} is not a known network"),
                NotificationLevel::Warning,
            );
        }
        Ok(removed)
    }

    /// One Bluetooth discovery cycle: keep discovery running while
    /// polling the device list until the bounded window closes or the
    /// wait is cancelled, then refresh the last-observed connected flag
    /// of every paired device in a single store update.
    pub async fn scan_bluetooth(&self) -> ScanOutcome<ScannedDevice> {
        let Some(_guard) = ScanGuard::acquire(&self.bluetooth_scan_busy) else {
            log::debug!("bluetooth scan already in flight, dropping request");
            return ScanOutcome::Dropped;
        };

        // Drop cancellations left over from a previous cycle.
        while self.cancel_rx.try_recv().is_ok() {}

        let discovery = self
            .radio
            .start_discovery(self.timings.discovery_wait + self.timings.discovery_poll);
        let deadline = tokio::time::Instant::now() + self.timings.discovery_wait;

        let mut devices = Vec::new();
        loop {
            match self.radio.device_list().await {
                Ok(raw) => devices = parse::parse_device_list(&raw),
                Err(e) => {
                    log::warn!("bluetooth device list failed: {e}");
                    self.notify(
                        "Bluetooth Error",
                        "Failed to scan devices",
                        NotificationLevel::Error,
                    );
                    discovery.abort();
                    return ScanOutcome::Completed(Vec::new());
                }
            }

            let now = tokio::time::Instant::now();
            if now >= deadline {
                break;
            }
            let step = self.timings.discovery_poll.min(deadline - now);
            tokio::select! {
                _ = tokio::time::sleep(step) => {}
                _ = self.cancel_rx.recv() => {
                    log::debug!("bluetooth discovery wait cancelled");
                    break;
                }
            }
        }
        discovery.abort();

        self.refresh_connected_flags().await;
        ScanOutcome::Completed(devices)
    }

    /// Abort the discovery wait of an in-flight Bluetooth scan early.
    pub fn cancel_discovery(&self) {
        let _ = self.cancel_tx.try_send(());
    }

    async fn refresh_connected_flags(&self) {
        let macs: Vec<String> = {
            let store = self.store.lock().await;
            store.data().devices().keys().cloned().collect()
        };

        let mut observed = Vec::new();
        for mac in macs {
            if let Ok(raw) = self.radio.device_info(&mac).await {
                observed.push((mac, parse::parse_info_connected(&raw)));
            }
        }
        if observed.is_empty() {
            return;
        }

        let result = self.store.lock().await.update(|data| {
            for (mac, connected) in observed {
                if let Some(device) = data.devices_mut().get_mut(&mac) {
                    device.connected = connected;
                }
            }
        });
        if let Err(e) = result {
            log::warn!("failed to persist connected flags: {e}");
        }
    }

    /// Pair (when needed), settle, then connect. The pairing record is
    /// written only after the pair command succeeds, so a pairing
    /// timeout leaves no partial record behind.
    pub async fn connect_bluetooth(&self, mac: &str) -> Result<()> {
        let already_paired = self.store.lock().await.data().devices().contains_key(mac);

        if !already_paired {
            if let Err(e) = self.radio.pair(mac).await {
                let message = if e.is_timeout() {
                    "Pairing timed out"
                } else {
                    "Failed to pair device"
                };
                log::warn!("pairing {mac} failed: {e}");
                self.notify("Bluetooth Error", message, NotificationLevel::Error);
                return Err(e);
            }

            self.store.lock().await.update(|data| {
                data.devices_mut().insert(
                    mac.to_string(),
                    PairedDevice {
                        auto_connect: true,
                        connected: false,
                        last_connected: None,
                    },
                );
            })?;

            tokio::time::sleep(self.timings.settle).await;
        }

        if let Err(e) = self.radio.connect_device(mac).await {
            let message = if e.is_timeout() {
                "Connection timed out"
            } else {
                "Failed to connect to device"
            };
            log::warn!("connecting {mac} failed: {e}");
            self.notify("Bluetooth Error", message, NotificationLevel::Error);
            return Err(e);
        }

        self.store.lock().await.update(|data| {
            let device = data.devices_mut().entry(mac.to_string()).or_default();
            device.connected = true;
            device.last_connected = Some(Utc::now().timestamp());
        })?;

        self.notify(
            "Bluetooth Connected",
            format!("Connected to {mac}"),
            NotificationLevel::Info,
        );
        Ok(())
    }

    /// Issue a disconnect and mark the record disconnected. The pairing
    /// is kept.
    pub async fn disconnect_bluetooth(&self, mac: &str) -> Result<()> {
        if let Err(e) = self.radio.disconnect_device(mac).await {
            log::warn!("disconnecting {mac} failed: {e}");
            self.notify(
                "Bluetooth Error",
                "Failed to disconnect device",
                NotificationLevel::Error,
            );
            return Err(e);
        }

        self.store.lock().await.update(|data| {
            if let Some(device) = data.devices_mut().get_mut(mac) {
                device.connected = false;
            }
        })?;

        self.notify(
            "Bluetooth Disconnected",
            "Device disconnected",
            NotificationLevel::Info,
        );
        Ok(())
    }

    /// Unpair and drop the persisted record. Returns whether the record
    /// existed. The unpair command is best effort: a stale record is
    /// removed even when the controller no longer knows the device.
    pub async fn forget_bluetooth(&self, mac: &str) -> Result<bool> {
        if let Err(e) = self.radio.remove_device(mac).await {
            log::warn!("unpairing {mac} failed: {e}");
        }

        let removed = self
            .store
            .lock()
            .await
            .update(|data| data.devices_mut().remove(mac).is_some())?;

        if removed {
            self.notify("Bluetooth Forgotten", "Device removed", NotificationLevel::Info);
        } else {
            self.notify(
                "Bluetooth",
                format!("{mac} has no pairing record"),
                NotificationLevel::Warning,
            );
        }
        Ok(removed)
    }

    /// Probe the controller power state and set it to the explicit
    /// inverse. Another writer can still flip the state inside the
    /// probe window; the tool offers no compare-and-set.
    pub async fn toggle_bluetooth_radio(&self) -> Result<bool> {
        let powered = match self.radio.bluetooth_powered().await {
            Ok(powered) => powered,
            Err(e) => {
                log::warn!("bluetooth power probe failed: {e}");
                self.notify(
                    "Bluetooth Error",
                    "Failed to toggle Bluetooth",
                    NotificationLevel::Error,
                );
                return Err(e);
            }
        };

        let target = !powered;
        if let Err(e) = self.radio.set_bluetooth_power(target).await {
            log::warn!("bluetooth power set failed: {e}");
            self.notify(
                "Bluetooth Error",
                "Failed to toggle Bluetooth",
                NotificationLevel::Error,
            );
            return Err(e);
        }

        self.notify(
            "Bluetooth",
            format!("Bluetooth turned {}", if target { "on" } else { "off" }),
            NotificationLevel::Info,
        );
        Ok(target)
    }

    /// Lightweight non-mutating probe; a failed probe reads as down.
    pub async fn query_status(&self) -> RadioStatus {
        RadioStatus {
            wifi_up: self.radio.wifi_link_up().await,
            bluetooth_up: self.radio.bluetooth_powered().await.unwrap_or(false),
        }
    }

    /// Startup reconnect: the most recently used auto-connect network,
    /// then every auto-connect device.
    pub async fn autoconnect(&self) {
        let (network, devices) = {
            let store = self.store.lock().await;
            let network = store
                .data()
                .networks()
                .iter()
                .filter(|(_, n)| n.auto_connect)
                .max_by_key(|(_, n)| n.last_connected.unwrap_or(0))
                .map(|(ssid, n)| (ssid.clone(), n.password.clone()));
            let devices: Vec<String> = store
                .data()
                .devices()
                .iter()
                .filter(|(_, d)| d.auto_connect)
                .map(|(mac, _)| mac.clone())
                .collect();
            (network, devices)
        };

        if let Some((ssid, password)) = network {
            let _ = self.connect_wifi(&ssid, &password).await;
        }
        for mac in devices {
            let _ = self.connect_bluetooth(&mac).await;
        }
    }

    pub async fn toggle_wifi_autoconnect(&self, ssid: &str) -> Result<bool> {
        let toggled = self.store.lock().await.update(|data| {
            data.networks_mut().get_mut(ssid).map(|network| {
                network.auto_connect = !network.auto_connect;
                network.auto_connect
            })
        })?;

        match toggled {
            Some(enabled) => {
                let state = if enabled { "Enabled" } else { "Disabled" };
                self.notify(
                    "WiFi",
                    format!("{state} autoconnect for {ssid}"),
                    NotificationLevel::Info,
                );
                Ok(enabled)
            }
            None => Err(Error::NotFound(ssid.to_string())),
        }
    }

    pub async fn toggle_bluetooth_autoconnect(&self, mac: &str) -> Result<bool> {
        let toggled = self.store.lock().await.update(|data| {
            data.devices_mut().get_mut(mac).map(|device| {
                device.auto_connect = !device.auto_connect;
                device.auto_connect
            })
        })?;

        match toggled {
            Some(enabled) => {
                let state = if enabled { "Enabled" } else { "Disabled" };
                self.notify(
                    "Bluetooth",
                    format!("{state} autoconnect for {mac}"),
                    NotificationLevel::Info,
                );
                Ok(enabled)
            }
            None => Err(Error::NotFound(mac.to_string())),
        }
    }

    /// Snapshot of the known networks, most recently connected first.
    pub async fn known_networks(&self) -> Vec<(String, KnownNetwork)> {
        let store = self.store.lock().await;
        let mut networks: Vec<_> = store
            .data()
            .networks()
            .iter()
            .map(|(ssid, network)| (ssid.clone(), network.clone()))
            .collect();
        networks.sort_by_key(|(_, n)| std::cmp::Reverse(n.last_connected.unwrap_or(0)));
        networks
    }

    /// Snapshot of the paired devices, most recently connected first.
    pub async fn paired_devices(&self) -> Vec<(String, PairedDevice)> {
        let store = self.store.lock().await;
        let mut devices: Vec<_> = store
            .data()
            .devices()
            .iter()
            .map(|(mac, device)| (mac.clone(), device.clone()))
            .collect();
        devices.sort_by_key(|(_, d)| std::cmp::Reverse(d.last_connected.unwrap_or(0)));
        devices
    }

    pub async fn current_ssid(&self) -> Option<String> {
        self.radio.current_ssid().await.ok().flatten()
    }

    /// Run a WiFi scan off the UI loop and report back through the
    /// event channel. A dropped re-trigger reports nothing; the
    /// outstanding scan delivers the result.
    pub fn spawn_wifi_scan(self: &Arc<Self>, sender: UnboundedSender<Event>) {
        let manager = self.clone();
        tokio::spawn(async move {
            if let ScanOutcome::Completed(networks) = manager.scan_wifi().await {
                let connected = manager.current_ssid().await;
                let _ = sender.send(Event::WifiScanDone {
                    networks,
                    connected,
                });
            }
        });
    }

    pub fn spawn_bluetooth_scan(self: &Arc<Self>, sender: UnboundedSender<Event>) {
        let manager = self.clone();
        tokio::spawn(async move {
            if let ScanOutcome::Completed(devices) = manager.scan_bluetooth().await {
                let _ = sender.send(Event::BluetoothScanDone { devices });
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::radio::{CmdOutput, CommandRunner, Operation, Timings};
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;
    use tokio::sync::mpsc::{self, UnboundedReceiver};

    const SCAN_OUTPUT: &str = r#"wlan0     Scan completed :
          Cell 01 - Address: 66:55:44:33:22:11
                    ESSID:"Guest"
                    Quality=40/70  Signal level=-70 dBm
                    Encryption key:off
          Cell 02 - Address: 11:22:33:44:55:66
                    ESSID:"Home"
                    Quality=60/70  Signal level=-50 dBm
                    Encryption key:on
"#;

    /// Scripted stand-in for the radio tools.
    #[derive(Default)]
    struct FakeRunner {
        wifi_scan_fails: bool,
        wifi_scan_delay: Option<Duration>,
        pair_times_out: bool,
        connect_times_out: bool,
        iwgetid_fails: bool,
        show_fails: bool,
        devices_output: String,
        powered: StdMutex<bool>,
        current_ssid: StdMutex<Option<String>>,
        calls: StdMutex<Vec<String>>,
    }

    impl FakeRunner {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn ok(stdout: &str) -> Result<CmdOutput> {
            Ok(CmdOutput {
                success: true,
                stdout: stdout.to_string(),
                stderr: String::new(),
            })
        }

        fn fail() -> Result<CmdOutput> {
            Ok(CmdOutput {
                success: false,
                stdout: String::new(),
                stderr: "boom".to_string(),
            })
        }
    }

    #[async_trait]
    impl CommandRunner for FakeRunner {
        async fn run(
            &self,
            operation: Operation,
            program: &str,
            args: &[&str],
            timeout: Duration,
        ) -> Result<CmdOutput> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("{program} {}", args.join(" ")));

            match (program, args.first().copied()) {
                ("iwlist", _) => {
                    if let Some(delay) = self.wifi_scan_delay {
                        tokio::time::sleep(delay).await;
                    }
                    if self.wifi_scan_fails {
                        Self::fail()
                    } else {
                        Self::ok(SCAN_OUTPUT)
                    }
                }
                ("iwgetid", _) => {
                    if self.iwgetid_fails {
                        return Self::fail();
                    }
                    match self.current_ssid.lock().unwrap().clone() {
                        Some(ssid) => Self::ok(&format!("{ssid}\n")),
                        None => Self::fail(),
                    }
                }
                ("killall" | "wpa_supplicant" | "dhclient", _) => Self::ok(""),
                ("bluetoothctl", Some("scan")) => Self::ok(""),
                ("bluetoothctl", Some("devices")) => Self::ok(&self.devices_output),
                ("bluetoothctl", Some("info")) => Self::ok("\tConnected: no\n"),
                ("bluetoothctl", Some("pair")) => {
                    if self.pair_times_out {
                        Err(Error::Timeout {
                            operation,
                            seconds: timeout.as_secs(),
                        })
                    } else {
                        Self::ok("Pairing successful")
                    }
                }
                ("bluetoothctl", Some("connect")) => {
                    if self.connect_times_out {
                        Err(Error::Timeout {
                            operation,
                            seconds: timeout.as_secs(),
                        })
                    } else {
                        Self::ok("Connection successful")
                    }
                }
                ("bluetoothctl", Some("disconnect" | "remove")) => Self::ok(""),
                ("bluetoothctl", Some("show")) => {
                    if self.show_fails {
                        return Self::fail();
                    }
                    let powered = *self.powered.lock().unwrap();
                    Self::ok(if powered {
                        "Controller AA\n\tPowered: yes\n"
                    } else {
                        "Controller AA\n\tPowered: no\n"
                    })
                }
                ("bluetoothctl", Some("power")) => {
                    *self.powered.lock().unwrap() = args.get(1) == Some(&"on");
                    Self::ok("")
                }
                _ => Self::fail(),
            }
        }
    }

    fn manager_with_timings(
        runner: Arc<FakeRunner>,
        timings: ManagerTimings,
    ) -> (
        Arc<NetworkStateManager>,
        UnboundedReceiver<Event>,
        tempfile::TempDir,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::load(dir.path().join("store.json")).unwrap();
        let radio = RadioClient::new(
            runner,
            "wlan0".to_string(),
            dir.path().to_path_buf(),
            Timings::default(),
        );
        let (sender, receiver) = mpsc::unbounded_channel();
        let manager = Arc::new(NetworkStateManager::new(radio, store, sender, timings));
        (manager, receiver, dir)
    }

    fn manager_with(
        runner: Arc<FakeRunner>,
    ) -> (
        Arc<NetworkStateManager>,
        UnboundedReceiver<Event>,
        tempfile::TempDir,
    ) {
        let timings = ManagerTimings {
            discovery_wait: Duration::ZERO,
            discovery_poll: Duration::from_millis(1),
            settle: Duration::ZERO,
        };
        manager_with_timings(runner, timings)
    }

    fn notifications(receiver: &mut UnboundedReceiver<Event>) -> Vec<Notification> {
        let mut out = Vec::new();
        while let Ok(event) = receiver.try_recv() {
            if let Event::Notification(n) = event {
                out.push(n);
            }
        }
        out
    }

    #[tokio::test]
    async fn wifi_scan_sorts_by_descending_strength() {
        let (manager, _rx, _dir) = manager_with(Arc::new(FakeRunner::default()));

        let outcome = manager.scan_wifi().await;
        let ScanOutcome::Completed(networks) = outcome else {
            panic!("scan was dropped");
        };

        let ssids: Vec<&str> = networks.iter().map(|n| n.ssid.as_str()).collect();
        assert_eq!(ssids, ["Home", "Guest"]);
        assert_eq!(networks[0].strength, 60);
        assert!(networks[0].secured);
        assert!(!networks[1].secured);
    }

    #[tokio::test]
    async fn wifi_scan_failure_degrades_to_empty_and_notifies() {
        let runner = Arc::new(FakeRunner {
            wifi_scan_fails: true,
            ..Default::default()
        });
        let (manager, mut rx, _dir) = manager_with(runner);

        assert_eq!(manager.scan_wifi().await, ScanOutcome::Completed(Vec::new()));

        let toasts = notifications(&mut rx);
        assert!(toasts.iter().any(|n| n.level == NotificationLevel::Error));
    }

    #[tokio::test]
    async fn wifi_scan_retrigger_is_dropped_while_outstanding() {
        let runner = Arc::new(FakeRunner {
            wifi_scan_delay: Some(Duration::from_millis(50)),
            ..Default::default()
        });
        let (manager, _rx, _dir) = manager_with(runner);

        let (first, second) = tokio::join!(manager.scan_wifi(), manager.scan_wifi());
        let dropped = [&first, &second]
            .iter()
            .filter(|o| ***o == ScanOutcome::Dropped)
            .count();
        assert_eq!(dropped, 1);
    }

    #[tokio::test]
    async fn connect_then_forget_leaves_no_record() {
        let (manager, _rx, _dir) = manager_with(Arc::new(FakeRunner::default()));

        manager.connect_wifi("Home", "hunter2").await.unwrap();
        let known = manager.known_networks().await;
        assert_eq!(known.len(), 1);
        assert_eq!(known[0].0, "Home");
        assert!(known[0].1.auto_connect);
        assert!(known[0].1.last_connected.is_some());

        assert!(manager.forget_wifi("Home").await.unwrap());
        assert!(manager.known_networks().await.is_empty());
    }

    #[tokio::test]
    async fn forget_unknown_network_returns_false_and_changes_nothing() {
        let (manager, _rx, _dir) = manager_with(Arc::new(FakeRunner::default()));
        manager.connect_wifi("Home", "pw").await.unwrap();

        assert!(!manager.forget_wifi("Unknown").await.unwrap());
        assert_eq!(manager.known_networks().await.len(), 1);
    }

    #[tokio::test]
    async fn connect_is_issued_until_the_link_confirms_the_ssid() {
        let runner = Arc::new(FakeRunner::default());
        let (manager, _rx, _dir) = manager_with(runner.clone());

        let outcome = manager.connect_wifi("Home", "pw").await.unwrap();
        assert_eq!(outcome, WifiConnectOutcome::Issued);

        *runner.current_ssid.lock().unwrap() = Some("Home".to_string());
        let outcome = manager.connect_wifi("Home", "pw").await.unwrap();
        assert_eq!(outcome, WifiConnectOutcome::Verified);
    }

    #[tokio::test]
    async fn pairing_timeout_records_nothing() {
        let runner = Arc::new(FakeRunner {
            pair_times_out: true,
            ..Default::default()
        });
        let (manager, mut rx, _dir) = manager_with(runner.clone());

        let err = manager
            .connect_bluetooth("AA:BB:CC:DD:EE:FF")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Timeout {
                operation: Operation::Pairing,
                ..
            }
        ));

        // No partial pairing is recorded and no connect was attempted.
        assert!(manager.paired_devices().await.is_empty());
        assert!(
            !runner
                .calls()
                .iter()
                .any(|c| c.starts_with("bluetoothctl connect"))
        );
        let toasts = notifications(&mut rx);
        assert!(toasts.iter().any(|n| n.message == "Pairing timed out"));
    }

    #[tokio::test]
    async fn connection_timeout_is_distinct_from_pairing_timeout() {
        let runner = Arc::new(FakeRunner {
            connect_times_out: true,
            ..Default::default()
        });
        let (manager, mut rx, _dir) = manager_with(runner);

        let err = manager
            .connect_bluetooth("AA:BB:CC:DD:EE:FF")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Timeout {
                operation: Operation::Connection,
                ..
            }
        ));

        let toasts = notifications(&mut rx);
        assert!(toasts.iter().any(|n| n.message == "Connection timed out"));
    }

    #[tokio::test]
    async fn fresh_device_goes_through_pair_then_connect() {
        let runner = Arc::new(FakeRunner::default());
        let (manager, _rx, _dir) = manager_with(runner.clone());

        manager.connect_bluetooth("AA:BB:CC:DD:EE:FF").await.unwrap();

        let calls = runner.calls();
        let pair_at = calls
            .iter()
            .position(|c| c == "bluetoothctl pair AA:BB:CC:DD:EE:FF")
            .unwrap();
        let connect_at = calls
            .iter()
            .position(|c| c == "bluetoothctl connect AA:BB:CC:DD:EE:FF")
            .unwrap();
        assert!(pair_at < connect_at);

        let devices = manager.paired_devices().await;
        assert_eq!(devices.len(), 1);
        assert!(devices[0].1.connected);
        assert!(devices[0].1.auto_connect);
        assert!(devices[0].1.last_connected.is_some());

        // A second connect skips the pair step.
        manager.connect_bluetooth("AA:BB:CC:DD:EE:FF").await.unwrap();
        let pairs = runner
            .calls()
            .iter()
            .filter(|c| c.starts_with("bluetoothctl pair"))
            .count();
        assert_eq!(pairs, 1);
    }

    #[tokio::test]
    async fn disconnect_keeps_the_pairing() {
        let (manager, _rx, _dir) = manager_with(Arc::new(FakeRunner::default()));
        manager.connect_bluetooth("AA:BB:CC:DD:EE:FF").await.unwrap();

        manager
            .disconnect_bluetooth("AA:BB:CC:DD:EE:FF")
            .await
            .unwrap();

        let devices = manager.paired_devices().await;
        assert_eq!(devices.len(), 1);
        assert!(!devices[0].1.connected);
    }

    #[tokio::test]
    async fn forget_bluetooth_reports_whether_the_record_existed() {
        let (manager, _rx, _dir) = manager_with(Arc::new(FakeRunner::default()));
        manager.connect_bluetooth("AA:BB:CC:DD:EE:FF").await.unwrap();

        assert!(manager.forget_bluetooth("AA:BB:CC:DD:EE:FF").await.unwrap());
        assert!(!manager.forget_bluetooth("AA:BB:CC:DD:EE:FF").await.unwrap());
        assert!(manager.paired_devices().await.is_empty());
    }

    #[tokio::test]
    async fn toggling_twice_restores_the_observed_power_state() {
        let runner = Arc::new(FakeRunner::default());
        *runner.powered.lock().unwrap() = true;
        let (manager, _rx, _dir) = manager_with(runner.clone());

        assert!(!manager.toggle_bluetooth_radio().await.unwrap());
        assert!(manager.toggle_bluetooth_radio().await.unwrap());
        assert!(*runner.powered.lock().unwrap());
    }

    #[tokio::test]
    async fn bluetooth_scan_parses_the_device_list() {
        let runner = Arc::new(FakeRunner {
            devices_output: "Device AA:BB:CC:DD:EE:FF Speaker\n".to_string(),
            ..Default::default()
        });
        let (manager, _rx, _dir) = manager_with(runner);

        let ScanOutcome::Completed(devices) = manager.scan_bluetooth().await else {
            panic!("scan was dropped");
        };
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].name, "Speaker");
    }

    #[tokio::test]
    async fn cancel_interrupts_the_discovery_wait() {
        let runner = Arc::new(FakeRunner {
            devices_output: "Device AA:BB:CC:DD:EE:FF Speaker\n".to_string(),
            ..Default::default()
        });
        // A window far longer than the test; only a cancel ends it.
        let timings = ManagerTimings {
            discovery_wait: Duration::from_secs(60),
            discovery_poll: Duration::from_millis(10),
            settle: Duration::ZERO,
        };
        let (manager, _rx, _dir) = manager_with_timings(runner, timings);

        let scan = tokio::spawn({
            let manager = manager.clone();
            async move { manager.scan_bluetooth().await }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        manager.cancel_discovery();

        let outcome = tokio::time::timeout(Duration::from_secs(5), scan)
            .await
            .expect("scan did not return after cancel")
            .unwrap();

        // The wait ends early but keeps what discovery saw so far.
        let ScanOutcome::Completed(devices) = outcome else {
            panic!("scan was dropped");
        };
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].mac, "AA:BB:CC:DD:EE:FF");
    }

    #[tokio::test]
    async fn probe_failures_read_as_down() {
        let runner = Arc::new(FakeRunner {
            iwgetid_fails: true,
            show_fails: true,
            ..Default::default()
        });
        let (manager, _rx, _dir) = manager_with(runner);

        let status = manager.query_status().await;
        assert!(!status.wifi_up);
        assert!(!status.bluetooth_up);
    }

    #[tokio::test]
    async fn status_reflects_live_probes() {
        let runner = Arc::new(FakeRunner::default());
        *runner.powered.lock().unwrap() = true;
        *runner.current_ssid.lock().unwrap() = Some("Home".to_string());
        let (manager, _rx, _dir) = manager_with(runner);

        let status = manager.query_status().await;
        assert!(status.wifi_up);
        assert!(status.bluetooth_up);
    }
}
