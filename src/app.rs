use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tui_input::Input;

use crate::config::Config;
use crate::event::Event;
use crate::manager::NetworkStateManager;
use crate::notification::Notification;
use crate::panel::bluetooth::BluetoothPanel;
use crate::panel::wifi::WifiPanel;
use crate::radio::RadioStatus;

/// UI tick cadence; the periodic poll and rescan counters below are
/// expressed in these ticks.
pub const TICK_RATE: Duration = Duration::from_millis(500);

const TICKS_PER_SECOND: u64 = 2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FocusedBlock {
    KnownNetworks,
    NewNetworks,
    Devices,
    PasswordInput,
}

pub struct App {
    pub running: bool,
    pub focused_block: FocusedBlock,
    pub notifications: Vec<Notification>,
    pub config: Arc<Config>,
    pub manager: Arc<NetworkStateManager>,
    pub sender: UnboundedSender<Event>,
    pub wifi: WifiPanel,
    pub bluetooth: BluetoothPanel,
    pub status: RadioStatus,
    pub password_input: Input,
    /// The ssid a password is being typed for.
    pub pending_auth: Option<String>,
    ticks: u64,
}

impl App {
    pub fn new(
        sender: UnboundedSender<Event>,
        config: Arc<Config>,
        manager: Arc<NetworkStateManager>,
    ) -> Self {
        Self {
            running: true,
            focused_block: FocusedBlock::KnownNetworks,
            notifications: Vec::new(),
            config,
            manager,
            sender,
            wifi: WifiPanel::default(),
            bluetooth: BluetoothPanel::default(),
            status: RadioStatus::default(),
            password_input: Input::default(),
            pending_auth: None,
            ticks: 0,
        }
    }

    /// One UI tick: age the toasts and kick the periodic background
    /// work. The status poll and the rescan run off the UI loop and
    /// report back through the event channel.
    pub fn tick(&mut self) {
        self.notifications.retain(|n| n.ttl > 0);
        self.notifications.iter_mut().for_each(|n| n.ttl -= 1);

        self.ticks += 1;

        if self.ticks % (self.config.status_poll_secs * TICKS_PER_SECOND) == 0 {
            let manager = self.manager.clone();
            let sender = self.sender.clone();
            tokio::spawn(async move {
                let status = manager.query_status().await;
                let _ = sender.send(Event::StatusUpdated(status));
            });
        }

        if self.ticks % (self.config.scan_refresh_secs * TICKS_PER_SECOND) == 0 {
            self.wifi.is_scanning = true;
            self.manager.spawn_wifi_scan(self.sender.clone());
        }
    }

    pub fn quit(&mut self) {
        self.running = false;
    }
}
