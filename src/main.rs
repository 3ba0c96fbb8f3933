use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;

use padctl::app::{self, App};
use padctl::cli;
use padctl::config::Config;
use padctl::event::{self, Event};
use padctl::handler::handle_key_events;
use padctl::manager::NetworkStateManager;
use padctl::radio::{RadioClient, SystemRunner};
use padctl::store::Store;
use padctl::tui::Tui;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let matches = cli::cli().get_matches();
    let dir = Config::resolve_dir(matches.get_one::<String>("config-dir").map(String::as_str))?;
    std::fs::create_dir_all(&dir)?;

    let config = Arc::new(Config::load(&dir)?);
    let store = Store::load(dir.join("networks.json"))?;

    let (sender, mut receiver) = mpsc::unbounded_channel();

    let radio = RadioClient::new(
        Arc::new(SystemRunner),
        config.wifi.interface.clone(),
        dir.clone(),
        config.radio_timings(),
    );
    let manager = Arc::new(NetworkStateManager::new(
        radio,
        store,
        sender.clone(),
        config.manager_timings(),
    ));

    let mut app = App::new(sender.clone(), config.clone(), manager.clone());
    let mut tui = Tui::init();

    // Reconnect saved networks and devices in the background.
    {
        let manager = manager.clone();
        tokio::spawn(async move {
            manager.autoconnect().await;
        });
    }

    // First refresh, so the panels are not empty until the user scans.
    app.wifi.is_scanning = true;
    manager.spawn_wifi_scan(sender.clone());
    app.bluetooth.is_scanning = true;
    manager.spawn_bluetooth_scan(sender.clone());
    {
        let manager = manager.clone();
        let sender = sender.clone();
        tokio::spawn(async move {
            let status = manager.query_status().await;
            let _ = sender.send(Event::StatusUpdated(status));
        });
    }

    let _pump = event::spawn_pump(sender.clone(), app::TICK_RATE);

    while app.running {
        tui.draw(&mut app)?;

        if let Some(event) = receiver.recv().await {
            match event {
                Event::Tick => app.tick(),

                Event::Key(key_event) => {
                    handle_key_events(key_event, &mut app, sender.clone(), config.clone()).await?;
                }

                Event::Notification(notification) => app.notifications.push(notification),

                Event::StatusUpdated(status) => {
                    app.status = status;
                    app.bluetooth.powered = status.bluetooth_up;
                }

                Event::WifiScanDone {
                    networks,
                    connected,
                } => {
                    let saved = manager.known_networks().await;
                    app.wifi.apply_scan(&networks, &saved, connected);
                }

                Event::BluetoothScanDone { devices } => {
                    let paired = manager.paired_devices().await;
                    app.bluetooth.apply_scan(&devices, &paired);
                }

                Event::RecordsUpdated => {
                    let saved = manager.known_networks().await;
                    app.wifi.apply_records(&saved);
                    let paired = manager.paired_devices().await;
                    app.bluetooth.apply_records(&paired);
                }
            }
        }
    }

    Tui::restore();
    Ok(())
}
