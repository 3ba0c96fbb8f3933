use anyhow::Result;
use std::sync::Arc;

use crate::app::{App, FocusedBlock};
use crate::config::Config;
use crate::event::Event;
use crate::panel::wifi::KnownSelection;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tokio::sync::mpsc::UnboundedSender;
use tui_input::backend::crossterm::EventHandler;

/// Connect or disconnect whatever the focused table points at. The
/// manager work runs in a spawned task; the panels refresh when the
/// task reports back through the event channel.
pub fn toggle_connect(app: &mut App, sender: UnboundedSender<Event>) {
    match app.focused_block {
        FocusedBlock::KnownNetworks => {
            let ssid = match app.wifi.selected_known() {
                Some(KnownSelection::Visible(entry)) => entry.ssid,
                Some(KnownSelection::OutOfRange(ssid)) => ssid,
                None => return,
            };
            if app.wifi.connected.as_deref() == Some(ssid.as_str()) {
                // Already associated with this network.
                return;
            }
            let manager = app.manager.clone();
            tokio::spawn(async move {
                let _ = manager.connect_known_wifi(&ssid).await;
                let _ = sender.send(Event::RecordsUpdated);
                manager.spawn_wifi_scan(sender);
            });
        }

        FocusedBlock::NewNetworks => {
            let Some(entry) = app.wifi.selected_new() else {
                return;
            };

            if entry.secured {
                // Ask for the passphrase first.
                app.pending_auth = Some(entry.ssid.clone());
                app.password_input.reset();
                app.focused_block = FocusedBlock::PasswordInput;
                return;
            }

            let ssid = entry.ssid.clone();
            let manager = app.manager.clone();
            tokio::spawn(async move {
                let _ = manager.connect_wifi(&ssid, "").await;
                let _ = sender.send(Event::RecordsUpdated);
                manager.spawn_wifi_scan(sender);
            });
        }

        FocusedBlock::Devices => {
            let Some(entry) = app.bluetooth.selected() else {
                return;
            };
            let mac = entry.mac.clone();
            let connected = entry.connected;
            let manager = app.manager.clone();
            tokio::spawn(async move {
                if connected {
                    let _ = manager.disconnect_bluetooth(&mac).await;
                } else {
                    let _ = manager.connect_bluetooth(&mac).await;
                }
                let _ = sender.send(Event::RecordsUpdated);
            });
        }

        FocusedBlock::PasswordInput => {}
    }
}

fn forget_selected(app: &mut App, sender: UnboundedSender<Event>) {
    match app.focused_block {
        FocusedBlock::KnownNetworks => {
            let ssid = match app.wifi.selected_known() {
                Some(KnownSelection::Visible(entry)) => entry.ssid,
                Some(KnownSelection::OutOfRange(ssid)) => ssid,
                None => return,
            };
            let manager = app.manager.clone();
            tokio::spawn(async move {
                let _ = manager.forget_wifi(&ssid).await;
                let _ = sender.send(Event::RecordsUpdated);
            });
        }

        FocusedBlock::Devices => {
            let Some(entry) = app.bluetooth.selected() else {
                return;
            };
            if !entry.paired {
                return;
            }
            let mac = entry.mac.clone();
            let manager = app.manager.clone();
            tokio::spawn(async move {
                let _ = manager.forget_bluetooth(&mac).await;
                let _ = sender.send(Event::RecordsUpdated);
            });
        }

        _ => {}
    }
}

fn toggle_autoconnect(app: &mut App, sender: UnboundedSender<Event>) {
    match app.focused_block {
        FocusedBlock::KnownNetworks => {
            let ssid = match app.wifi.selected_known() {
                Some(KnownSelection::Visible(entry)) => entry.ssid,
                Some(KnownSelection::OutOfRange(ssid)) => ssid,
                None => return,
            };
            let manager = app.manager.clone();
            tokio::spawn(async move {
                let _ = manager.toggle_wifi_autoconnect(&ssid).await;
                let _ = sender.send(Event::RecordsUpdated);
            });
        }

        FocusedBlock::Devices => {
            let Some(entry) = app.bluetooth.selected() else {
                return;
            };
            if !entry.paired {
                return;
            }
            let mac = entry.mac.clone();
            let manager = app.manager.clone();
            tokio::spawn(async move {
                let _ = manager.toggle_bluetooth_autoconnect(&mac).await;
                let _ = sender.send(Event::RecordsUpdated);
            });
        }

        _ => {}
    }
}

fn start_scan(app: &mut App, sender: UnboundedSender<Event>) {
    match app.focused_block {
        FocusedBlock::KnownNetworks | FocusedBlock::NewNetworks => {
            app.wifi.is_scanning = true;
            app.manager.spawn_wifi_scan(sender);
        }
        FocusedBlock::Devices => {
            app.bluetooth.is_scanning = true;
            app.manager.spawn_bluetooth_scan(sender);
        }
        FocusedBlock::PasswordInput => {}
    }
}

pub async fn handle_key_events(
    key_event: KeyEvent,
    app: &mut App,
    sender: UnboundedSender<Event>,
    config: Arc<Config>,
) -> Result<()> {
    if app.focused_block == FocusedBlock::PasswordInput {
        match key_event.code {
            KeyCode::Enter => {
                let password: String = app.password_input.value().into();
                app.password_input.reset();
                app.focused_block = FocusedBlock::NewNetworks;

                if let Some(ssid) = app.pending_auth.take() {
                    let manager = app.manager.clone();
                    tokio::spawn(async move {
                        let _ = manager.connect_wifi(&ssid, &password).await;
                        let _ = sender.send(Event::RecordsUpdated);
                        manager.spawn_wifi_scan(sender);
                    });
                }
            }

            KeyCode::Esc => {
                app.password_input.reset();
                app.pending_auth = None;
                app.focused_block = FocusedBlock::NewNetworks;
            }

            _ => {
                app.password_input
                    .handle_event(&crossterm::event::Event::Key(key_event));
            }
        }
        return Ok(());
    }

    match key_event.code {
        KeyCode::Char('q') => {
            app.quit();
        }

        KeyCode::Esc => {
            // Esc first interrupts a running discovery wait.
            if app.focused_block == FocusedBlock::Devices && app.bluetooth.is_scanning {
                app.manager.cancel_discovery();
            } else if app.config.esc_quit {
                app.quit();
            }
        }

        KeyCode::Char('c' | 'C') if key_event.modifiers == KeyModifiers::CONTROL => {
            app.quit();
        }

        KeyCode::Tab => {
            app.focused_block = match app.focused_block {
                FocusedBlock::KnownNetworks => FocusedBlock::NewNetworks,
                FocusedBlock::NewNetworks => FocusedBlock::Devices,
                FocusedBlock::Devices => FocusedBlock::KnownNetworks,
                other => other,
            };
        }

        KeyCode::BackTab => {
            app.focused_block = match app.focused_block {
                FocusedBlock::KnownNetworks => FocusedBlock::Devices,
                FocusedBlock::NewNetworks => FocusedBlock::KnownNetworks,
                FocusedBlock::Devices => FocusedBlock::NewNetworks,
                other => other,
            };
        }

        KeyCode::Enter | KeyCode::Char(' ') => {
            toggle_connect(app, sender);
        }

        KeyCode::Char('j') | KeyCode::Down => match app.focused_block {
            FocusedBlock::KnownNetworks => app.wifi.scroll_down_known(),
            FocusedBlock::NewNetworks => app.wifi.scroll_down_new(),
            FocusedBlock::Devices => app.bluetooth.scroll_down(),
            FocusedBlock::PasswordInput => {}
        },

        KeyCode::Char('k') | KeyCode::Up => match app.focused_block {
            FocusedBlock::KnownNetworks => app.wifi.scroll_up_known(),
            FocusedBlock::NewNetworks => app.wifi.scroll_up_new(),
            FocusedBlock::Devices => app.bluetooth.scroll_up(),
            FocusedBlock::PasswordInput => {}
        },

        KeyCode::Char(c) if c == config.keys.scan => {
            start_scan(app, sender);
        }

        KeyCode::Char(c) if c == config.keys.forget => {
            forget_selected(app, sender);
        }

        KeyCode::Char(c) if c == config.keys.toggle_autoconnect => {
            toggle_autoconnect(app, sender);
        }

        KeyCode::Char(c)
            if c == config.keys.toggle_power && app.focused_block == FocusedBlock::Devices =>
        {
            let manager = app.manager.clone();
            tokio::spawn(async move {
                if let Ok(powered) = manager.toggle_bluetooth_radio().await {
                    let status = manager.query_status().await;
                    let _ = sender.send(Event::StatusUpdated(status));
                    if powered {
                        manager.spawn_bluetooth_scan(sender);
                    }
                }
            });
        }

        _ => {}
    }

    Ok(())
}
