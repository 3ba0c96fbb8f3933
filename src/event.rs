use std::time::Duration;

use crossterm::event::{Event as CrosstermEvent, EventStream, KeyEvent, KeyEventKind};
use futures::{FutureExt, StreamExt};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use crate::notification::Notification;
use crate::radio::{RadioStatus, ScannedDevice, ScannedNetwork};

#[derive(Debug, Clone)]
pub enum Event {
    Tick,
    Key(KeyEvent),
    Notification(Notification),
    StatusUpdated(RadioStatus),
    WifiScanDone {
        networks: Vec<ScannedNetwork>,
        connected: Option<String>,
    },
    BluetoothScanDone {
        devices: Vec<ScannedDevice>,
    },
    /// The persisted records changed; panels should re-read them.
    RecordsUpdated,
}

/// Pump terminal input and the UI tick into the shared event channel.
/// The task ends when the receiving side goes away.
pub fn spawn_pump(sender: UnboundedSender<Event>, tick_rate: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut reader = EventStream::new();
        let mut tick = tokio::time::interval(tick_rate);

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    if sender.send(Event::Tick).is_err() {
                        break;
                    }
                }
                Some(Ok(event)) = reader.next().fuse() => {
                    if let CrosstermEvent::Key(key) = event
                        && key.kind == KeyEventKind::Press
                        && sender.send(Event::Key(key)).is_err()
                    {
                        break;
                    }
                }
            }
        }
    })
}
