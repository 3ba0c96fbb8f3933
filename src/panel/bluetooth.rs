use ratatui::{
    Frame,
    layout::{Constraint, Flex, Rect},
    style::{Color, Style, Stylize},
    text::Line,
    widgets::{Block, BorderType, Borders, Padding, Row, Table, TableState},
};

use crate::app::FocusedBlock;
use crate::radio::ScannedDevice;
use crate::store::PairedDevice;

/// A device row: either discovered in the last scan, paired, or both.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceEntry {
    pub mac: String,
    pub name: String,
    pub paired: bool,
    pub connected: bool,
    pub auto_connect: bool,
}

/// Merge discovery results with the pairing records: scanned devices
/// first, carrying their record flags, then paired devices the scan
/// did not see.
pub fn merge(scanned: &[ScannedDevice], paired: &[(String, PairedDevice)]) -> Vec<DeviceEntry> {
    let mut entries: Vec<DeviceEntry> = scanned
        .iter()
        .map(|device| {
            let record = paired.iter().find(|(mac, _)| *mac == device.mac);
            DeviceEntry {
                mac: device.mac.clone(),
                name: device.to_string(),
                paired: record.is_some(),
                connected: record.map(|(_, r)| r.connected).unwrap_or(false),
                auto_connect: record.map(|(_, r)| r.auto_connect).unwrap_or(false),
            }
        })
        .collect();

    for (mac, record) in paired {
        if !scanned.iter().any(|d| d.mac == *mac) {
            entries.push(DeviceEntry {
                mac: mac.clone(),
                name: mac.clone(),
                paired: true,
                connected: record.connected,
                auto_connect: record.auto_connect,
            });
        }
    }

    entries
}

#[derive(Default)]
pub struct BluetoothPanel {
    pub devices: Vec<DeviceEntry>,
    pub state: TableState,
    pub powered: bool,
    pub is_scanning: bool,
}

impl BluetoothPanel {
    /// Fold a finished scan into the panel, preserving the selection
    /// when the device set did not change.
    pub fn apply_scan(&mut self, scanned: &[ScannedDevice], paired: &[(String, PairedDevice)]) {
        let fresh = merge(scanned, paired);

        let same_set = self.devices.len() == fresh.len()
            && self
                .devices
                .iter()
                .all(|e| fresh.iter().any(|f| f.mac == e.mac));
        if !same_set {
            self.state = super::table_state_for(&fresh);
        }
        self.devices = fresh;
        self.is_scanning = false;
    }

    /// Refresh the record-backed flags without touching the device set.
    pub fn apply_records(&mut self, paired: &[(String, PairedDevice)]) {
        for entry in &mut self.devices {
            match paired.iter().find(|(mac, _)| *mac == entry.mac) {
                Some((_, record)) => {
                    entry.paired = true;
                    entry.connected = record.connected;
                    entry.auto_connect = record.auto_connect;
                }
                None => {
                    entry.paired = false;
                    entry.connected = false;
                    entry.auto_connect = false;
                }
            }
        }
    }

    pub fn selected(&self) -> Option<&DeviceEntry> {
        self.devices.get(self.state.selected()?)
    }

    pub fn scroll_down(&mut self) {
        super::scroll_down(&mut self.state, self.devices.len());
    }

    pub fn scroll_up(&mut self) {
        super::scroll_up(&mut self.state, self.devices.len());
    }

    pub fn render(&mut self, frame: &mut Frame, block: Rect, focused_block: FocusedBlock) {
        let rows: Vec<Row> = self
            .devices
            .iter()
            .map(|entry| {
                let row = Row::new(vec![
                    Line::from(if entry.connected { "󰂱 " } else { "" }).centered(),
                    Line::from(entry.name.clone()).centered(),
                    Line::from(entry.mac.clone()).centered(),
                    Line::from(if entry.paired { "Yes" } else { "No" }).centered(),
                    Line::from(if entry.auto_connect { "Yes" } else { "No" }).centered(),
                ]);

                if entry.paired {
                    row
                } else {
                    row.fg(Color::Gray)
                }
            })
            .collect();

        let widths = [
            Constraint::Length(2),
            Constraint::Length(20),
            Constraint::Length(17),
            Constraint::Length(6),
            Constraint::Length(12),
        ];

        let title = match (self.powered, self.is_scanning) {
            (false, _) => " Bluetooth (off) ",
            (true, true) => " Bluetooth (scanning...) ",
            (true, false) => " Bluetooth ",
        };

        let devices_table = Table::new(rows, widths)
            .header({
                if focused_block == FocusedBlock::Devices {
                    Row::new(vec![
                        Line::from(""),
                        Line::from("Name").yellow().centered(),
                        Line::from("Address").yellow().centered(),
                        Line::from("Paired").yellow().centered(),
                        Line::from("Auto Connect").yellow().centered(),
                    ])
                    .style(Style::new().bold())
                    .bottom_margin(1)
                } else {
                    Row::new(vec![
                        Line::from(""),
                        Line::from("Name").centered(),
                        Line::from("Address").centered(),
                        Line::from("Paired").centered(),
                        Line::from("Auto Connect").centered(),
                    ])
                    .bottom_margin(1)
                }
            })
            .block(
                Block::default()
                    .title(title)
                    .title_style({
                        if focused_block == FocusedBlock::Devices {
                            Style::default().bold()
                        } else {
                            Style::default()
                        }
                    })
                    .borders(Borders::ALL)
                    .border_style({
                        if focused_block == FocusedBlock::Devices {
                            Style::default().fg(Color::Blue)
                        } else {
                            Style::default()
                        }
                    })
                    .border_type({
                        if focused_block == FocusedBlock::Devices {
                            BorderType::Thick
                        } else {
                            BorderType::default()
                        }
                    })
                    .padding(Padding::horizontal(1)),
            )
            .column_spacing(1)
            .flex(Flex::SpaceAround)
            .row_highlight_style(if focused_block == FocusedBlock::Devices {
                Style::default().bg(Color::DarkGray).fg(Color::White)
            } else {
                Style::default()
            });

        frame.render_stateful_widget(devices_table, block, &mut self.state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scanned(mac: &str, name: &str) -> ScannedDevice {
        ScannedDevice {
            mac: mac.to_string(),
            name: name.to_string(),
        }
    }

    fn paired(mac: &str, connected: bool) -> (String, PairedDevice) {
        (
            mac.to_string(),
            PairedDevice {
                auto_connect: true,
                connected,
                last_connected: None,
            },
        )
    }

    #[test]
    fn merge_carries_record_flags_onto_scanned_devices() {
        let scan = [
            scanned("AA:BB:CC:DD:EE:FF", "Speaker"),
            scanned("11:22:33:44:55:66", "Headset"),
        ];
        let records = [paired("AA:BB:CC:DD:EE:FF", true)];

        let entries = merge(&scan, &records);
        assert_eq!(entries.len(), 2);
        assert!(entries[0].paired);
        assert!(entries[0].connected);
        assert!(!entries[1].paired);
    }

    #[test]
    fn merge_appends_paired_devices_the_scan_missed() {
        let records = [paired("AA:BB:CC:DD:EE:FF", false)];
        let entries = merge(&[], &records);

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "AA:BB:CC:DD:EE:FF");
        assert!(entries[0].paired);
    }

    #[test]
    fn apply_records_clears_flags_for_forgotten_devices() {
        let mut panel = BluetoothPanel::default();
        panel.apply_scan(
            &[scanned("AA:BB:CC:DD:EE:FF", "Speaker")],
            &[paired("AA:BB:CC:DD:EE:FF", true)],
        );
        assert!(panel.devices[0].paired);

        panel.apply_records(&[]);
        assert!(!panel.devices[0].paired);
        assert!(!panel.devices[0].connected);
    }
}
