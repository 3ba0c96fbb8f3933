use ratatui::{
    Frame,
    layout::{Constraint, Flex, Rect},
    style::{Color, Style, Stylize},
    text::Line,
    widgets::{Block, BorderType, Borders, Padding, Row, Table, TableState},
};

use crate::app::FocusedBlock;
use crate::radio::ScannedNetwork;
use crate::store::KnownNetwork;

/// A visible network, merged with its saved record when one exists.
#[derive(Debug, Clone, PartialEq)]
pub struct WifiEntry {
    pub ssid: String,
    pub strength: u8,
    pub secured: bool,
    pub auto_connect: bool,
    pub connected: bool,
}

/// What the current selection in the known-networks table points at.
#[derive(Debug, Clone, PartialEq)]
pub enum KnownSelection {
    Visible(WifiEntry),
    OutOfRange(String),
}

/// Split a scan result against the saved records: visible known
/// networks, visible new networks, and saved networks that did not
/// show up in the scan.
pub fn categorize(
    scanned: &[ScannedNetwork],
    saved: &[(String, KnownNetwork)],
    connected: Option<&str>,
) -> (Vec<WifiEntry>, Vec<WifiEntry>, Vec<(String, KnownNetwork)>) {
    let mut known = Vec::new();
    let mut new = Vec::new();

    for network in scanned {
        let record = saved.iter().find(|(ssid, _)| *ssid == network.ssid);
        let entry = WifiEntry {
            ssid: network.ssid.clone(),
            strength: network.strength,
            secured: network.secured,
            auto_connect: record.map(|(_, r)| r.auto_connect).unwrap_or(false),
            connected: connected == Some(network.ssid.as_str()),
        };

        if record.is_some() {
            known.push(entry);
        } else {
            new.push(entry);
        }
    }

    let out_of_range = saved
        .iter()
        .filter(|(ssid, _)| !scanned.iter().any(|n| n.ssid == *ssid))
        .cloned()
        .collect();

    (known, new, out_of_range)
}

pub struct WifiPanel {
    pub known_networks: Vec<WifiEntry>,
    pub new_networks: Vec<WifiEntry>,
    pub out_of_range: Vec<(String, KnownNetwork)>,
    pub show_out_of_range: bool,
    pub known_state: TableState,
    pub new_state: TableState,
    pub is_scanning: bool,
    pub connected: Option<String>,
    last_scan: Vec<ScannedNetwork>,
}

impl Default for WifiPanel {
    fn default() -> Self {
        Self {
            known_networks: Vec::new(),
            new_networks: Vec::new(),
            out_of_range: Vec::new(),
            show_out_of_range: true,
            known_state: TableState::default(),
            new_state: TableState::default(),
            is_scanning: false,
            connected: None,
            last_scan: Vec::new(),
        }
    }
}

impl WifiPanel {
    /// Fold a finished scan into the panel, preserving the selection
    /// when the visible set did not change.
    pub fn apply_scan(
        &mut self,
        scanned: &[ScannedNetwork],
        saved: &[(String, KnownNetwork)],
        connected: Option<String>,
    ) {
        let (known, new, out_of_range) = categorize(scanned, saved, connected.as_deref());

        Self::update_list(&mut self.known_networks, &mut self.known_state, known);
        Self::update_list(&mut self.new_networks, &mut self.new_state, new);
        self.out_of_range = out_of_range;
        self.connected = connected;
        self.last_scan = scanned.to_vec();
        self.is_scanning = false;
    }

    /// Re-split the last scan against fresh records, without waiting
    /// for another scan. Used after a forget or an autoconnect toggle.
    pub fn apply_records(&mut self, saved: &[(String, KnownNetwork)]) {
        let scanned = std::mem::take(&mut self.last_scan);
        let connected = self.connected.take();
        self.apply_scan(&scanned, saved, connected);
    }

    fn update_list(current: &mut Vec<WifiEntry>, state: &mut TableState, fresh: Vec<WifiEntry>) {
        let same_set = current.len() == fresh.len()
            && current
                .iter()
                .all(|e| fresh.iter().any(|f| f.ssid == e.ssid));

        if !same_set {
            *state = super::table_state_for(&fresh);
        }
        *current = fresh;
    }

    fn known_rows(&self) -> usize {
        if self.show_out_of_range {
            self.known_networks.len() + self.out_of_range.len()
        } else {
            self.known_networks.len()
        }
    }

    pub fn selected_known(&self) -> Option<KnownSelection> {
        let index = self.known_state.selected()?;
        if index < self.known_networks.len() {
            return Some(KnownSelection::Visible(self.known_networks[index].clone()));
        }
        if self.show_out_of_range {
            let index = index - self.known_networks.len();
            if let Some((ssid, _)) = self.out_of_range.get(index) {
                return Some(KnownSelection::OutOfRange(ssid.clone()));
            }
        }
        None
    }

    pub fn selected_new(&self) -> Option<&WifiEntry> {
        self.new_networks.get(self.new_state.selected()?)
    }

    pub fn scroll_down_known(&mut self) {
        let rows = self.known_rows();
        super::scroll_down(&mut self.known_state, rows);
    }

    pub fn scroll_up_known(&mut self) {
        let rows = self.known_rows();
        super::scroll_up(&mut self.known_state, rows);
    }

    pub fn scroll_down_new(&mut self) {
        super::scroll_down(&mut self.new_state, self.new_networks.len());
    }

    pub fn scroll_up_new(&mut self) {
        super::scroll_up(&mut self.new_state, self.new_networks.len());
    }

    fn signal_cell(strength: u8) -> String {
        match strength {
            n if n >= 75 => format!("{strength:3}% 󰤨"),
            n if (50..75).contains(&n) => format!("{strength:3}% 󰤥"),
            n if (25..50).contains(&n) => format!("{strength:3}% 󰤢"),
            _ => format!("{strength:3}% 󰤟"),
        }
    }

    pub fn render(&mut self, frame: &mut Frame, known_block: Rect, new_block: Rect, focused_block: FocusedBlock) {
        //
        // Known networks
        //
        let mut rows: Vec<Row> = self
            .known_networks
            .iter()
            .map(|entry| {
                Row::new(vec![
                    Line::from(if entry.connected { "󰖩 " } else { "" }).centered(),
                    Line::from(entry.ssid.clone()).centered(),
                    Line::from(if entry.secured { "WPA" } else { "Open" }).centered(),
                    Line::from(if entry.auto_connect { "Yes" } else { "No" }).centered(),
                    Line::from(Self::signal_cell(entry.strength)).centered(),
                ])
            })
            .collect();

        if self.show_out_of_range {
            self.out_of_range.iter().for_each(|(ssid, record)| {
                let row = Row::new(vec![
                    Line::from(""),
                    Line::from(ssid.clone()).centered(),
                    Line::from("").centered(),
                    Line::from(if record.auto_connect { "Yes" } else { "No" }).centered(),
                    Line::from("").centered(),
                ])
                .fg(Color::DarkGray);

                rows.push(row);
            });
        }

        let widths = [
            Constraint::Length(2),
            Constraint::Length(25),
            Constraint::Length(8),
            Constraint::Length(12),
            Constraint::Length(8),
        ];

        let title = if self.is_scanning {
            " Known Networks (scanning...) "
        } else {
            " Known Networks "
        };

        let known_networks_table = Table::new(rows, widths)
            .header({
                if focused_block == FocusedBlock::KnownNetworks {
                    Row::new(vec![
                        Line::from(""),
                        Line::from("Name").yellow().centered(),
                        Line::from("Security").yellow().centered(),
                        Line::from("Auto Connect").yellow().centered(),
                        Line::from("Signal").yellow().centered(),
                    ])
                    .style(Style::new().bold())
                    .bottom_margin(1)
                } else {
                    Row::new(vec![
                        Line::from(""),
                        Line::from("Name").centered(),
                        Line::from("Security").centered(),
                        Line::from("Auto Connect").centered(),
                        Line::from("Signal").centered(),
                    ])
                    .bottom_margin(1)
                }
            })
            .block(
                Block::default()
                    .title(title)
                    .title_style({
                        if focused_block == FocusedBlock::KnownNetworks {
                            Style::default().bold()
                        } else {
                            Style::default()
                        }
                    })
                    .borders(Borders::ALL)
                    .border_style({
                        if focused_block == FocusedBlock::KnownNetworks {
                            Style::default().fg(Color::Green)
                        } else {
                            Style::default()
                        }
                    })
                    .border_type({
                        if focused_block == FocusedBlock::KnownNetworks {
                            BorderType::Thick
                        } else {
                            BorderType::default()
                        }
                    })
                    .padding(Padding::horizontal(1)),
            )
            .column_spacing(1)
            .flex(Flex::SpaceAround)
            .row_highlight_style(if focused_block == FocusedBlock::KnownNetworks {
                Style::default().bg(Color::DarkGray).fg(Color::White)
            } else {
                Style::default()
            });

        frame.render_stateful_widget(known_networks_table, known_block, &mut self.known_state);

        //
        // New networks
        //
        let rows: Vec<Row> = self
            .new_networks
            .iter()
            .map(|entry| {
                Row::new(vec![
                    Line::from(entry.ssid.clone()).centered(),
                    Line::from(if entry.secured { "WPA" } else { "Open" }).centered(),
                    Line::from(Self::signal_cell(entry.strength)).centered(),
                ])
            })
            .collect();

        let widths = [
            Constraint::Length(25),
            Constraint::Length(8),
            Constraint::Length(8),
        ];

        let new_networks_table = Table::new(rows, widths)
            .header({
                if focused_block == FocusedBlock::NewNetworks {
                    Row::new(vec![
                        Line::from("Name").yellow().centered(),
                        Line::from("Security").yellow().centered(),
                        Line::from("Signal").yellow().centered(),
                    ])
                    .style(Style::new().bold())
                    .bottom_margin(1)
                } else {
                    Row::new(vec![
                        Line::from("Name").centered(),
                        Line::from("Security").centered(),
                        Line::from("Signal").centered(),
                    ])
                    .bottom_margin(1)
                }
            })
            .block(
                Block::default()
                    .title(" New Networks ")
                    .title_style({
                        if focused_block == FocusedBlock::NewNetworks {
                            Style::default().bold()
                        } else {
                            Style::default()
                        }
                    })
                    .borders(Borders::ALL)
                    .border_style({
                        if focused_block == FocusedBlock::NewNetworks {
                            Style::default().fg(Color::Green)
                        } else {
                            Style::default()
                        }
                    })
                    .border_type({
                        if focused_block == FocusedBlock::NewNetworks {
                            BorderType::Thick
                        } else {
                            BorderType::default()
                        }
                    })
                    .padding(Padding::horizontal(1)),
            )
            .column_spacing(1)
            .flex(Flex::SpaceAround)
            .row_highlight_style(if focused_block == FocusedBlock::NewNetworks {
                Style::default().bg(Color::DarkGray).fg(Color::White)
            } else {
                Style::default()
            });

        frame.render_stateful_widget(new_networks_table, new_block, &mut self.new_state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scanned(ssid: &str, strength: u8, secured: bool) -> ScannedNetwork {
        ScannedNetwork {
            ssid: ssid.to_string(),
            strength,
            secured,
        }
    }

    fn saved(ssid: &str, auto_connect: bool) -> (String, KnownNetwork) {
        (
            ssid.to_string(),
            KnownNetwork {
                password: "pw".to_string(),
                auto_connect,
                last_connected: None,
            },
        )
    }

    #[test]
    fn categorize_splits_known_new_and_out_of_range() {
        let scan = [scanned("Home", 60, true), scanned("Cafe", 40, false)];
        let records = [saved("Home", true), saved("Office", false)];

        let (known, new, out_of_range) = categorize(&scan, &records, Some("Home"));

        assert_eq!(known.len(), 1);
        assert_eq!(known[0].ssid, "Home");
        assert!(known[0].connected);
        assert!(known[0].auto_connect);

        assert_eq!(new.len(), 1);
        assert_eq!(new[0].ssid, "Cafe");
        assert!(!new[0].connected);

        assert_eq!(out_of_range.len(), 1);
        assert_eq!(out_of_range[0].0, "Office");
    }

    #[test]
    fn apply_scan_preserves_selection_for_the_same_set() {
        let mut panel = WifiPanel::default();
        let records = [saved("Home", true), saved("Office", true)];

        panel.apply_scan(
            &[scanned("Home", 60, true), scanned("Office", 50, true)],
            &records,
            None,
        );
        panel.scroll_down_known();
        assert_eq!(panel.known_state.selected(), Some(1));

        // Same ssids, fresh strengths: the cursor stays put.
        panel.apply_scan(
            &[scanned("Home", 30, true), scanned("Office", 70, true)],
            &records,
            None,
        );
        assert_eq!(panel.known_state.selected(), Some(1));
        assert_eq!(panel.known_networks[0].strength, 30);

        // A different set resets the cursor to the top.
        panel.apply_scan(&[scanned("Home", 30, true)], &records, None);
        assert_eq!(panel.known_state.selected(), Some(0));
    }

    #[test]
    fn selection_past_the_visible_rows_resolves_to_out_of_range() {
        let mut panel = WifiPanel::default();
        let records = [saved("Home", true), saved("Office", true)];
        panel.apply_scan(&[scanned("Home", 60, true)], &records, None);

        panel.scroll_down_known();
        assert_eq!(
            panel.selected_known(),
            Some(KnownSelection::OutOfRange("Office".to_string()))
        );
    }

    #[test]
    fn known_scroll_is_bounded_by_visible_plus_out_of_range_rows() {
        let mut panel = WifiPanel::default();
        let records = [saved("Home", true), saved("Office", true)];
        panel.apply_scan(&[scanned("Home", 60, true)], &records, None);

        // One visible row plus one out-of-range row: the cursor stops
        // at the last of the two.
        panel.scroll_down_known();
        panel.scroll_down_known();
        panel.scroll_down_known();
        assert_eq!(panel.known_state.selected(), Some(1));

        panel.scroll_up_known();
        assert_eq!(panel.known_state.selected(), Some(0));
    }

    #[test]
    fn scrolling_an_empty_list_selects_nothing() {
        let mut panel = WifiPanel::default();
        panel.scroll_down_new();
        assert_eq!(panel.new_state.selected(), None);
    }
}
