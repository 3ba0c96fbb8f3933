use chrono::Local;
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, Padding, Paragraph},
};

use crate::app::{App, FocusedBlock};

/// Map a radio state to its status-bar label and color. Kept free of
/// any probing so the status bar is a pure function of the last poll.
pub fn status_presentation(up: bool) -> (&'static str, Color) {
    if up {
        ("up", Color::Green)
    } else {
        ("down", Color::Red)
    }
}

fn render_status_bar(app: &App, frame: &mut Frame, block: Rect) {
    let (wifi_label, wifi_color) = status_presentation(app.status.wifi_up);
    let (bt_label, bt_color) = status_presentation(app.status.bluetooth_up);

    let wifi_text = match &app.wifi.connected {
        Some(ssid) => format!("WiFi: {ssid}"),
        None => format!("WiFi: {wifi_label}"),
    };

    let status = Line::from(vec![
        Span::from(" 󰖩 "),
        Span::styled(wifi_text, Style::default().fg(wifi_color)),
        Span::from("  󰂯 "),
        Span::styled(
            format!("Bluetooth: {bt_label}"),
            Style::default().fg(bt_color),
        ),
    ]);

    let clock = Line::from(Local::now().format("%H:%M").to_string()).right_aligned();

    let bar = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .padding(Padding::horizontal(1));
    let inner = bar.inner(block);

    frame.render_widget(bar, block);
    frame.render_widget(Paragraph::new(status), inner);
    frame.render_widget(Paragraph::new(clock), inner);
}

fn render_help(app: &App, frame: &mut Frame, block: Rect) {
    let keys = &app.config.keys;
    let help = Line::from(format!(
        " Tab: switch | Enter: connect | {}: scan | {}: forget | {}: autoconnect | {}: power | q: quit",
        keys.scan, keys.forget, keys.toggle_autoconnect, keys.toggle_power
    ))
    .dark_gray();

    frame.render_widget(Paragraph::new(help), block);
}

fn render_password_popup(app: &App, frame: &mut Frame) {
    let Some(ssid) = &app.pending_auth else {
        return;
    };

    let area = frame.area();
    let width = 50.min(area.width.saturating_sub(4));
    let height = 3;
    let popup = Rect {
        x: area.width.saturating_sub(width) / 2,
        y: area.height.saturating_sub(height) / 2,
        width,
        height,
    };

    // Echo dots, not the passphrase.
    let masked = "*".repeat(app.password_input.value().chars().count());

    let body = Paragraph::new(masked).block(
        Block::default()
            .title(format!(" Passphrase for {ssid} "))
            .title_style(Style::default().bold())
            .borders(Borders::ALL)
            .border_type(BorderType::Thick)
            .border_style(Style::default().fg(Color::Green))
            .padding(Padding::horizontal(1)),
    );

    frame.render_widget(Clear, popup);
    frame.render_widget(body, popup);

    let cursor_x = popup.x + 2 + app.password_input.visual_cursor() as u16;
    frame.set_cursor_position((cursor_x.min(popup.right().saturating_sub(2)), popup.y + 1));
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let (status_block, body_block, help_block) = {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Fill(1),
                Constraint::Length(1),
            ])
            .split(frame.area());
        (chunks[0], chunks[1], chunks[2])
    };

    let (wifi_column, bluetooth_column) = {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
            .split(body_block);
        (chunks[0], chunks[1])
    };

    let (known_block, new_block) = {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(wifi_column);
        (chunks[0], chunks[1])
    };

    render_status_bar(app, frame, status_block);

    let focused_block = app.focused_block;
    app.wifi.render(frame, known_block, new_block, focused_block);
    app.bluetooth.render(frame, bluetooth_column, focused_block);

    render_help(app, frame, help_block);

    if app.focused_block == FocusedBlock::PasswordInput {
        render_password_popup(app, frame);
    }

    for (index, notification) in app.notifications.iter().enumerate() {
        notification.render(index, frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_presentation_maps_state_only() {
        assert_eq!(status_presentation(true), ("up", Color::Green));
        assert_eq!(status_presentation(false), ("down", Color::Red));
    }
}
