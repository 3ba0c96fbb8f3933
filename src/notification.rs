use anyhow::Result;
use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, Padding, Paragraph, Wrap},
};
use tokio::sync::mpsc::UnboundedSender;

use crate::event::Event;

/// Toast lifetime, in UI ticks.
const NOTIFICATION_TTL: u16 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

/// The user-visible outcome of a manager operation: a transient toast
/// with a title, a message and a severity.
#[derive(Debug, Clone)]
pub struct Notification {
    pub title: String,
    pub message: String,
    pub level: NotificationLevel,
    pub ttl: u16,
}

impl Notification {
    pub fn send(
        title: impl Into<String>,
        message: impl Into<String>,
        level: NotificationLevel,
        sender: &UnboundedSender<Event>,
    ) -> Result<()> {
        sender
            .send(Event::Notification(Self {
                title: title.into(),
                message: message.into(),
                level,
                ttl: NOTIFICATION_TTL,
            }))
            .map_err(|e| anyhow::anyhow!("Failed to send notification: {}", e))?;
        Ok(())
    }

    pub fn render(&self, index: usize, frame: &mut Frame) {
        let color = match self.level {
            NotificationLevel::Info => Color::Green,
            NotificationLevel::Warning => Color::Yellow,
            NotificationLevel::Error => Color::Red,
        };

        let width = (self.message.len().max(self.title.len()) as u16 + 4).clamp(24, 50);
        let height = 4;
        let area = frame.area();
        if area.width < width + 2 {
            return;
        }

        let rect = Rect {
            x: area.width - width - 1,
            y: 1 + index as u16 * (height + 1),
            width,
            height,
        };
        if rect.bottom() >= area.height {
            return;
        }

        let body = Paragraph::new(Line::from(Span::from(self.message.clone())))
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .title(format!(" {} ", self.title))
                    .title_style(Style::default().fg(color).bold())
                    .borders(Borders::ALL)
                    .border_type(BorderType::Rounded)
                    .border_style(Style::default().fg(color))
                    .padding(Padding::horizontal(1)),
            );

        frame.render_widget(Clear, rect);
        frame.render_widget(body, rect);
    }
}
