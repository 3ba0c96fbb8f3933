use anyhow::Result;
use ratatui::DefaultTerminal;

use crate::app::App;
use crate::ui;

/// Terminal lifecycle wrapper: raw mode and the alternate screen are
/// owned here so the main loop only ever asks for a draw.
pub struct Tui {
    terminal: DefaultTerminal,
}

impl Tui {
    pub fn init() -> Self {
        Self {
            terminal: ratatui::init(),
        }
    }

    pub fn draw(&mut self, app: &mut App) -> Result<()> {
        self.terminal.draw(|frame| ui::render(app, frame))?;
        Ok(())
    }

    pub fn restore() {
        ratatui::restore();
    }
}
