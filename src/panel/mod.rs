pub mod bluetooth;
pub mod wifi;

use ratatui::widgets::TableState;

/// Create a TableState with the first item selected if the list is non-empty.
fn table_state_for<T>(items: &[T]) -> TableState {
    let mut state = TableState::default();
    state.select(if items.is_empty() { None } else { Some(0) });
    state
}

fn scroll_down(state: &mut TableState, len: usize) {
    if len == 0 {
        return;
    }
    let i = match state.selected() {
        Some(i) if i < len - 1 => i + 1,
        Some(i) => i,
        None => 0,
    };
    state.select(Some(i));
}

fn scroll_up(state: &mut TableState, len: usize) {
    if len == 0 {
        return;
    }
    let i = match state.selected() {
        Some(i) => i.saturating_sub(1),
        None => 0,
    };
    state.select(Some(i));
}
