//! Keyboard input handling for the TUI.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::{App, AppState};

/// Apply a key press to the app. Returns true when the app should exit.
pub fn handle_input(app: &mut App, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => app.quit(),
        KeyCode::Char('q') | KeyCode::Esc => app.quit(),
        KeyCode::Char('r') => app.refresh(),
        KeyCode::Home => app.navigate("/"),
        _ => {}
    }
    matches!(app.state, AppState::Quitting)
}
