//! Terminal UI: `TuiState`/`Command`/`Screen` (spec §3's core-relevant
//! subset) and the `ratatui` frame renderer driven by them. The event loop
//! itself (key reads, frame pacing, sampler polling) lives in `main.rs`
//! since it is the one piece of this crate that is an "external
//! collaborator" per spec §1 — `tui::state` and `tui::render` expose
//! everything the loop needs as plain functions over owned state.

pub mod render;
pub mod state;

pub use render::draw;
pub use state::{apply_command, Command, Screen, TimelineView, TuiState};

/// Maps a crossterm key event to a `Command`, grounded in
/// `original_source/src/aiz/tui/tui_core.cpp`'s `keyToCommand` switch.
/// Kept here (rather than in `main.rs`) so the keymap is unit-testable
/// without a real terminal.
pub fn key_to_command(code: crossterm::event::KeyCode) -> Option<Command> {
    use crossterm::event::KeyCode;
    match code {
        KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => Some(Command::Quit),
        KeyCode::Char('h') | KeyCode::Char('H') => Some(Command::NavHelp),
        KeyCode::Char('w') | KeyCode::Char('W') => Some(Command::NavHardware),
        KeyCode::Char('b') | KeyCode::Char('B') => Some(Command::NavBenchmarks),
        KeyCode::Char('c') | KeyCode::Char('C') => Some(Command::NavConfig),
        KeyCode::Char('m') | KeyCode::Char('M') => Some(Command::NavMinimal),
        KeyCode::Char('t') | KeyCode::Char('T') => Some(Command::ViewTimelines),
        KeyCode::Char('r') | KeyCode::Char('R') => Some(Command::ViewBars),
        KeyCode::Backspace => Some(Command::Back),
        KeyCode::Up => Some(Command::Up),
        KeyCode::Down => Some(Command::Down),
        KeyCode::Left => Some(Command::Left),
        KeyCode::Right => Some(Command::Right),
        KeyCode::Char(' ') => Some(Command::Toggle),
        KeyCode::Char('d') | KeyCode::Char('D') => Some(Command::Defaults),
        KeyCode::Char('s') | KeyCode::Char('S') => Some(Command::Save),
        KeyCode::Enter => Some(Command::Activate),
        KeyCode::Char('+') | KeyCode::Char('=') => Some(Command::IncreaseRefresh),
        KeyCode::Char('-') => Some(Command::DecreaseRefresh),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyCode;

    #[test]
    fn quit_keys_map_to_quit_command() {
        assert_eq!(key_to_command(KeyCode::Char('q')), Some(Command::Quit));
        assert_eq!(key_to_command(KeyCode::Esc), Some(Command::Quit));
    }

    #[test]
    fn nav_keys_are_case_insensitive() {
        assert_eq!(key_to_command(KeyCode::Char('b')), Some(Command::NavBenchmarks));
        assert_eq!(key_to_command(KeyCode::Char('B')), Some(Command::NavBenchmarks));
    }

    #[test]
    fn unmapped_key_returns_none() {
        assert_eq!(key_to_command(KeyCode::Char('z')), None);
    }
}
