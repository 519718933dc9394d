//! Key bindings: normal and vim-style.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Action from a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    MoveLeft,
    MoveRight,
    RotateCw,
    RotateCcw,
    SoftDrop,
    HardDrop,
    Quit,
    None,
}

/// Map key event to game action. Supports both normal (arrows, space) and vim (hjkl, etc.).
pub fn key_to_action(key: KeyEvent) -> Action {
    let KeyEvent { code, modifiers, .. } = key;
    if modifiers == KeyModifiers::CONTROL && code == KeyCode::Char('c') {
        return Action::Quit;
    }
    let no_mod = modifiers.is_empty() || modifiers == KeyModifiers::SHIFT;
    if !no_mod {
        return Action::None;
    }
    match code {
        KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
        KeyCode::Left | KeyCode::Char('h') => Action::MoveLeft,
        KeyCode::Right | KeyCode::Char('l') => Action::MoveRight,
        KeyCode::Up | KeyCode::Char('k' | 'i' | 'x') => Action::RotateCw,
        KeyCode::Char('u' | 'z') => Action::RotateCcw,
        KeyCode::Down | KeyCode::Char('j') => Action::SoftDrop,
        KeyCode::Enter | KeyCode::Char(' ') => Action::HardDrop,
        _ => Action::None,
    }
}
