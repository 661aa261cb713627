//! Non-blocking raw-mode keypress reader, ported from the reference
//! `KeyboardHandler` (cbreak mode + `select`) onto `crossterm`'s raw mode
//! and event polling. Terminal settings are restored on drop so an abnormal
//! exit never leaves the user's shell in raw mode.

use std::time::Duration;

use crossterm::event::{self, Event, KeyCode};
use crossterm::terminal;
use tracing::warn;

use crate::gait::library::Action;

/// Logical key recognised by the teleop/autonomy input loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Action(Action),
    TogglePause,
    Quit,
}

/// Owns the raw-mode terminal state. Constructing this enables raw mode;
/// dropping it restores the terminal.
pub struct InputSource {
    enabled: bool,
}

impl InputSource {
    pub fn new() -> Self {
        match terminal::enable_raw_mode() {
            Ok(()) => Self { enabled: true },
            Err(e) => {
                warn!(error = %e, "failed to enable raw terminal mode, keyboard input disabled");
                Self { enabled: false }
            }
        }
    }

    /// Poll for a keypress without blocking. Returns `None` if no key is
    /// currently available or raw mode could not be enabled.
    ///
    /// `autonomy` selects which key set is active: in autonomy mode `q`
    /// quits (per SPEC_FULL.md section 4.7) and space toggles the pause
    /// gate instead of issuing a `Stop` action.
    pub fn try_read_key(&self, autonomy: bool) -> Option<Key> {
        if !self.enabled {
            return None;
        }
        if !event::poll(Duration::from_millis(0)).unwrap_or(false) {
            return None;
        }
        let Ok(Event::Key(key_event)) = event::read() else {
            return None;
        };
        map_key(key_event.code, autonomy)
    }
}

impl Default for InputSource {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InputSource {
    fn drop(&mut self) {
        if self.enabled {
            let _ = terminal::disable_raw_mode();
        }
    }
}

/// Map a raw key code to a logical [`Key`]. `q` and space are
/// mode-dependent: in teleop, `q` drives and space stops; in autonomy, `q`
/// quits (there is no drive mapping to override) and space toggles pause.
fn map_key(code: KeyCode, autonomy: bool) -> Option<Key> {
    match code {
        KeyCode::Char('z') => Some(Key::Action(Action::Forward)),
        KeyCode::Char('s') => Some(Key::Action(Action::Backward)),
        KeyCode::Char('q') if autonomy => Some(Key::Quit),
        KeyCode::Char('q') => Some(Key::Action(Action::SlideLeft)),
        KeyCode::Char('d') => Some(Key::Action(Action::SlideRight)),
        KeyCode::Char('a') => Some(Key::Action(Action::PivotLeft)),
        KeyCode::Char('e') => Some(Key::Action(Action::PivotRight)),
        KeyCode::Char(' ') if autonomy => Some(Key::TogglePause),
        KeyCode::Char(' ') => Some(Key::Action(Action::Stop)),
        KeyCode::Char('p') => Some(Key::TogglePause),
        KeyCode::Char('x') | KeyCode::Esc => Some(Key::Quit),
        _ => None,
    }
}
