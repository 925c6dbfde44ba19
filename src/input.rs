use std::time::Duration;

use crossterm::event::{self as ct_event, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::error::{Error, Result};

/// Everything the input device reported during one menu tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickInput {
    /// Cursor deltas, oldest first.
    pub moves: Vec<(i16, i16)>,
    pub confirm: bool,
    /// Operator escape hatch (Ctrl-C).
    pub quit: bool,
}

/// Source of per-tick input samples.
pub trait InputSource {
    fn poll(&mut self) -> Result<TickInput>;
}

/// Reads whatever key presses are pending on the terminal, never blocking.
pub struct KeyboardInput {
    step: i16,
}

impl KeyboardInput {
    pub fn new(step: u16) -> Self {
        Self {
            step: i16::try_from(step.max(1)).unwrap_or(i16::MAX),
        }
    }
}

impl InputSource for KeyboardInput {
    fn poll(&mut self) -> Result<TickInput> {
        let mut input = TickInput::default();
        while ct_event::poll(Duration::ZERO).map_err(Error::terminal("poll input"))? {
            if let Event::Key(key) = ct_event::read().map_err(Error::terminal("read input"))? {
                apply_key(&mut input, key, self.step);
            }
        }
        Ok(input)
    }
}

/// Fold one key press into the tick's input.
fn apply_key(input: &mut TickInput, key: KeyEvent, step: i16) {
    if key.kind == KeyEventKind::Release {
        return;
    }
    match (key.code, key.modifiers) {
        (KeyCode::Char('c'), KeyModifiers::CONTROL) => input.quit = true,
        (KeyCode::Left | KeyCode::Char('h'), _) => input.moves.push((-step, 0)),
        (KeyCode::Right | KeyCode::Char('l'), _) => input.moves.push((step, 0)),
        (KeyCode::Up | KeyCode::Char('k'), _) => input.moves.push((0, -step)),
        (KeyCode::Down | KeyCode::Char('j'), _) => input.moves.push((0, step)),
        (KeyCode::Enter | KeyCode::Char(' '), _) => input.confirm = true,
        _ => {}
    }
}

/// Throw away anything typed while the terminal belonged to someone else.
pub fn discard_pending() -> Result<()> {
    while ct_event::poll(Duration::ZERO).map_err(Error::terminal("poll input"))? {
        ct_event::read().map_err(Error::terminal("discard pending input"))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn arrows_and_vim_keys_move() {
        let mut input = TickInput::default();
        for code in [KeyCode::Left, KeyCode::Char('j'), KeyCode::Up, KeyCode::Char('l')] {
            apply_key(&mut input, press(code), 2);
        }
        assert_eq!(input.moves, vec![(-2, 0), (0, 2), (0, -2), (2, 0)]);
        assert!(!input.confirm);
    }

    #[test]
    fn enter_confirms_and_ctrl_c_quits() {
        let mut input = TickInput::default();
        apply_key(&mut input, press(KeyCode::Enter), 1);
        assert!(input.confirm);
        assert!(!input.quit);

        apply_key(
            &mut input,
            KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL),
            1,
        );
        assert!(input.quit);
    }

    #[test]
    fn releases_are_ignored() {
        let mut input = TickInput::default();
        let mut key = press(KeyCode::Down);
        key.kind = KeyEventKind::Release;
        apply_key(&mut input, key, 1);
        assert!(input.moves.is_empty());
    }
}
