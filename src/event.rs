use std::fmt;

/// Identifies one launch of the external program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// All events funnelled through the [`EventQueue`](crate::queue::EventQueue).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// Cursor movement sampled from the input device this tick.
    InputMoved { dx: i16, dy: i16 },
    /// The user confirmed the hovered catalog item.
    SelectionConfirmed { item: String },
    /// A removable partition was attached and its ROMs have been copied.
    MediaInserted,
    /// The external program of `session` is gone. `None` when killed by a signal.
    ProcessExited {
        session: SessionId,
        exit_code: Option<i32>,
    },
}

impl AppEvent {
    pub fn is_media_inserted(&self) -> bool {
        matches!(self, AppEvent::MediaInserted)
    }

    pub fn is_process_exited(&self) -> bool {
        matches!(self, AppEvent::ProcessExited { .. })
    }
}
