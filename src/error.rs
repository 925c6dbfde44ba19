//! Domain error types.
//!
//! Everything here is recoverable by the component that raised it; the main
//! loop itself works in `anyhow::Result` and treats anything it sees as fatal.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to mount {device} at {mount_point}: {reason}")]
    Mount {
        device: PathBuf,
        mount_point: PathBuf,
        reason: String,
    },

    #[error("failed to unmount {mount_point}: {reason}")]
    Unmount { mount_point: PathBuf, reason: String },

    #[error("failed to spawn {program}: {reason}")]
    ProcessSpawn { program: String, reason: String },

    #[error("failed to kill pid {pid}: {reason}")]
    Kill { pid: u32, reason: String },

    #[error("`{command}` failed: {reason}")]
    Command { command: String, reason: String },

    #[error("configuration error: {message}")]
    Config { message: String },

    #[error("terminal error while trying to {action}: {source}")]
    Terminal {
        action: &'static str,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// For `map_err` on a crossterm or ratatui call.
    pub fn terminal(action: &'static str) -> impl FnOnce(std::io::Error) -> Self {
        move |source| Self::Terminal { action, source }
    }
}
