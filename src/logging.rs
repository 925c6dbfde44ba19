//! Logging configuration using tracing.
//!
//! The terminal belongs to the menu (and later to the emulator), so logs go
//! to a daily rolling file under `~/.local/share/rom-kiosk/logs/`. The level
//! is controlled by the `ROM_KIOSK_LOG` environment variable:
//!
//! ```bash
//! ROM_KIOSK_LOG=debug rom-kiosk
//! ```

use std::path::PathBuf;

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::Result;

pub fn init() -> Result<()> {
    let log_dir = log_directory();
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, "rom-kiosk.log");

    let env_filter = EnvFilter::try_from_env("ROM_KIOSK_LOG")
        .unwrap_or_else(|_| EnvFilter::new("rom_kiosk=info,warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true)
                .with_thread_names(true)
                .with_line_number(true),
        )
        .init();

    tracing::info!("rom-kiosk starting, logging to {}", log_dir.display());
    Ok(())
}

fn log_directory() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join("rom-kiosk").join("logs")
}
