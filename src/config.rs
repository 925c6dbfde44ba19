//! Settings parser for the kiosk's `config.toml`.
//!
//! Every field has a default so a partial (or missing) file still yields a
//! usable configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/rom-kiosk/config.toml";

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub catalog: CatalogSettings,
    pub media: MediaSettings,
    pub emulator: EmulatorSettings,
    pub menu: MenuSettings,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct CatalogSettings {
    /// Directory the menu lists and USB copies land in.
    pub dir: PathBuf,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./roms"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct MediaSettings {
    /// Where device nodes appear (devtmpfs).
    pub watch_dir: PathBuf,
    /// sysfs view of block devices, used to tell partitions apart.
    pub sys_block_dir: PathBuf,
    pub mount_root: PathBuf,
    pub extensions: Vec<String>,
    /// macOS resource-fork companions (`._game.nes`) are never copied.
    pub sidecar_prefix: String,
    pub debounce_ms: u64,
}

impl Default for MediaSettings {
    fn default() -> Self {
        Self {
            watch_dir: PathBuf::from("/dev"),
            sys_block_dir: PathBuf::from("/sys/class/block"),
            mount_root: PathBuf::from("/mnt"),
            extensions: ["rom", "nes", "sfc", "gba"]
                .into_iter()
                .map(String::from)
                .collect(),
            sidecar_prefix: String::from("._"),
            debounce_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmulatorSettings {
    pub command: String,
    /// Extra arguments placed before the ROM path.
    pub args: Vec<String>,
    /// Privilege wrapper for the emulator, mount and kill. Empty disables it.
    pub privilege: String,
    pub poll_interval_ms: u64,
}

impl Default for EmulatorSettings {
    fn default() -> Self {
        Self {
            command: String::from("/usr/games/mednafen"),
            args: Vec::new(),
            privilege: String::from("sudo"),
            poll_interval_ms: 50,
        }
    }
}

impl EmulatorSettings {
    pub fn privilege(&self) -> Option<&str> {
        let wrapper = self.privilege.trim();
        (!wrapper.is_empty()).then_some(wrapper)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct MenuSettings {
    pub fps: u32,
    /// Cells moved per arrow key press.
    pub cursor_step: u16,
}

impl Default for MenuSettings {
    fn default() -> Self {
        Self {
            fps: 60,
            cursor_step: 1,
        }
    }
}

impl MenuSettings {
    pub fn frame_duration(&self) -> Duration {
        Duration::from_secs(1) / self.fps.max(1)
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.menu.fps == 0 {
            return Err(Error::config("menu.fps must be at least 1"));
        }
        if self.emulator.command.trim().is_empty() {
            return Err(Error::config("emulator.command must not be empty"));
        }
        if self.media.extensions.is_empty() {
            return Err(Error::config("media.extensions must list at least one extension"));
        }
        Ok(())
    }
}

/// Load settings from `path`, falling back to defaults when the file is
/// missing or unreadable.
pub fn load_settings(path: &Path) -> Settings {
    if !path.exists() {
        debug!("No config file at {:?}, using defaults", path);
        return Settings::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(settings) => {
                debug!("Loaded settings from {:?}", path);
                settings
            }
            Err(e) => {
                warn!("Failed to parse {:?}: {}", path, e);
                Settings::default()
            }
        },
        Err(e) => {
            warn!("Failed to read {:?}: {}", path, e);
            Settings::default()
        }
    }
}
