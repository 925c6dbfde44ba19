use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::catalog;
use crate::command;
use crate::error::{Error, Result};
use crate::event::AppEvent;
use crate::queue::EventQueue;

/// Mount/unmount primitives. Implementations may need root.
pub trait MediaOps: Send + Sync + 'static {
    /// Mount `device` and return where it was mounted.
    fn mount(&self, device: &Path) -> Result<PathBuf>;
    fn unmount(&self, mount_point: &Path) -> Result<()>;
}

/// Shells out to `mount(8)` / `umount(8)` through the privilege wrapper.
#[derive(Debug, Clone)]
pub struct SystemMedia {
    mount_root: PathBuf,
    privilege: Option<String>,
}

impl SystemMedia {
    pub fn new(mount_root: impl Into<PathBuf>, privilege: Option<String>) -> Self {
        Self {
            mount_root: mount_root.into(),
            privilege,
        }
    }

    fn mount_point_for(&self, device: &Path) -> PathBuf {
        let name = device
            .file_name()
            .unwrap_or_else(|| OsStr::new("usb"));
        self.mount_root.join(name)
    }
}

impl MediaOps for SystemMedia {
    fn mount(&self, device: &Path) -> Result<PathBuf> {
        let mount_point = self.mount_point_for(device);
        let wrapper = self.privilege.as_deref();

        if !mount_point.is_dir() {
            command::run_privileged(
                wrapper,
                "mkdir",
                &[OsStr::new("-p"), mount_point.as_os_str()],
            )
            .map_err(|e| Error::Mount {
                device: device.to_path_buf(),
                mount_point: mount_point.clone(),
                reason: e.to_string(),
            })?;
        }

        command::run_privileged(
            wrapper,
            "mount",
            &[device.as_os_str(), mount_point.as_os_str()],
        )
        .map_err(|e| Error::Mount {
            device: device.to_path_buf(),
            mount_point: mount_point.clone(),
            reason: e.to_string(),
        })?;

        Ok(mount_point)
    }

    fn unmount(&self, mount_point: &Path) -> Result<()> {
        let wrapper = self.privilege.as_deref();
        let unmounted = command::run_privileged(wrapper, "umount", &[mount_point.as_os_str()])
            .or_else(|e| {
                warn!("{e}; retrying with a lazy unmount");
                command::run_privileged(
                    wrapper,
                    "umount",
                    &[OsStr::new("-l"), mount_point.as_os_str()],
                )
            });

        if let Err(e) = unmounted {
            return Err(Error::Unmount {
                mount_point: mount_point.to_path_buf(),
                reason: e.to_string(),
            });
        }

        if let Err(e) = command::run_privileged(wrapper, "rmdir", &[mount_point.as_os_str()]) {
            warn!("Could not remove mount point: {e}");
        }
        Ok(())
    }
}

/// Which files on a stick are worth copying.
#[derive(Debug, Clone)]
pub struct RomFilter {
    extensions: Vec<String>,
    sidecar_prefix: String,
}

impl RomFilter {
    pub fn new(extensions: &[String], sidecar_prefix: impl Into<String>) -> Self {
        Self {
            extensions: extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            sidecar_prefix: sidecar_prefix.into(),
        }
    }

    pub fn accepts(&self, name: &str) -> bool {
        if !self.sidecar_prefix.is_empty() && name.starts_with(&self.sidecar_prefix) {
            return false;
        }
        Path::new(name)
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
            .is_some_and(|ext| self.extensions.iter().any(|allowed| *allowed == ext))
    }
}

/// Copy every accepted file from `source` into `destination`.
///
/// A file that fails to copy is logged and skipped. Returns the names copied.
pub fn copy_roms(source: &Path, destination: &Path, filter: &RomFilter) -> Vec<String> {
    info!("Copying ROMs from {}", source.display());
    let entries = match fs::read_dir(source) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Cannot read {}: {}", source.display(), e);
            return Vec::new();
        }
    };

    let mut copied = Vec::new();
    for entry in entries.filter_map(|entry| entry.ok()) {
        let name = entry.file_name().to_string_lossy().into_owned();
        if !filter.accepts(&name) {
            continue;
        }
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        let target = destination.join(&name);
        match copy_into_place(&entry.path(), destination, &target, &name) {
            Ok(()) => {
                info!("Copied {} to {}", name, target.display());
                copied.push(name);
            }
            Err(e) => warn!("Failed to copy {}: {}", name, e),
        }
    }
    copied
}

/// Copy under a staging name, then rename over `target`.
///
/// The catalog never lists a partial file, and a game already holding the
/// old file open keeps reading the old contents.
fn copy_into_place(source: &Path, destination: &Path, target: &Path, name: &str) -> Result<()> {
    let staging = destination.join(catalog::staging_name(name));
    let result = fs::copy(source, &staging).and_then(|_| fs::rename(&staging, target));
    if result.is_err() {
        let _ = fs::remove_file(&staging);
    }
    Ok(result?)
}

/// Everything that happens after a partition shows up: mount, copy,
/// unmount, then tell the main loop. Runs on the watcher thread.
pub struct MediaHandler<M> {
    ops: M,
    filter: RomFilter,
    destination: PathBuf,
    queue: EventQueue,
}

impl<M: MediaOps> MediaHandler<M> {
    pub fn new(ops: M, filter: RomFilter, destination: PathBuf, queue: EventQueue) -> Self {
        Self {
            ops,
            filter,
            destination,
            queue,
        }
    }

    pub fn on_partition_added(&self, device: &Path) {
        info!(device = %device.display(), "partition added");
        match self.ops.mount(device) {
            Ok(mount_point) => {
                let copied = copy_roms(&mount_point, &self.destination, &self.filter);
                info!(device = %device.display(), count = copied.len(), "copy finished");
                // Left mounted on failure; nothing retries later.
                if let Err(e) = self.ops.unmount(&mount_point) {
                    error!("{e}");
                }
            }
            Err(e) => error!("{e}"),
        }
        self.queue.publish(AppEvent::MediaInserted);
    }
}
