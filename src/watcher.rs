use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use notify_debouncer_mini::{new_debouncer, DebouncedEventKind};
use tracing::{debug, warn};

use crate::media::{MediaHandler, MediaOps};

/// What happened to a block partition node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotplugAction {
    Add,
    Remove,
}

/// Turns raw device-directory churn into partition add/remove actions.
///
/// Nodes are remembered so that udev's permission fix-ups on a node that
/// already exists do not count as a second insertion.
pub struct HotplugFilter {
    sys_block_dir: PathBuf,
    known: HashSet<String>,
}

impl HotplugFilter {
    /// Start out knowing every partition already present in `dev_dir`.
    pub fn new(dev_dir: &Path, sys_block_dir: impl Into<PathBuf>) -> Self {
        let mut filter = Self {
            sys_block_dir: sys_block_dir.into(),
            known: HashSet::new(),
        };
        if let Ok(entries) = fs::read_dir(dev_dir) {
            for entry in entries.filter_map(|e| e.ok()) {
                let name = entry.file_name().to_string_lossy().into_owned();
                if filter.is_partition(&name) {
                    filter.known.insert(name);
                }
            }
        }
        debug!(known = ?filter.known, "hotplug filter seeded");
        filter
    }

    /// A partition has a `partition` attribute in sysfs; whole disks do not.
    fn is_partition(&self, name: &str) -> bool {
        self.sys_block_dir.join(name).join("partition").exists()
    }

    pub fn classify(&mut self, node: &Path) -> Option<HotplugAction> {
        let name = node.file_name()?.to_string_lossy().into_owned();
        if node.exists() {
            if self.known.contains(&name) || !self.is_partition(&name) {
                return None;
            }
            self.known.insert(name);
            Some(HotplugAction::Add)
        } else if self.known.remove(&name) {
            Some(HotplugAction::Remove)
        } else {
            None
        }
    }
}

/// Start the hotplug watcher in its own thread.
///
/// Insertions are handled synchronously on that thread. Returns a handle
/// that keeps the watcher alive; dropping it stops watching.
pub fn spawn<M: MediaOps>(
    dev_dir: &Path,
    sys_block_dir: &Path,
    debounce_ms: u64,
    handler: MediaHandler<M>,
) -> Result<notify_debouncer_mini::Debouncer<notify::RecommendedWatcher>> {
    let mut filter = HotplugFilter::new(dev_dir, sys_block_dir);

    let mut debouncer = new_debouncer(
        Duration::from_millis(debounce_ms),
        move |res: Result<Vec<notify_debouncer_mini::DebouncedEvent>, notify::Error>| {
            let events = match res {
                Ok(evts) => evts,
                Err(e) => {
                    warn!("hotplug watch error: {e}");
                    return;
                }
            };

            for event in &events {
                if event.kind != DebouncedEventKind::Any {
                    continue;
                }
                match filter.classify(&event.path) {
                    Some(HotplugAction::Add) => handler.on_partition_added(&event.path),
                    Some(HotplugAction::Remove) => {
                        debug!(device = %event.path.display(), "partition removed")
                    }
                    None => {}
                }
            }
        },
    )?;

    debouncer
        .watcher()
        .watch(dev_dir, notify::RecursiveMode::NonRecursive)?;

    Ok(debouncer)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    use parking_lot::Mutex;

    use super::*;
    use crate::error;
    use crate::event::AppEvent;
    use crate::media::RomFilter;
    use crate::queue::EventQueue;

    struct FakeSystem {
        dev: tempfile::TempDir,
        sys: tempfile::TempDir,
    }

    impl FakeSystem {
        fn new() -> Self {
            Self {
                dev: tempfile::tempdir().unwrap(),
                sys: tempfile::tempdir().unwrap(),
            }
        }

        /// sysfs first, then the device node, in the order the kernel does it.
        fn attach(&self, name: &str, partition: bool) -> PathBuf {
            let sys = self.sys.path().join(name);
            fs::create_dir_all(&sys).unwrap();
            if partition {
                fs::write(sys.join("partition"), b"1").unwrap();
            }
            let node = self.dev.path().join(name);
            fs::write(&node, b"").unwrap();
            node
        }

        fn attach_disk(&self, name: &str) -> PathBuf {
            self.attach(name, false)
        }

        fn attach_partition(&self, name: &str) -> PathBuf {
            self.attach(name, true)
        }

        fn filter(&self) -> HotplugFilter {
            HotplugFilter::new(self.dev.path(), self.sys.path())
        }
    }

    #[test]
    fn new_partition_is_added_once() {
        let system = FakeSystem::new();
        let mut filter = system.filter();

        let node = system.attach_partition("sdb1");
        assert_eq!(filter.classify(&node), Some(HotplugAction::Add));
        // chmod/chown by udev right after creation
        assert_eq!(filter.classify(&node), None);
    }

    #[test]
    fn whole_disks_and_other_nodes_are_ignored() {
        let system = FakeSystem::new();
        let mut filter = system.filter();

        let disk = system.attach_disk("sdb");
        assert_eq!(filter.classify(&disk), None);
        assert_eq!(filter.classify(&system.dev.path().join("tty7")), None);
    }

    #[test]
    fn partitions_present_at_start_are_not_insertions() {
        let system = FakeSystem::new();
        let root = system.attach_partition("sda1");
        let mut filter = system.filter();
        assert_eq!(filter.classify(&root), None);
    }

    #[test]
    fn removal_then_reinsertion_is_a_new_add() {
        let system = FakeSystem::new();
        let mut filter = system.filter();

        let node = system.attach_partition("sdc1");
        assert_eq!(filter.classify(&node), Some(HotplugAction::Add));

        fs::remove_file(&node).unwrap();
        assert_eq!(filter.classify(&node), Some(HotplugAction::Remove));

        fs::write(&node, b"").unwrap();
        assert_eq!(filter.classify(&node), Some(HotplugAction::Add));
    }

    /// Every device "mounts" at the same directory.
    struct FakeMedia {
        stick: PathBuf,
        mounted: Arc<Mutex<Vec<PathBuf>>>,
    }

    impl MediaOps for FakeMedia {
        fn mount(&self, device: &Path) -> error::Result<PathBuf> {
            self.mounted.lock().push(device.to_path_buf());
            Ok(self.stick.clone())
        }

        fn unmount(&self, _mount_point: &Path) -> error::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn new_partition_node_reaches_the_media_handler() {
        let system = FakeSystem::new();
        system.attach_partition("sda1");
        let stick = tempfile::tempdir().unwrap();
        let roms = tempfile::tempdir().unwrap();
        fs::write(stick.path().join("tetris.gba"), b"rom").unwrap();

        let mounted = Arc::new(Mutex::new(Vec::new()));
        let queue = EventQueue::new();
        let handler = MediaHandler::new(
            FakeMedia {
                stick: stick.path().to_path_buf(),
                mounted: Arc::clone(&mounted),
            },
            RomFilter::new(&[String::from("gba")], "._"),
            roms.path().to_path_buf(),
            queue.clone(),
        );
        let _watcher = spawn(system.dev.path(), system.sys.path(), 10, handler).unwrap();

        system.attach_disk("sdb");
        let node = system.attach_partition("sdb1");

        let deadline = Instant::now() + Duration::from_secs(10);
        let events = loop {
            let events = queue.drain_matching(AppEvent::is_media_inserted);
            if !events.is_empty() {
                break events;
            }
            assert!(Instant::now() < deadline, "insertion never reported");
            thread::sleep(Duration::from_millis(10));
        };

        assert_eq!(events, vec![AppEvent::MediaInserted]);
        assert_eq!(*mounted.lock(), vec![node]);
        assert!(roms.path().join("tetris.gba").is_file());
    }
}
