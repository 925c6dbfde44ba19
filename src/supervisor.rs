use std::collections::{HashSet, VecDeque};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Child, Stdio};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use sysinfo::{ProcessesToUpdate, System};
use tracing::{error, info, warn};

use crate::command;
use crate::error::{Error, Result};
use crate::event::{AppEvent, SessionId};
use crate::queue::EventQueue;

/// Exit code reported when the external program could not be started at all.
pub const SPAWN_FAILURE_EXIT_CODE: i32 = 127;

/// Set by the main thread, read by the session's monitor thread.
///
/// Setting it more than once is harmless.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// One launch of the external program, from spawn to confirmed exit.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    item: PathBuf,
    token: CancellationToken,
}

impl Session {
    pub fn new(id: SessionId, item: PathBuf, token: CancellationToken) -> Self {
        Self { id, item, token }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn item(&self) -> &Path {
        &self.item
    }

    /// Ask the monitor to force-kill the process tree. Fire-and-forget.
    pub fn request_cancellation(&self) {
        info!(session = %self.id, "cancellation requested");
        self.token.cancel();
    }
}

/// Starts sessions. The state machine only ever talks to this seam.
pub trait Launcher {
    fn launch(&self, item: &Path) -> Result<Session>;
}

/// OS process primitives used by the monitor thread.
pub trait ProcessControl: Send + Sync + 'static {
    fn spawn(&self, item: &Path) -> Result<Child>;
    /// Every process below `pid`, at any depth.
    fn descendants(&self, pid: u32) -> Vec<u32>;
    /// SIGKILL, no questions asked.
    fn force_kill(&self, pid: u32) -> Result<()>;
}

/// Runs the emulator through the privilege wrapper and kills with `kill -9`.
#[derive(Debug, Clone)]
pub struct SystemProcessControl {
    command: String,
    args: Vec<String>,
    privilege: Option<String>,
}

impl SystemProcessControl {
    pub fn new(command: impl Into<String>, args: Vec<String>, privilege: Option<String>) -> Self {
        Self {
            command: command.into(),
            args,
            privilege,
        }
    }
}

impl ProcessControl for SystemProcessControl {
    fn spawn(&self, item: &Path) -> Result<Child> {
        info!("Executing {} on {}", self.command, item.display());
        // The terminal is handed over to the emulator while it runs.
        command::privileged(self.privilege.as_deref(), &self.command)
            .args(&self.args)
            .arg(item)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| Error::ProcessSpawn {
                program: self.command.clone(),
                reason: e.to_string(),
            })
    }

    fn descendants(&self, pid: u32) -> Vec<u32> {
        let mut system = System::new();
        system.refresh_processes(ProcessesToUpdate::All, true);
        // Linux lists every thread as a task whose parent is its process.
        let table: Vec<(u32, Option<u32>)> = system
            .processes()
            .iter()
            .filter(|(_, process)| process.thread_kind().is_none())
            .map(|(pid, process)| (pid.as_u32(), process.parent().map(|p| p.as_u32())))
            .collect();
        collect_descendants(pid, &table)
    }

    fn force_kill(&self, pid: u32) -> Result<()> {
        match self.privilege.as_deref() {
            Some(wrapper) => {
                let pid_arg = pid.to_string();
                command::run_privileged(
                    Some(wrapper),
                    "kill",
                    &[OsStr::new("-9"), OsStr::new(&pid_arg)],
                )
                .map_err(|e| Error::Kill {
                    pid,
                    reason: e.to_string(),
                })
            }
            None => sigkill(pid),
        }
    }
}

#[cfg(unix)]
fn sigkill(pid: u32) -> Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    match kill(Pid::from_raw(pid as i32), Signal::SIGKILL) {
        // already gone
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(e) => Err(Error::Kill {
            pid,
            reason: e.to_string(),
        }),
    }
}

#[cfg(not(unix))]
fn sigkill(pid: u32) -> Result<()> {
    Err(Error::Kill {
        pid,
        reason: String::from("signals are not supported on this platform"),
    })
}

/// Breadth-first walk of a `(pid, parent)` table starting below `root`.
pub fn collect_descendants(root: u32, table: &[(u32, Option<u32>)]) -> Vec<u32> {
    let mut found = Vec::new();
    let mut seen = HashSet::from([root]);
    let mut frontier = VecDeque::from([root]);
    while let Some(parent) = frontier.pop_front() {
        for &(pid, ppid) in table {
            if ppid == Some(parent) && seen.insert(pid) {
                found.push(pid);
                frontier.push_back(pid);
            }
        }
    }
    found
}

/// Launches one monitored process per session and reports its exit on the
/// event queue.
pub struct ProcessSupervisor<C> {
    control: Arc<C>,
    queue: EventQueue,
    poll_interval: Duration,
    next_id: AtomicU64,
}

impl<C: ProcessControl> ProcessSupervisor<C> {
    pub fn new(control: C, queue: EventQueue, poll_interval: Duration) -> Self {
        Self {
            control: Arc::new(control),
            queue,
            poll_interval,
            next_id: AtomicU64::new(1),
        }
    }
}

impl<C: ProcessControl> Launcher for ProcessSupervisor<C> {
    fn launch(&self, item: &Path) -> Result<Session> {
        let id = SessionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let token = CancellationToken::new();
        let monitor = Monitor {
            control: Arc::clone(&self.control),
            queue: self.queue.clone(),
            poll_interval: self.poll_interval,
            session: id,
            item: item.to_path_buf(),
            token: token.clone(),
        };

        thread::Builder::new()
            .name(format!("session-{}", id.0))
            .spawn(move || monitor.run())?;

        info!(session = %id, item = %item.display(), "session launched");
        Ok(Session::new(id, item.to_path_buf(), token))
    }
}

struct Monitor<C> {
    control: Arc<C>,
    queue: EventQueue,
    poll_interval: Duration,
    session: SessionId,
    item: PathBuf,
    token: CancellationToken,
}

impl<C: ProcessControl> Monitor<C> {
    fn run(self) {
        let exit_code = match self.control.spawn(&self.item) {
            Ok(child) => self.supervise(child),
            Err(e) => {
                error!(session = %self.session, "{e}");
                Some(SPAWN_FAILURE_EXIT_CODE)
            }
        };

        info!(session = %self.session, ?exit_code, "session ended");
        self.queue.publish(AppEvent::ProcessExited {
            session: self.session,
            exit_code,
        });
    }

    fn supervise(&self, mut child: Child) -> Option<i32> {
        let pid = child.id();
        loop {
            if self.token.is_cancelled() {
                self.kill_tree(pid);
                break;
            }
            match child.try_wait() {
                Ok(Some(status)) => return status.code(),
                Ok(None) => thread::sleep(self.poll_interval),
                Err(e) => {
                    warn!(session = %self.session, "failed to poll pid {pid}: {e}");
                    break;
                }
            }
        }

        // No timeout: a child stuck in uninterruptible I/O stalls us here.
        match child.wait() {
            Ok(status) => status.code(),
            Err(e) => {
                warn!(session = %self.session, "failed to reap pid {pid}: {e}");
                None
            }
        }
    }

    fn kill_tree(&self, pid: u32) {
        let descendants = self.control.descendants(pid);
        info!(
            session = %self.session,
            pid,
            ?descendants,
            "force-killing process tree"
        );
        for child in descendants {
            if let Err(e) = self.control.force_kill(child) {
                warn!(session = %self.session, "{e}");
            }
        }
        if let Err(e) = self.control.force_kill(pid) {
            warn!(session = %self.session, "{e}");
        }
    }
}
