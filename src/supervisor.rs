//! Build/serve supervisor for watch mode.
//!
//! # States
//!
//! ```text
//!            start / change
//!   Idle ───────────────────► Building ──── ok ────► Serving
//!    ▲                          │  ▲                   │
//!    └──────── build failed ────┘  └────── change ─────┘
//! ```
//!
//! Builds run on the loop thread. Changes that queue up meanwhile are
//! drained once the build returns, while the state still reads `Building`,
//! and handled by the busy policy: dropped, or folded into one follow-up
//! build that runs after the server restarts.
//!
//! The server slot is shared with the Ctrl+C handler, which is the only
//! other thread that touches it.

use crate::{
    build::{Pipeline, log_report},
    config::BusyPolicy,
    log,
    utils::command,
};
use anyhow::{Result, bail};
use notify::{
    Event, EventKind,
    event::ModifyKind,
};
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use std::{
    ffi::OsString,
    fmt,
    path::{Path, PathBuf},
    process::Child,
    sync::{Arc, mpsc::Receiver},
    time::Duration,
};

/// What the watcher delivers.
pub type WatchMessage = notify::Result<Event>;

// ============================================================================
// Build Events
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Created => "created",
            Self::Modified => "modified",
            Self::Removed => "removed",
        })
    }
}

/// A filesystem change that warrants a rebuild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildEvent {
    pub kind: ChangeKind,
    pub paths: FxHashSet<PathBuf>,
}

impl BuildEvent {
    /// Classify a watcher event.
    ///
    /// Renames, metadata-only changes and access events are ignored, as are
    /// events whose paths are all editor temp/backup files.
    pub fn from_notify(event: &Event) -> Option<Self> {
        let kind = match event.kind {
            EventKind::Create(_) => ChangeKind::Created,
            EventKind::Remove(_) => ChangeKind::Removed,
            EventKind::Modify(ModifyKind::Metadata(_) | ModifyKind::Name(_)) => return None,
            EventKind::Modify(_) => ChangeKind::Modified,
            _ => return None,
        };

        let paths: FxHashSet<_> = event
            .paths
            .iter()
            .filter(|p| !is_temp_file(p))
            .cloned()
            .collect();

        (!paths.is_empty()).then_some(Self { kind, paths })
    }

    /// Short description for logs: first path (sorted) plus a count.
    pub fn describe(&self, root: &Path) -> String {
        let mut paths: Vec<_> = self.paths.iter().collect();
        paths.sort();

        let first = paths
            .first()
            .map(|p| p.strip_prefix(root).unwrap_or(p).display().to_string())
            .unwrap_or_default();
        match paths.len() {
            0 | 1 => format!("{} {first}", self.kind),
            n => format!("{} {first} (+{} more)", self.kind, n - 1),
        }
    }
}

/// Check if path is a temp/backup file (editor artifacts).
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "swx" | "tmp")
        || name.ends_with('~')
        || (name.starts_with('#') && name.ends_with('#'))
        || name.starts_with('.')
}

// ============================================================================
// Server Slot
// ============================================================================

/// A running server that can be stopped.
pub trait ServerProcess: Send {
    /// Stop the process and wait until it has exited.
    fn terminate(&mut self) -> Result<()>;
}

/// Starts server processes.
pub trait ServerLauncher {
    type Process: ServerProcess;

    fn launch(&self) -> Result<Self::Process>;
}

/// Holds at most one server process.
///
/// Once closed, the slot stays empty for the rest of the process.
#[derive(Debug)]
pub struct ServerSlot<P> {
    current: Option<P>,
    closed: bool,
}

impl<P> Default for ServerSlot<P> {
    fn default() -> Self {
        Self {
            current: None,
            closed: false,
        }
    }
}

impl<P: ServerProcess> ServerSlot<P> {
    pub const fn is_occupied(&self) -> bool {
        self.current.is_some()
    }

    #[cfg(test)]
    pub const fn current(&self) -> Option<&P> {
        self.current.as_ref()
    }

    /// Terminate and reap the current process, if any.
    pub fn shutdown(&mut self) -> Result<()> {
        match self.current.take() {
            Some(mut process) => process.terminate(),
            None => Ok(()),
        }
    }

    /// Shut down and refuse any later launch.
    pub fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.shutdown()
    }

    /// Stop the current process, then start a new one in its place.
    ///
    /// If the launch fails the slot is left empty.
    pub fn replace<L>(&mut self, launcher: &L) -> Result<()>
    where
        L: ServerLauncher<Process = P>,
    {
        if self.closed {
            bail!("server slot is closed");
        }
        self.shutdown()?;
        self.current = Some(launcher.launch()?);
        Ok(())
    }
}

pub type SharedSlot<P> = Arc<Mutex<ServerSlot<P>>>;

// ============================================================================
// Supervisor
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Building,
    Serving,
}

pub struct Supervisor<B, L: ServerLauncher> {
    pipeline: B,
    launcher: L,
    slot: SharedSlot<L::Process>,
    policy: BusyPolicy,
    root: PathBuf,
    state: State,
    /// A change arrived during a build and `Coalesce` is in effect.
    pending: bool,
}

impl<B: Pipeline, L: ServerLauncher> Supervisor<B, L> {
    pub fn new(pipeline: B, launcher: L, policy: BusyPolicy, root: &Path) -> Self {
        Self {
            pipeline,
            launcher,
            slot: SharedSlot::default(),
            policy,
            root: root.to_path_buf(),
            state: State::Idle,
            pending: false,
        }
    }

    #[cfg(test)]
    pub const fn state(&self) -> State {
        self.state
    }

    /// Handle to the server slot, for the interrupt handler.
    pub fn slot(&self) -> SharedSlot<L::Process> {
        Arc::clone(&self.slot)
    }

    /// Build once, then rebuild on every qualifying change until the
    /// channel closes.
    pub fn run(&mut self, rx: &Receiver<WatchMessage>) {
        self.cycle(rx, "initial build");
        self.listen(rx);
    }

    fn listen(&mut self, rx: &Receiver<WatchMessage>) {
        loop {
            while std::mem::take(&mut self.pending) {
                self.cycle(rx, "changes during last build");
            }

            match rx.recv() {
                Ok(message) => self.on_message(rx, message),
                Err(_) => break,
            }
        }
    }

    fn on_message(&mut self, rx: &Receiver<WatchMessage>, message: WatchMessage) {
        match message {
            Ok(event) => {
                if let Some(event) = BuildEvent::from_notify(&event) {
                    self.on_event(rx, &event);
                }
            }
            Err(e) => log!("watch"; "error: {e}"),
        }
    }

    fn on_event(&mut self, rx: &Receiver<WatchMessage>, event: &BuildEvent) {
        let change = event.describe(&self.root);
        match self.state {
            State::Building => match self.policy {
                BusyPolicy::Drop => {
                    log!("watch"; "build in progress, skipping ({change})");
                }
                BusyPolicy::Coalesce => {
                    if !self.pending {
                        log!("watch"; "build in progress, queued ({change})");
                    }
                    self.pending = true;
                }
            },
            State::Idle | State::Serving => self.cycle(rx, &change),
        }
    }

    /// Idle/Serving → Building → Serving (or Idle on failure).
    fn cycle(&mut self, rx: &Receiver<WatchMessage>, reason: &str) {
        log!("watch"; "{reason}, building...");
        self.state = State::Building;

        let result = self.pipeline.run();

        // Anything that arrived during the build meets the busy policy.
        while let Ok(message) = rx.try_recv() {
            self.on_message(rx, message);
        }

        match result {
            Ok(report) => {
                log_report(&report);
                self.restart_server();
            }
            Err(e) => {
                log!("error"; "build failed, keeping previous server\n{e:?}");
                self.state = State::Idle;
            }
        }
    }

    fn restart_server(&mut self) {
        let mut slot = self.slot.lock();
        let restarted = slot.is_occupied();

        match slot.replace(&self.launcher) {
            Ok(()) => {
                log!("watch"; "server {}", if restarted { "restarted" } else { "started" });
                self.state = State::Serving;
            }
            Err(e) => {
                log!("error"; "failed to start server: {e:#}");
                self.state = State::Idle;
            }
        }
    }
}

// ============================================================================
// Child Process Server
// ============================================================================

/// How long a server gets to exit after SIGTERM before it is killed.
const STOP_GRACE: Duration = Duration::from_secs(5);

/// A server running as a child process.
#[derive(Debug)]
pub struct ChildServer(Child);

impl ChildServer {
    /// Ask the process to exit and wait up to `grace` for it.
    /// Returns whether it exited.
    #[cfg(unix)]
    fn stop_gracefully(&mut self, grace: Duration) -> Result<bool> {
        use nix::{
            sys::signal::{Signal, kill},
            unistd::Pid,
        };
        use std::{thread, time::Instant};

        let pid = Pid::from_raw(i32::try_from(self.0.id())?);
        kill(pid, Signal::SIGTERM)?;

        let deadline = Instant::now() + grace;
        while Instant::now() < deadline {
            if self.0.try_wait()?.is_some() {
                return Ok(true);
            }
            thread::sleep(Duration::from_millis(20));
        }
        Ok(false)
    }

    #[cfg(not(unix))]
    fn stop_gracefully(&mut self, _grace: Duration) -> Result<bool> {
        Ok(false)
    }
}

impl ServerProcess for ChildServer {
    /// SIGTERM first, SIGKILL if the server lingers past the grace period.
    fn terminate(&mut self) -> Result<()> {
        if self.0.try_wait()?.is_some() {
            return Ok(());
        }

        match self.stop_gracefully(STOP_GRACE) {
            Ok(true) => return Ok(()),
            Ok(false) => log!("watch"; "server ignored SIGTERM, killing"),
            Err(e) => log!("watch"; "graceful stop failed: {e}"),
        }

        self.0.kill()?;
        self.0.wait()?;
        Ok(())
    }
}

/// Spawns `program args..` with inherited stdio.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    pub root: PathBuf,
    pub program: OsString,
    pub args: Vec<OsString>,
}

impl ProcessLauncher {
    /// This binary's `serve` subcommand for the given project.
    pub fn serve(root: &Path, config_path: &Path) -> Result<Self> {
        let exe = std::env::current_exe()?;
        Ok(Self {
            root: root.to_path_buf(),
            program: exe.into_os_string(),
            args: vec![
                "--root".into(),
                root.as_os_str().to_owned(),
                "--config".into(),
                config_path.as_os_str().to_owned(),
                "serve".into(),
            ],
        })
    }
}

impl ServerLauncher for ProcessLauncher {
    type Process = ChildServer;

    fn launch(&self) -> Result<ChildServer> {
        let child = command::spawn(Some(self.root.as_path()), &[self.program.clone()], &self.args)?;
        Ok(ChildServer(child))
    }
}

// ============================================================================
// Tests
// ============================================================================
