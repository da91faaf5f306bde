//! Supervision of the single long-running mirroring process.
//!
//! The stored [`ActiveSession`] is the whole state machine: present means
//! running, absent means idle. It is only touched under `active`'s lock and
//! that lock is never held across an await.

pub mod args;

use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::process::{Child, Command};
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{Cause, MirrorError, Result};
use crate::process::command_label;
use crate::SessionOptions;

pub const DEFAULT_MIRROR_PATH: &str = "scrcpy";
/// Sessions last as long as the user wants; this only bounds runaways.
pub const DEFAULT_SESSION_CEILING: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(5);

/// Lifecycle notifications for front ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    Started {
        session_id: Uuid,
        device_id: Option<String>,
        pid: Option<u32>,
    },
    StopRequested {
        session_id: Uuid,
    },
    ForceKilled {
        session_id: Uuid,
    },
    /// Sent for every exit, whether requested, forced or on its own.
    Exited {
        session_id: Uuid,
        device_id: Option<String>,
        code: Option<i32>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    pub running: bool,
    pub session_id: Option<Uuid>,
    pub device_id: Option<String>,
    pub pid: Option<u32>,
    pub started_at: Option<DateTime<Utc>>,
}

struct ActiveSession {
    id: Uuid,
    device_id: Option<String>,
    pid: Option<u32>,
    started_at: DateTime<Utc>,
    /// Asks the process to terminate
    cancel: CancellationToken,
    /// Kills it outright
    kill: CancellationToken,
    /// Flips to `true` once the watcher has reaped the process
    done: watch::Receiver<bool>,
}

pub struct SessionSupervisor {
    program: PathBuf,
    ceiling: Duration,
    grace: Duration,
    active: Arc<Mutex<Option<ActiveSession>>>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionSupervisor {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self::with_timeouts(program, DEFAULT_SESSION_CEILING, DEFAULT_STOP_GRACE)
    }

    pub fn with_timeouts(program: impl Into<PathBuf>, ceiling: Duration, grace: Duration) -> Self {
        let program = program.into();
        let program = if program.as_os_str().is_empty() {
            PathBuf::from(DEFAULT_MIRROR_PATH)
        } else {
            program
        };
        let (events, _) = broadcast::channel(64);
        Self {
            program,
            ceiling,
            grace,
            active: Arc::new(Mutex::new(None)),
            events,
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn status(&self) -> SessionStatus {
        match lock(&self.active).as_ref() {
            Some(session) => SessionStatus {
                running: true,
                session_id: Some(session.id),
                device_id: session.device_id.clone(),
                pid: session.pid,
                started_at: Some(session.started_at),
            },
            None => SessionStatus::default(),
        }
    }

    pub fn is_running(&self) -> bool {
        lock(&self.active).is_some()
    }

    /// Launch the mirroring tool and return once it has been spawned.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self, device_id: &str, options: &SessionOptions) -> Result<()> {
        let label = command_label(&self.program, &[]);
        let mut active = lock(&self.active);

        if active.is_some() {
            return Err(MirrorError::command_failed(
                &label,
                "",
                "",
                None,
                Cause::Output("session already active".into()),
            )
            .with_message(format!("{} is already running", label)));
        }

        let args = args::build_args(device_id, options);
        let child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                warn!(command = %label, error = %e, "Failed to start mirroring session");
                MirrorError::command_failed(&label, "", "", None, Cause::Spawn(e))
            })?;

        let id = Uuid::new_v4();
        let device_id = Some(device_id.to_string()).filter(|d| !d.is_empty());
        let pid = child.id();
        let cancel = CancellationToken::new();
        let kill = CancellationToken::new();
        let (done_tx, done_rx) = watch::channel(false);

        *active = Some(ActiveSession {
            id,
            device_id: device_id.clone(),
            pid,
            started_at: Utc::now(),
            cancel: cancel.clone(),
            kill: kill.clone(),
            done: done_rx,
        });
        drop(active);

        info!(session_id = %id, device = ?device_id, ?pid, args = ?args, "Mirroring session started");
        let _ = self.events.send(SessionEvent::Started {
            session_id: id,
            device_id: device_id.clone(),
            pid,
        });

        let watcher = Watcher {
            id,
            device_id,
            ceiling: self.ceiling,
            cancel,
            kill,
            done: done_tx,
            active: Arc::clone(&self.active),
            events: self.events.clone(),
        };
        tokio::spawn(watcher.run(child));

        Ok(())
    }

    /// Ask the running session to terminate and wait for it to go away.
    ///
    /// Past the grace period the process is killed and `timeout` reported.
    /// The watcher clears the state, not this method.
    pub async fn stop(&self) -> Result<()> {
        let (id, cancel, kill, mut done) = {
            let active = lock(&self.active);
            match active.as_ref() {
                Some(s) => (s.id, s.cancel.clone(), s.kill.clone(), s.done.clone()),
                None => {
                    return Err(MirrorError::not_running(format!(
                        "{} is not running",
                        command_label(&self.program, &[])
                    )))
                }
            }
        };

        info!(session_id = %id, "Stopping mirroring session");
        let _ = self.events.send(SessionEvent::StopRequested { session_id: id });
        cancel.cancel();

        // a dropped sender means the watcher is gone too, so any wakeup counts
        let waited = tokio::time::timeout(self.grace, done.wait_for(|exited| *exited))
            .await
            .map(|_| ());

        match waited {
            Ok(()) => Ok(()),
            Err(elapsed) => {
                warn!(session_id = %id, grace = ?self.grace, "Session ignored stop request, killing");
                kill.cancel();
                let _ = done.wait_for(|exited| *exited).await;
                Err(MirrorError::timeout(
                    command_label(&self.program, &[]),
                    Cause::Deadline(elapsed),
                ))
            }
        }
    }
}

impl Default for SessionSupervisor {
    fn default() -> Self {
        Self::new(DEFAULT_MIRROR_PATH)
    }
}

/// Background half of a session: owns the child until it exits.
struct Watcher {
    id: Uuid,
    device_id: Option<String>,
    ceiling: Duration,
    cancel: CancellationToken,
    kill: CancellationToken,
    done: watch::Sender<bool>,
    active: Arc<Mutex<Option<ActiveSession>>>,
    events: broadcast::Sender<SessionEvent>,
}

impl Watcher {
    async fn run(self, mut child: Child) {
        let status = tokio::select! {
            status = child.wait() => status,
            _ = self.cancel.cancelled() => {
                request_termination(&mut child);
                tokio::select! {
                    status = child.wait() => status,
                    _ = self.kill.cancelled() => {
                        let _ = self.events.send(SessionEvent::ForceKilled { session_id: self.id });
                        force_kill(&mut child).await
                    }
                }
            }
            _ = tokio::time::sleep(self.ceiling) => {
                warn!(session_id = %self.id, ceiling = ?self.ceiling, "Session hit its ceiling, killing");
                let _ = self.events.send(SessionEvent::ForceKilled { session_id: self.id });
                force_kill(&mut child).await
            }
        };

        let code = match &status {
            Ok(status) => status.code(),
            Err(e) => {
                warn!(session_id = %self.id, error = %e, "Failed to wait on mirroring process");
                None
            }
        };

        {
            let mut active = lock(&self.active);
            if active.as_ref().is_some_and(|s| s.id == self.id) {
                *active = None;
            }
        }

        info!(session_id = %self.id, ?code, "Mirroring session exited");
        let _ = self.events.send(SessionEvent::Exited {
            session_id: self.id,
            device_id: self.device_id,
            code,
        });
        let _ = self.done.send(true);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn force_kill(child: &mut Child) -> io::Result<ExitStatus> {
    child.kill().await?;
    child.wait().await
}

#[cfg(unix)]
fn request_termination(child: &mut Child) {
    if let Some(pid) = child.id() {
        // SAFETY: the child has not been reaped yet, so the pid is still ours.
        let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
        if rc != 0 {
            warn!(pid, error = %io::Error::last_os_error(), "Failed to signal mirroring process");
        }
    }
}

#[cfg(not(unix))]
fn request_termination(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        warn!(error = %e, "Failed to terminate mirroring process");
    }
}
