// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

pub mod nbio;
pub mod spawn;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tracing::debug;

use crate::now_ms;
use spawn::NativePty;

/// Default terminal geometry for new sessions.
pub const DEFAULT_COLS: u16 = 120;
pub const DEFAULT_ROWS: u16 = 30;

/// Which runtime backs a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PtyBackend {
    Pty,
    Tmux,
}

/// Which tmux server hosts a tmux-backed session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TmuxServerKind {
    Agmux,
    Default,
}

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Running,
    Exited,
}

/// Exit status of the child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitStatus {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

/// Observable state of one runtime session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PtySummary {
    pub id: String,
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    pub backend: PtyBackend,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tmux_session: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tmux_server: Option<TmuxServerKind>,
    pub created_at: i64,
    pub last_seen_at: i64,
    pub status: SessionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_signal: Option<i32>,
}

/// Request to spawn a new session.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpawnRequest {
    /// Reuse an existing id to replace that session (explicit reattachment).
    pub id: Option<String>,
    pub name: Option<String>,
    pub command: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    /// Per-call environment overrides, merged over the process env.
    pub env: HashMap<String, String>,
    pub cols: Option<u16>,
    pub rows: Option<u16>,
    pub backend: Option<PtyBackend>,
    pub tmux_session: Option<String>,
    pub tmux_server: Option<TmuxServerKind>,
}

/// Events emitted by the PTY manager.
#[derive(Debug, Clone)]
pub enum PtyEvent {
    Output { id: String, data: Bytes },
    Exit { id: String, code: Option<i32>, signal: Option<i32> },
}

struct PtyHandle {
    summary: PtySummary,
    input_tx: mpsc::Sender<Bytes>,
    resize_tx: mpsc::Sender<(u16, u16)>,
    child_pid: i32,
    /// Spawn generation. A replaced session's pump task sees a stale epoch
    /// and must not mutate the summary or emit a second exit.
    epoch: u64,
}

/// Owns all child PTY handles and fans their output out as [`PtyEvent`]s.
///
/// All mutation goes through these methods; per-session pump tasks hold only
/// the manager `Arc` and their spawn epoch.
pub struct PtyManager {
    sessions: Mutex<HashMap<String, PtyHandle>>,
    events: broadcast::Sender<PtyEvent>,
    next_epoch: Mutex<u64>,
}

impl Default for PtyManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PtyManager {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            sessions: Mutex::new(HashMap::new()),
            events,
            next_epoch: Mutex::new(0),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PtyEvent> {
        self.events.subscribe()
    }

    /// Spawn a child process on a new PTY and start pumping its output.
    ///
    /// An existing session with the same id is killed and replaced; its
    /// pending exit event is suppressed so clients see a continuous session.
    pub fn spawn(self: &Arc<Self>, req: SpawnRequest) -> anyhow::Result<PtySummary> {
        let id = req.id.clone().unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        // Kill any previous child bound to this id before replacing it.
        if let Some(prev) = self.sessions.lock().get(&id) {
            if prev.summary.status == SessionStatus::Running {
                terminate(prev.child_pid);
            }
        }

        let cols = req.cols.unwrap_or(DEFAULT_COLS);
        let rows = req.rows.unwrap_or(DEFAULT_ROWS);

        let mut command = Vec::with_capacity(1 + req.args.len());
        command.push(req.command.clone());
        command.extend(req.args.iter().cloned());

        let env: Vec<(String, String)> =
            req.env.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        let pty = NativePty::spawn(&command, cols, rows, &env, req.cwd.as_ref())?;
        let child_pid = pty.child_pid();

        let now = now_ms();
        let summary = PtySummary {
            id: id.clone(),
            name: req.name.unwrap_or_else(|| req.command.clone()),
            command: req.command,
            args: req.args,
            cwd: req.cwd.as_ref().map(|p| p.display().to_string()),
            backend: req.backend.unwrap_or(PtyBackend::Pty),
            tmux_session: req.tmux_session,
            tmux_server: req.tmux_server,
            created_at: now,
            last_seen_at: now,
            status: SessionStatus::Running,
            exit_code: None,
            exit_signal: None,
        };

        let (input_tx, input_rx) = mpsc::channel(256);
        let (resize_tx, resize_rx) = mpsc::channel(8);
        let epoch = {
            let mut next = self.next_epoch.lock();
            *next += 1;
            *next
        };

        self.sessions.lock().insert(
            id.clone(),
            PtyHandle {
                summary: summary.clone(),
                input_tx,
                resize_tx,
                child_pid,
                epoch,
            },
        );

        let manager = Arc::clone(self);
        let pump_id = id.clone();
        tokio::spawn(async move {
            manager.pump(pump_id, epoch, pty, input_rx, resize_rx).await;
        });

        Ok(summary)
    }

    /// Forward output chunks to subscribers, then record the exit.
    async fn pump(
        self: Arc<Self>,
        id: String,
        epoch: u64,
        pty: NativePty,
        input_rx: mpsc::Receiver<Bytes>,
        resize_rx: mpsc::Receiver<(u16, u16)>,
    ) {
        let (output_tx, mut output_rx) = mpsc::channel::<Bytes>(256);

        let runner = tokio::spawn(pty.run(output_tx, input_rx, resize_rx));

        while let Some(data) = output_rx.recv().await {
            self.touch(&id, epoch);
            let _ = self.events.send(PtyEvent::Output { id: id.clone(), data });
        }

        let status = match runner.await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                debug!(%id, "pty run loop failed: {e}");
                ExitStatus { code: None, signal: None }
            }
            Err(e) => {
                debug!(%id, "pty run task panicked: {e}");
                ExitStatus { code: None, signal: None }
            }
        };

        // Exit is emitted exactly once, after all output, and only if this
        // pump still owns the id (a respawn bumps the epoch).
        if self.record_exit(&id, epoch, status) {
            let _ = self.events.send(PtyEvent::Exit {
                id,
                code: status.code,
                signal: status.signal,
            });
        }
    }

    fn touch(&self, id: &str, epoch: u64) {
        let mut sessions = self.sessions.lock();
        if let Some(handle) = sessions.get_mut(id) {
            if handle.epoch == epoch {
                handle.summary.last_seen_at = now_ms();
            }
        }
    }

    fn record_exit(&self, id: &str, epoch: u64, status: ExitStatus) -> bool {
        let mut sessions = self.sessions.lock();
        match sessions.get_mut(id) {
            Some(handle) if handle.epoch == epoch => {
                handle.summary.status = SessionStatus::Exited;
                handle.summary.exit_code = status.code;
                handle.summary.exit_signal = status.signal;
                handle.summary.last_seen_at = now_ms();
                true
            }
            _ => false,
        }
    }

    pub fn list(&self) -> Vec<PtySummary> {
        self.sessions.lock().values().map(|h| h.summary.clone()).collect()
    }

    pub fn summary(&self, id: &str) -> Option<PtySummary> {
        self.sessions.lock().get(id).map(|h| h.summary.clone())
    }

    /// Write bytes to the session's PTY. No-op when the id is unknown or
    /// the session has exited.
    pub async fn write(&self, id: &str, data: Bytes) {
        let tx = {
            let sessions = self.sessions.lock();
            sessions.get(id).map(|h| h.input_tx.clone())
        };
        if let Some(tx) = tx {
            let _ = tx.send(data).await;
        }
    }

    /// Resize the session's PTY. No-op when the id is unknown.
    pub async fn resize(&self, id: &str, cols: u16, rows: u16) {
        let tx = {
            let sessions = self.sessions.lock();
            sessions.get(id).map(|h| h.resize_tx.clone())
        };
        if let Some(tx) = tx {
            let _ = tx.send((cols, rows)).await;
        }
    }

    /// Kill the session's child process. Returns `false` for unknown ids.
    pub fn kill(&self, id: &str) -> bool {
        let pid = {
            let sessions = self.sessions.lock();
            match sessions.get(id) {
                Some(h) if h.summary.status == SessionStatus::Running => Some(h.child_pid),
                Some(_) => None,
                None => return false,
            }
        };
        if let Some(pid) = pid {
            terminate(pid);
        }
        true
    }

    /// Record an observed working directory for the session.
    pub fn update_cwd(&self, id: &str, cwd: &str) {
        let mut sessions = self.sessions.lock();
        if let Some(handle) = sessions.get_mut(id) {
            handle.summary.cwd = Some(cwd.to_owned());
        }
    }

    /// Drop an exited session's bookkeeping entirely.
    pub fn remove(&self, id: &str) -> bool {
        self.sessions.lock().remove(id).is_some()
    }
}

/// SIGHUP now, SIGKILL shortly after if the child lingers.
fn terminate(pid: i32) {
    let pid = Pid::from_raw(pid);
    let _ = kill(pid, Signal::SIGHUP);
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        let _ = kill(pid, Signal::SIGKILL);
    });
}

#[cfg(test)]
#[path = "pty_tests.rs"]
mod tests;
