// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime provider abstraction.
//!
//! A session runs either directly on a local PTY or inside a tmux window
//! that a local PTY attaches to with `tmux attach`. Either way all bytes
//! flow through the [`PtyManager`] pipeline, so the hub and readiness
//! engine never care which runtime backs a session.

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::LazyLock;

use bytes::Bytes;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::pty::{PtyBackend, PtyManager, PtySummary, SessionStatus, SpawnRequest, TmuxServerKind};
use crate::tmux::{attach_command, TmuxClient};

/// Foreground process names that mean the pane is sitting at a shell.
#[allow(clippy::unwrap_used)]
static SHELL_COMMAND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(sh|bash|zsh|fish|dash|ksh|tcsh|csh|nu)$").unwrap());

/// Whether a pane foreground process name looks like an idle shell.
pub fn is_shell_command(command: &str) -> bool {
    SHELL_COMMAND.is_match(command)
}

/// Coarse runtime state reported by `status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Ready,
    Busy,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeStatus {
    pub session_state: SessionState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl RuntimeStatus {
    pub fn exited() -> Self {
        Self {
            session_state: SessionState::Error,
            reason: Some("exited".to_owned()),
        }
    }
}

/// Metadata keys recognized on a [`StartRequest`].
pub const META_TMUX_SESSION: &str = "tmuxSession";
pub const META_SERVER: &str = "server";

/// Request to start a session on some runtime.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StartRequest {
    pub name: Option<String>,
    pub command: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: HashMap<String, String>,
    pub cols: Option<u16>,
    pub rows: Option<u16>,
    /// String→string bag with enumerated keys ([`META_TMUX_SESSION`],
    /// [`META_SERVER`]). A `tmuxSession` entry selects the tmux runtime.
    pub metadata: HashMap<String, String>,
}

impl StartRequest {
    pub fn tmux_session(&self) -> Option<&str> {
        self.metadata.get(META_TMUX_SESSION).map(String::as_str)
    }

    pub fn tmux_server(&self) -> TmuxServerKind {
        match self.metadata.get(META_SERVER).map(String::as_str) {
            Some("default") => TmuxServerKind::Default,
            _ => TmuxServerKind::Agmux,
        }
    }
}

/// Uniform session lifecycle over a concrete runtime.
///
/// Object-safe: async operations return boxed futures, as the PTY backend
/// trait does.
pub trait RuntimeProvider: Send + Sync + 'static {
    fn backend(&self) -> PtyBackend;

    fn start(
        &self,
        req: StartRequest,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<PtySummary>> + Send + '_>>;

    /// Re-attach to a known session id, replacing its PTY.
    fn attach(
        &self,
        id: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<PtySummary>> + Send + '_>>;

    fn stop(&self, id: &str) -> Pin<Box<dyn Future<Output = bool> + Send + '_>>;

    fn status(&self, id: &str) -> Pin<Box<dyn Future<Output = RuntimeStatus> + Send + '_>>;
}

/// Direct PTY runtime: the child process is the session.
pub struct PtyRuntime {
    manager: Arc<PtyManager>,
}

impl PtyRuntime {
    pub fn new(manager: Arc<PtyManager>) -> Self {
        Self { manager }
    }
}

impl RuntimeProvider for PtyRuntime {
    fn backend(&self) -> PtyBackend {
        PtyBackend::Pty
    }

    fn start(
        &self,
        req: StartRequest,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<PtySummary>> + Send + '_>> {
        Box::pin(async move {
            self.manager.spawn(SpawnRequest {
                id: None,
                name: req.name,
                command: req.command,
                args: req.args,
                cwd: req.cwd,
                env: req.env,
                cols: req.cols,
                rows: req.rows,
                backend: Some(PtyBackend::Pty),
                tmux_session: None,
                tmux_server: None,
            })
        })
    }

    fn attach(
        &self,
        id: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<PtySummary>> + Send + '_>> {
        let id = id.to_owned();
        Box::pin(async move {
            let summary = self
                .manager
                .summary(&id)
                .ok_or_else(|| anyhow::anyhow!("unknown session: {id}"))?;
            self.manager.spawn(SpawnRequest {
                id: Some(id),
                name: Some(summary.name),
                command: summary.command,
                args: summary.args,
                cwd: summary.cwd.map(PathBuf::from),
                env: HashMap::new(),
                cols: None,
                rows: None,
                backend: Some(PtyBackend::Pty),
                tmux_session: None,
                tmux_server: None,
            })
        })
    }

    fn stop(&self, id: &str) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
        let id = id.to_owned();
        Box::pin(async move { self.manager.kill(&id) })
    }

    fn status(&self, id: &str) -> Pin<Box<dyn Future<Output = RuntimeStatus> + Send + '_>> {
        let id = id.to_owned();
        Box::pin(async move {
            match self.manager.summary(&id) {
                Some(s) if s.status == SessionStatus::Running => RuntimeStatus {
                    session_state: SessionState::Busy,
                    reason: None,
                },
                _ => RuntimeStatus::exited(),
            }
        })
    }
}

/// tmux runtime: the session is a tmux window; a local PTY runs
/// `tmux attach` against it so output and input use the PTY pipeline.
pub struct TmuxRuntime {
    manager: Arc<PtyManager>,
    tmux: TmuxClient,
}

impl TmuxRuntime {
    pub fn new(manager: Arc<PtyManager>, tmux: TmuxClient) -> Self {
        Self { manager, tmux }
    }

    fn spawn_attached(
        &self,
        id: Option<String>,
        name: Option<String>,
        session: &str,
        server: TmuxServerKind,
        cwd: Option<PathBuf>,
    ) -> anyhow::Result<PtySummary> {
        let attach = attach_command(server, session);
        self.manager.spawn(SpawnRequest {
            id,
            name: name.or_else(|| Some(session.to_owned())),
            command: attach[0].clone(),
            args: attach[1..].to_vec(),
            cwd,
            env: HashMap::new(),
            cols: None,
            rows: None,
            backend: Some(PtyBackend::Tmux),
            tmux_session: Some(session.to_owned()),
            tmux_server: Some(server),
        })
    }
}

impl RuntimeProvider for TmuxRuntime {
    fn backend(&self) -> PtyBackend {
        PtyBackend::Tmux
    }

    fn start(
        &self,
        req: StartRequest,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<PtySummary>> + Send + '_>> {
        Box::pin(async move {
            let session = req
                .tmux_session()
                .ok_or_else(|| anyhow::anyhow!("tmux runtime requires {META_TMUX_SESSION}"))?
                .to_owned();
            let server = req.tmux_server();

            if !self.tmux.check_session(server, &session).await {
                anyhow::bail!("tmux session '{session}' does not exist");
            }
            self.spawn_attached(None, req.name, &session, server, req.cwd)
        })
    }

    fn attach(
        &self,
        id: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<PtySummary>> + Send + '_>> {
        let id = id.to_owned();
        Box::pin(async move {
            let summary = self
                .manager
                .summary(&id)
                .ok_or_else(|| anyhow::anyhow!("unknown session: {id}"))?;
            let session = summary
                .tmux_session
                .clone()
                .ok_or_else(|| anyhow::anyhow!("session {id} has no tmux target"))?;
            let server = summary.tmux_server.unwrap_or(TmuxServerKind::Agmux);
            self.spawn_attached(
                Some(id),
                Some(summary.name),
                &session,
                server,
                summary.cwd.map(PathBuf::from),
            )
        })
    }

    fn stop(&self, id: &str) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
        let id = id.to_owned();
        Box::pin(async move { self.manager.kill(&id) })
    }

    fn status(&self, id: &str) -> Pin<Box<dyn Future<Output = RuntimeStatus> + Send + '_>> {
        let id = id.to_owned();
        Box::pin(async move {
            let Some(summary) = self.manager.summary(&id) else {
                return RuntimeStatus::exited();
            };
            if summary.status != SessionStatus::Running {
                return RuntimeStatus::exited();
            }
            let Some(session) = summary.tmux_session else {
                return RuntimeStatus::exited();
            };
            let server = summary.tmux_server.unwrap_or(TmuxServerKind::Agmux);

            match self.tmux.pane_current_command(server, &session).await {
                Some(cmd) if is_shell_command(&cmd) => RuntimeStatus {
                    session_state: SessionState::Ready,
                    reason: None,
                },
                Some(_) => RuntimeStatus {
                    session_state: SessionState::Busy,
                    reason: None,
                },
                // Introspection failures are best-effort: assume busy.
                None => RuntimeStatus {
                    session_state: SessionState::Busy,
                    reason: None,
                },
            }
        })
    }
}

/// Routes operations to the provider backing each session.
pub struct Runtime {
    manager: Arc<PtyManager>,
    pty: PtyRuntime,
    tmux: TmuxRuntime,
}

impl Runtime {
    pub fn new(manager: Arc<PtyManager>, tmux: TmuxClient) -> Self {
        Self {
            pty: PtyRuntime::new(Arc::clone(&manager)),
            tmux: TmuxRuntime::new(Arc::clone(&manager), tmux),
            manager,
        }
    }

    pub fn manager(&self) -> &Arc<PtyManager> {
        &self.manager
    }

    fn provider(&self, backend: PtyBackend) -> &dyn RuntimeProvider {
        match backend {
            PtyBackend::Pty => &self.pty,
            PtyBackend::Tmux => &self.tmux,
        }
    }

    fn provider_for(&self, id: &str) -> &dyn RuntimeProvider {
        let backend = self
            .manager
            .summary(id)
            .map(|s| s.backend)
            .unwrap_or(PtyBackend::Pty);
        self.provider(backend)
    }

    /// Start a session; the `tmuxSession` metadata key selects the runtime.
    pub async fn start(&self, req: StartRequest) -> anyhow::Result<PtySummary> {
        let backend = if req.tmux_session().is_some() {
            PtyBackend::Tmux
        } else {
            PtyBackend::Pty
        };
        self.provider(backend).start(req).await
    }

    pub async fn attach(&self, id: &str) -> anyhow::Result<PtySummary> {
        self.provider_for(id).attach(id).await
    }

    pub async fn stop(&self, id: &str) -> bool {
        self.provider_for(id).stop(id).await
    }

    /// Write bytes to the session (no-op on unknown ids).
    pub async fn send(&self, id: &str, data: Bytes) {
        self.manager.write(id, data).await;
    }

    /// Resize the session (no-op on unknown ids).
    pub async fn resize(&self, id: &str, cols: u16, rows: u16) {
        self.manager.resize(id, cols, rows).await;
    }

    pub async fn status(&self, id: &str) -> RuntimeStatus {
        self.provider_for(id).status(id).await
    }
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
