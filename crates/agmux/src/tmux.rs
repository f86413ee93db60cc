// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! tmux CLI adapter.
//!
//! All operations go through the tmux binary against one of two servers:
//! the private `agmux` server (socket name `agmux`) that owns restored
//! agent sessions, and the user's default server. Lifecycle operations
//! surface failures; inspection and cosmetic operations are best-effort.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{bail, Context};
use tracing::debug;

use crate::pty::TmuxServerKind;

/// Default timeout for a single tmux invocation.
pub const TMUX_TIMEOUT: Duration = Duration::from_secs(10);

/// Scroll direction for pane history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    Up,
    Down,
}

/// Server-selection arguments prepended to every tmux invocation.
pub fn server_args(server: TmuxServerKind) -> Vec<String> {
    match server {
        TmuxServerKind::Agmux => vec!["-L".to_owned(), "agmux".to_owned()],
        TmuxServerKind::Default => vec![],
    }
}

/// `capture-pane` arguments: visible pane, or `history_lines` of scrollback.
pub fn capture_args(target: &str, history_lines: Option<u32>) -> Vec<String> {
    let mut args = vec![
        "capture-pane".to_owned(),
        "-p".to_owned(),
        "-t".to_owned(),
        target.to_owned(),
    ];
    if let Some(lines) = history_lines {
        args.push("-S".to_owned());
        args.push(format!("-{lines}"));
    }
    args
}

/// `new-session` arguments for a detached session at `cwd`.
pub fn new_session_args(name: &str, cwd: &Path, command: Option<&str>) -> Vec<String> {
    let mut args = vec![
        "new-session".to_owned(),
        "-d".to_owned(),
        "-s".to_owned(),
        name.to_owned(),
        "-c".to_owned(),
        cwd.display().to_string(),
        "-x".to_owned(),
        "220".to_owned(),
        "-y".to_owned(),
        "50".to_owned(),
    ];
    if let Some(cmd) = command {
        args.push(cmd.to_owned());
    }
    args
}

/// `new-session -t` arguments for a linked (grouped) session, so a new
/// client attaches without stealing the original.
pub fn linked_session_args(group_with: &str, name: &str) -> Vec<String> {
    vec![
        "new-session".to_owned(),
        "-d".to_owned(),
        "-s".to_owned(),
        name.to_owned(),
        "-t".to_owned(),
        group_with.to_owned(),
    ]
}

/// Scroll the pane history via copy-mode `send-keys -X`.
pub fn scroll_args(target: &str, direction: ScrollDirection, lines: u32) -> Vec<Vec<String>> {
    let key = match direction {
        ScrollDirection::Up => "scroll-up",
        ScrollDirection::Down => "scroll-down",
    };
    vec![
        vec!["copy-mode".to_owned(), "-t".to_owned(), target.to_owned()],
        vec![
            "send-keys".to_owned(),
            "-X".to_owned(),
            "-t".to_owned(),
            target.to_owned(),
            "-N".to_owned(),
            lines.to_string(),
            key.to_owned(),
        ],
    ]
}

/// The command line the tmux runtime's local PTY runs to attach a client.
pub fn attach_command(server: TmuxServerKind, session: &str) -> Vec<String> {
    let mut cmd = vec!["tmux".to_owned()];
    cmd.extend(server_args(server));
    cmd.push("attach-session".to_owned());
    cmd.push("-t".to_owned());
    cmd.push(session.to_owned());
    cmd
}

/// Thin async wrapper over the tmux binary.
#[derive(Debug, Clone)]
pub struct TmuxClient {
    timeout: Duration,
}

impl Default for TmuxClient {
    fn default() -> Self {
        Self::new()
    }
}

impl TmuxClient {
    pub fn new() -> Self {
        Self { timeout: TMUX_TIMEOUT }
    }

    /// Run tmux with the given args; error on non-zero exit or timeout.
    async fn run(&self, server: TmuxServerKind, args: &[String]) -> anyhow::Result<String> {
        let mut cmd = tokio::process::Command::new("tmux");
        cmd.args(server_args(server));
        cmd.args(args);
        cmd.stdin(Stdio::null());

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .context("tmux invocation timed out")?
            .context("failed to execute tmux")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("tmux {} failed: {}", args.first().map(String::as_str).unwrap_or(""), stderr.trim());
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Run tmux, swallowing failures (best-effort operations).
    async fn run_best_effort(&self, server: TmuxServerKind, args: &[String]) -> Option<String> {
        match self.run(server, args).await {
            Ok(out) => Some(out),
            Err(e) => {
                debug!("tmux best-effort op failed: {e:#}");
                None
            }
        }
    }

    /// Session names on the given server. An unreachable server counts as
    /// having no sessions.
    pub async fn list_sessions(&self, server: TmuxServerKind) -> Vec<String> {
        let args = vec![
            "list-sessions".to_owned(),
            "-F".to_owned(),
            "#{session_name}".to_owned(),
        ];
        match self.run_best_effort(server, &args).await {
            Some(out) => out.lines().map(str::to_owned).collect(),
            None => vec![],
        }
    }

    /// Whether the named session exists on the given server.
    pub async fn check_session(&self, server: TmuxServerKind, session: &str) -> bool {
        let args = vec!["has-session".to_owned(), "-t".to_owned(), session.to_owned()];
        self.run(server, &args).await.is_ok()
    }

    /// Find which server hosts the session, preferring the agmux server.
    pub async fn locate_session(&self, session: &str) -> Option<TmuxServerKind> {
        for server in [TmuxServerKind::Agmux, TmuxServerKind::Default] {
            if self.check_session(server, session).await {
                return Some(server);
            }
        }
        None
    }

    /// Create a detached session at `cwd`, optionally running `command`.
    pub async fn new_session_detached(
        &self,
        server: TmuxServerKind,
        name: &str,
        cwd: &Path,
        command: Option<&str>,
    ) -> anyhow::Result<()> {
        let args = new_session_args(name, cwd, command);
        self.run(server, &args).await.map(|_| ())
    }

    /// Create a new window in `session` at `cwd`; returns the window id.
    pub async fn create_window(
        &self,
        server: TmuxServerKind,
        session: &str,
        cwd: &Path,
    ) -> anyhow::Result<String> {
        let args = vec![
            "new-window".to_owned(),
            "-t".to_owned(),
            format!("{session}:"),
            "-c".to_owned(),
            cwd.display().to_string(),
            "-P".to_owned(),
            "-F".to_owned(),
            "#{window_id}".to_owned(),
        ];
        let out = self.run(server, &args).await?;
        Ok(out.trim().to_owned())
    }

    /// Create a linked session grouped with `group_with`.
    pub async fn create_linked_session(
        &self,
        server: TmuxServerKind,
        group_with: &str,
        name: &str,
    ) -> anyhow::Result<()> {
        let args = linked_session_args(group_with, name);
        self.run(server, &args).await.map(|_| ())
    }

    /// Kill a window (lifecycle: failures surface).
    pub async fn kill_window(&self, server: TmuxServerKind, target: &str) -> anyhow::Result<()> {
        let args = vec!["kill-window".to_owned(), "-t".to_owned(), target.to_owned()];
        self.run(server, &args).await.map(|_| ())
    }

    /// Capture the pane: visible content, or `history_lines` of scrollback.
    /// Best-effort; `None` when the pane is unreachable.
    pub async fn capture_pane(
        &self,
        server: TmuxServerKind,
        target: &str,
        history_lines: Option<u32>,
    ) -> Option<String> {
        let args = capture_args(target, history_lines);
        self.run_best_effort(server, &args).await
    }

    /// Scroll the pane history. Best-effort.
    pub async fn scroll_history(
        &self,
        server: TmuxServerKind,
        target: &str,
        direction: ScrollDirection,
        lines: u32,
    ) {
        for step in scroll_args(target, direction, lines) {
            if self.run_best_effort(server, &step).await.is_none() {
                return;
            }
        }
    }

    /// Foreground process name of the pane. Best-effort.
    pub async fn pane_current_command(
        &self,
        server: TmuxServerKind,
        target: &str,
    ) -> Option<String> {
        let args = vec![
            "display-message".to_owned(),
            "-p".to_owned(),
            "-t".to_owned(),
            target.to_owned(),
            "#{pane_current_command}".to_owned(),
        ];
        self.run_best_effort(server, &args)
            .await
            .map(|out| out.trim().to_owned())
            .filter(|s| !s.is_empty())
    }

    /// Working directory of the pane. Best-effort.
    pub async fn pane_current_path(&self, server: TmuxServerKind, target: &str) -> Option<String> {
        let args = vec![
            "display-message".to_owned(),
            "-p".to_owned(),
            "-t".to_owned(),
            target.to_owned(),
            "#{pane_current_path}".to_owned(),
        ];
        self.run_best_effort(server, &args)
            .await
            .map(|out| out.trim().to_owned())
            .filter(|s| !s.is_empty())
    }

    /// Cosmetic session options for restored sessions. Best-effort.
    pub async fn apply_ui_options(&self, server: TmuxServerKind, session: &str) {
        for (option, value) in [("status", "off"), ("allow-rename", "off")] {
            let args = vec![
                "set-option".to_owned(),
                "-t".to_owned(),
                session.to_owned(),
                option.to_owned(),
                value.to_owned(),
            ];
            let _ = self.run_best_effort(server, &args).await;
        }
    }
}

#[cfg(test)]
#[path = "tmux_tests.rs"]
mod tests;
