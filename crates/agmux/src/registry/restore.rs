// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Restore protocol: reattach a known agent session in a chosen directory.
//!
//! A restore bootstraps the private agmux tmux server, opens a fresh window
//! at the chosen cwd, attaches a linked client session through a local PTY,
//! and types the provider's resume command after the agent's terminal has
//! settled.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::ApiError;
use crate::now_ms;
use crate::pty::{PtyBackend, PtyManager, PtySummary, SpawnRequest, TmuxServerKind};
use crate::readiness::signal::AgentFamily;
use crate::readiness::ReadinessEngine;
use crate::store::{AgentProvider, AgentSessionRecord, CwdSource};
use crate::tmux::{attach_command, TmuxClient};

use super::{resume_args, AgentSessionRegistry};

/// Name of the bootstrap session on the agmux tmux server.
pub const AGMUX_SESSION: &str = "agmux";

/// Delay before the resume command is written to the fresh attachment.
pub const RESUME_WRITE_DELAY: Duration = Duration::from_millis(300);

/// Where a restored session should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestoreTarget {
    SameCwd,
    Worktree,
    NewWorktree,
}

/// Parameters of a restore, as received from the HTTP surface.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreRequest {
    pub provider: AgentProvider,
    pub provider_session_id: String,
    pub target: RestoreTarget,
    #[serde(default)]
    pub cwd: Option<String>,
    #[serde(default)]
    pub worktree_path: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
}

/// The line typed into the fresh attachment to resume the conversation.
///
/// `CLAUDECODE` is unset first: the variable leaks from an enclosing Claude
/// session and makes the resumed CLI think it is nested.
pub fn resume_command(provider: AgentProvider, provider_session_id: &str) -> String {
    let args = resume_args(provider, provider_session_id);
    format!("unset CLAUDECODE; {} {}\n", provider.as_str(), args.join(" "))
}

/// Resolve the directory a restore should land in:
/// explicit user cwd > computed worktree path > registry cwd > repo root.
/// The source is `user` whenever the caller supplied any explicit path.
pub fn resolve_cwd(
    request: &RestoreRequest,
    worktree: Option<&Path>,
    registry_cwd: Option<&str>,
    repo_root: &Path,
) -> (PathBuf, CwdSource) {
    let explicit = request.cwd.is_some() || request.worktree_path.is_some();
    let cwd = request
        .cwd
        .as_ref()
        .map(PathBuf::from)
        .or_else(|| worktree.map(Path::to_path_buf))
        .or_else(|| registry_cwd.map(PathBuf::from))
        .unwrap_or_else(|| repo_root.to_path_buf());
    let source = if explicit { CwdSource::User } else { CwdSource::Runtime };
    (cwd, source)
}

/// Everything a restore needs to touch.
pub struct RestoreContext {
    pub registry: Arc<AgentSessionRegistry>,
    pub manager: Arc<PtyManager>,
    pub readiness: Arc<ReadinessEngine>,
    pub tmux: TmuxClient,
}

impl RestoreContext {
    /// Run the restore protocol; returns the attached PTY summary.
    pub async fn restore(&self, request: RestoreRequest) -> Result<PtySummary, ApiError> {
        let repo_root = std::env::current_dir()
            .map_err(|e| ApiError::internal(format!("cannot resolve repo root: {e}")))?;

        // 1. Validate the target and settle the worktree path.
        let worktree = match request.target {
            RestoreTarget::SameCwd => None,
            RestoreTarget::Worktree => {
                let path = request
                    .worktree_path
                    .as_ref()
                    .ok_or_else(|| ApiError::bad_request("worktreePath is required"))?;
                let path = PathBuf::from(path);
                let known = list_worktrees(&repo_root).await;
                if !known.iter().any(|w| w == &path) {
                    return Err(ApiError::not_found(format!(
                        "unknown worktree: {}",
                        path.display()
                    )));
                }
                Some(path)
            }
            RestoreTarget::NewWorktree => {
                let branch = request
                    .branch
                    .clone()
                    .unwrap_or_else(|| format!("agent/{}", &request.provider_session_id[..8.min(request.provider_session_id.len())]));
                let path = request
                    .worktree_path
                    .as_ref()
                    .map(PathBuf::from)
                    .unwrap_or_else(|| repo_root.join(".worktrees").join(branch.replace('/', "-")));
                create_worktree(&repo_root, &path, &branch)
                    .await
                    .map_err(|e| ApiError::conflict(format!("worktree creation failed: {e}")))?;
                Some(path)
            }
        };

        // 2. Choose the final cwd.
        let record = self
            .registry
            .find_agent_session(request.provider, &request.provider_session_id)
            .map_err(|e| ApiError::internal(e.to_string()))?;
        let (cwd, cwd_source) =
            resolve_cwd(&request, worktree.as_deref(), record.as_ref().and_then(|r| r.cwd.as_deref()), &repo_root);

        // 3. Bootstrap the agmux server, open a window, attach via a linked
        //    session so existing clients keep their focus.
        let server = TmuxServerKind::Agmux;
        if !self.tmux.check_session(server, AGMUX_SESSION).await {
            let shell = std::env::var("SHELL").unwrap_or_else(|_| "sh".to_owned());
            self.tmux
                .new_session_detached(server, AGMUX_SESSION, &cwd, Some(&shell))
                .await
                .map_err(|e| ApiError::internal(format!("tmux bootstrap failed: {e}")))?;
        }
        let window = self
            .tmux
            .create_window(server, AGMUX_SESSION, &cwd)
            .await
            .map_err(|e| ApiError::internal(format!("tmux window failed: {e}")))?;
        debug!(%window, "created restore window");

        let linked = format!("agmux-view-{}", &uuid::Uuid::new_v4().to_string()[..8]);
        self.tmux
            .create_linked_session(server, AGMUX_SESSION, &linked)
            .await
            .map_err(|e| ApiError::internal(format!("tmux link failed: {e}")))?;
        self.tmux.apply_ui_options(server, &linked).await;

        let attach = attach_command(server, &linked);
        let summary = self
            .manager
            .spawn(SpawnRequest {
                name: Some(format!(
                    "{} {}",
                    request.provider.as_str(),
                    &request.provider_session_id
                )),
                command: attach[0].clone(),
                args: attach[1..].to_vec(),
                cwd: Some(cwd.clone()),
                backend: Some(PtyBackend::Tmux),
                tmux_session: Some(linked.clone()),
                tmux_server: Some(TmuxServerKind::Agmux),
                ..Default::default()
            })
            .map_err(|e| ApiError::internal(format!("pty spawn failed: {e}")))?;

        self.readiness.set_family(
            &summary.id,
            AgentFamily::from_command(request.provider.as_str()),
        );

        // 4. Type the resume command once the agent terminal has settled.
        let manager = Arc::clone(&self.manager);
        let pty_id = summary.id.clone();
        let line = resume_command(request.provider, &request.provider_session_id);
        tokio::spawn(async move {
            tokio::time::sleep(RESUME_WRITE_DELAY).await;
            manager.write(&pty_id, bytes::Bytes::from(line)).await;
        });

        // 5. Persist the restore and the attachment.
        let now = now_ms();
        let incoming = AgentSessionRecord {
            provider: request.provider,
            provider_session_id: request.provider_session_id.clone(),
            name: record.as_ref().map(|r| r.name.clone()).unwrap_or_else(|| summary.name.clone()),
            command: request.provider.as_str().to_owned(),
            args: resume_args(request.provider, &request.provider_session_id),
            cwd: Some(cwd.display().to_string()),
            cwd_source,
            created_at: record.as_ref().map(|r| r.created_at).unwrap_or(now),
            last_seen_at: now,
            last_restored_at: Some(now),
        };
        self.registry
            .upsert_agent_session(&incoming)
            .map_err(|e| ApiError::internal(e.to_string()))?;
        self.registry
            .attach_pty(&summary.id, request.provider, &request.provider_session_id);

        info!(
            pty = %summary.id,
            provider = request.provider.as_str(),
            session = %request.provider_session_id,
            "agent session restored"
        );
        Ok(summary)
    }
}

/// Worktrees registered for the repository, per `git worktree list`.
async fn list_worktrees(repo_root: &Path) -> Vec<PathBuf> {
    let output = Command::new("git")
        .arg("-C")
        .arg(repo_root)
        .args(["worktree", "list", "--porcelain"])
        .output()
        .await;
    let Ok(output) = output else {
        return vec![];
    };
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .filter_map(|l| l.strip_prefix("worktree "))
        .map(PathBuf::from)
        .collect()
}

/// Create a new worktree from HEAD on a fresh branch.
async fn create_worktree(repo_root: &Path, path: &Path, branch: &str) -> anyhow::Result<()> {
    let output = Command::new("git")
        .arg("-C")
        .arg(repo_root)
        .args(["worktree", "add", "-b", branch])
        .arg(path)
        .arg("HEAD")
        .output()
        .await?;
    if !output.status.success() {
        anyhow::bail!("{}", String::from_utf8_lossy(&output.stderr).trim());
    }
    Ok(())
}

#[cfg(test)]
#[path = "restore_tests.rs"]
mod tests;
