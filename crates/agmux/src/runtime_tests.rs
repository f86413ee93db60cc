// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use super::{Runtime, SessionState, StartRequest, META_SERVER, META_TMUX_SESSION};
use crate::pty::{PtyManager, SessionStatus, TmuxServerKind};
use crate::tmux::TmuxClient;

fn runtime() -> Runtime {
    Runtime::new(Arc::new(PtyManager::new()), TmuxClient::new())
}

fn start_request(command: &str, args: &[&str]) -> StartRequest {
    StartRequest {
        command: command.to_owned(),
        args: args.iter().map(|s| (*s).to_owned()).collect(),
        ..Default::default()
    }
}

#[test]
fn metadata_selects_the_tmux_server() {
    let mut req = start_request("irrelevant", &[]);
    req.metadata.insert(META_TMUX_SESSION.to_owned(), "dev".to_owned());
    assert_eq!(req.tmux_session(), Some("dev"));
    assert_eq!(req.tmux_server(), TmuxServerKind::Agmux);

    req.metadata.insert(META_SERVER.to_owned(), "default".to_owned());
    assert_eq!(req.tmux_server(), TmuxServerKind::Default);
}

#[tokio::test]
async fn pty_start_runs_through_the_manager() {
    let runtime = runtime();
    let summary = runtime.start(start_request("sh", &["-c", "sleep 5"])).await.unwrap();
    assert_eq!(summary.status, SessionStatus::Running);

    let status = runtime.status(&summary.id).await;
    assert_eq!(status.session_state, SessionState::Busy);

    assert!(runtime.stop(&summary.id).await);
}

#[tokio::test]
async fn status_for_unknown_or_exited_sessions_is_error() {
    let runtime = runtime();
    let status = runtime.status("ghost").await;
    assert_eq!(status.session_state, SessionState::Error);
    assert_eq!(status.reason.as_deref(), Some("exited"));
}

#[tokio::test]
async fn tmux_start_without_session_metadata_fails() {
    let runtime = runtime();
    let mut req = start_request("irrelevant", &[]);
    req.metadata.insert(META_TMUX_SESSION.to_owned(), String::new());
    // Empty session names never exist; a clean error, not a spawned PTY.
    let result = runtime.start(req).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn attach_unknown_id_fails() {
    let runtime = runtime();
    assert!(runtime.attach("missing").await.is_err());
}

#[tokio::test]
async fn send_and_resize_on_unknown_ids_are_noops() {
    let runtime = runtime();
    runtime.send("missing", bytes::Bytes::from_static(b"x")).await;
    runtime.resize("missing", 80, 24).await;
}
