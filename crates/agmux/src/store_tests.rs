// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{merge_records, AgentProvider, AgentSessionRecord, CwdSource, Store};
use crate::pty::{PtyBackend, PtySummary, SessionStatus};

fn open_temp() -> (tempfile::TempDir, Store) {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(dir.path()).unwrap();
    (dir, store)
}

fn record(
    provider: AgentProvider,
    id: &str,
    cwd: Option<&str>,
    source: CwdSource,
    created_at: i64,
    last_seen_at: i64,
) -> AgentSessionRecord {
    AgentSessionRecord {
        provider,
        provider_session_id: id.to_owned(),
        name: format!("{} {id}", provider.as_str()),
        command: provider.as_str().to_owned(),
        args: vec!["resume".to_owned(), id.to_owned()],
        cwd: cwd.map(str::to_owned),
        cwd_source: source,
        created_at,
        last_seen_at,
        last_restored_at: None,
    }
}

fn summary(id: &str, status: SessionStatus) -> PtySummary {
    PtySummary {
        id: id.to_owned(),
        name: id.to_owned(),
        command: "zsh".to_owned(),
        args: vec![],
        cwd: Some("/work".to_owned()),
        backend: PtyBackend::Pty,
        tmux_session: None,
        tmux_server: None,
        created_at: 1_000,
        last_seen_at: 2_000,
        status,
        exit_code: None,
        exit_signal: None,
    }
}

#[test]
fn session_roundtrip() {
    let (_dir, store) = open_temp();
    store.upsert_session(&summary("s1", SessionStatus::Running)).unwrap();

    let rows = store.list_sessions().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, "s1");
    assert_eq!(rows[0].status, SessionStatus::Running);
    assert_eq!(rows[0].cwd.as_deref(), Some("/work"));
}

#[test]
fn upsert_session_replaces_by_id() {
    let (_dir, store) = open_temp();
    store.upsert_session(&summary("s1", SessionStatus::Running)).unwrap();

    let mut updated = summary("s1", SessionStatus::Exited);
    updated.exit_code = Some(0);
    store.upsert_session(&updated).unwrap();

    let rows = store.list_sessions().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, SessionStatus::Exited);
    assert_eq!(rows[0].exit_code, Some(0));
}

#[test]
fn startup_normalizes_running_rows() {
    let (_dir, store) = open_temp();
    store.upsert_session(&summary("s1", SessionStatus::Running)).unwrap();
    store.upsert_session(&summary("s2", SessionStatus::Exited)).unwrap();

    assert_eq!(store.mark_running_exited().unwrap(), 1);
    let rows = store.list_sessions().unwrap();
    assert!(rows.iter().all(|r| r.status == SessionStatus::Exited));
}

#[test]
fn agent_session_merge_priority_scenario() {
    let (_dir, store) = open_temp();

    let first = record(AgentProvider::Codex, "sess-1", Some("/a"), CwdSource::Runtime, 900, 2_000);
    store.upsert_agent_session(&first).unwrap();

    let second = record(AgentProvider::Codex, "sess-1", None, CwdSource::Log, 1_500, 3_000);
    let merged = store.upsert_agent_session(&second).unwrap();

    assert_eq!(merged.cwd.as_deref(), Some("/a"));
    assert_eq!(merged.cwd_source, CwdSource::Runtime);
    assert_eq!(merged.created_at, 900);
    assert_eq!(merged.last_seen_at, 3_000);

    // And the same values come back from the table.
    let stored = store.get_agent_session(AgentProvider::Codex, "sess-1").unwrap().unwrap();
    assert_eq!(stored, merged);
}

#[test]
fn lower_priority_cwd_fills_a_null() {
    let current = record(AgentProvider::Pi, "x", None, CwdSource::Runtime, 100, 200);
    let incoming = record(AgentProvider::Pi, "x", Some("/from-log"), CwdSource::Log, 100, 150);
    let merged = merge_records(&current, &incoming);
    assert_eq!(merged.cwd.as_deref(), Some("/from-log"));
    assert_eq!(merged.cwd_source, CwdSource::Log);
}

#[test]
fn equal_priority_newer_last_seen_wins() {
    let current = record(AgentProvider::Claude, "x", Some("/old"), CwdSource::Runtime, 100, 200);
    let incoming = record(AgentProvider::Claude, "x", Some("/new"), CwdSource::Runtime, 100, 300);
    let merged = merge_records(&current, &incoming);
    assert_eq!(merged.cwd.as_deref(), Some("/new"));
}

#[test]
fn equal_priority_older_last_seen_loses() {
    let current = record(AgentProvider::Claude, "x", Some("/old"), CwdSource::Runtime, 100, 300);
    let incoming = record(AgentProvider::Claude, "x", Some("/new"), CwdSource::Runtime, 100, 200);
    let merged = merge_records(&current, &incoming);
    assert_eq!(merged.cwd.as_deref(), Some("/old"));
}

#[test]
fn descriptive_fields_follow_the_newer_contributor() {
    let mut current = record(AgentProvider::Codex, "x", Some("/a"), CwdSource::Runtime, 100, 200);
    current.name = "old name".to_owned();
    let mut incoming = record(AgentProvider::Codex, "x", None, CwdSource::Log, 100, 300);
    incoming.name = "new name".to_owned();

    let merged = merge_records(&current, &incoming);
    assert_eq!(merged.name, "new name");
    assert_eq!(merged.cwd.as_deref(), Some("/a"));
}

#[test]
fn last_restored_at_folds_to_max_and_zero_is_null() {
    let mut current = record(AgentProvider::Codex, "x", None, CwdSource::Db, 100, 200);
    current.last_restored_at = Some(500);
    let mut incoming = current.clone();
    incoming.last_restored_at = Some(900);
    assert_eq!(merge_records(&current, &incoming).last_restored_at, Some(900));

    incoming.last_restored_at = None;
    assert_eq!(merge_records(&current, &incoming).last_restored_at, Some(500));

    current.last_restored_at = None;
    incoming.last_restored_at = None;
    assert_eq!(merge_records(&current, &incoming).last_restored_at, None);
}

#[test]
fn preferences_roundtrip() {
    let (_dir, store) = open_temp();
    assert!(store.get_preference("launch").unwrap().is_none());

    let value = serde_json::json!({"taskProvider": "github", "columns": 3});
    store.set_preference("launch", &value).unwrap();
    assert_eq!(store.get_preference("launch").unwrap(), Some(value.clone()));

    let updated = serde_json::json!({"taskProvider": "linear"});
    store.set_preference("launch", &updated).unwrap();
    assert_eq!(store.get_preference("launch").unwrap(), Some(updated));
}

#[test]
fn reopening_preserves_rows() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = Store::open(dir.path()).unwrap();
        store.upsert_session(&summary("s1", SessionStatus::Running)).unwrap();
    }
    let store = Store::open(dir.path()).unwrap();
    assert_eq!(store.list_sessions().unwrap().len(), 1);
}
