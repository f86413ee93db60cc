// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::merge_session_lists;
use crate::pty::{PtyBackend, PtySummary, SessionStatus};

const HOUR: i64 = 3_600 * 1_000;

fn summary(id: &str, status: SessionStatus, created_at: i64, last_seen_at: i64) -> PtySummary {
    PtySummary {
        id: id.to_owned(),
        name: id.to_owned(),
        command: "zsh".to_owned(),
        args: vec![],
        cwd: None,
        backend: PtyBackend::Pty,
        tmux_session: None,
        tmux_server: None,
        created_at,
        last_seen_at,
        status,
        exit_code: None,
        exit_signal: None,
    }
}

#[test]
fn persisted_running_rows_are_coerced_to_exited() {
    let now = 10 * HOUR;
    let persisted = vec![summary("p1", SessionStatus::Running, now - HOUR / 2, now - HOUR / 2)];
    let merged = merge_session_lists(vec![], persisted, now, 24, None);
    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].status, SessionStatus::Exited);
}

#[test]
fn live_entries_win_on_id_conflicts() {
    let now = 10 * HOUR;
    let live = vec![summary("s", SessionStatus::Running, now, now)];
    let persisted = vec![summary("s", SessionStatus::Exited, now - HOUR, now - HOUR)];
    let merged = merge_session_lists(live, persisted, now, 24, None);
    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].status, SessionStatus::Running);
}

#[test]
fn inactivity_cutoff_drops_old_exited_sessions() {
    let now = 10 * HOUR;
    let persisted = vec![
        summary("old", SessionStatus::Exited, now - 2 * HOUR, now - 2 * HOUR),
        summary("fresh", SessionStatus::Exited, now - HOUR / 2, now - HOUR / 2),
    ];
    let merged = merge_session_lists(vec![], persisted, now, 1, None);
    let ids: Vec<&str> = merged.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["fresh"]);
}

#[test]
fn running_sessions_survive_the_cutoff() {
    let now = 10 * HOUR;
    let live = vec![summary("ancient", SessionStatus::Running, 0, 0)];
    let merged = merge_session_lists(live, vec![], now, 1, None);
    assert_eq!(merged.len(), 1);
}

#[test]
fn cutoff_uses_the_newer_of_created_and_seen() {
    let now = 10 * HOUR;
    // Stale last_seen_at but fresh created_at keeps the session.
    let persisted = vec![summary("s", SessionStatus::Exited, now - HOUR / 2, 0)];
    let merged = merge_session_lists(vec![], persisted, now, 1, None);
    assert_eq!(merged.len(), 1);
}

#[test]
fn hours_are_clamped_to_range() {
    let now = 400 * HOUR;
    let persisted = vec![summary("s", SessionStatus::Exited, now - 200 * HOUR, now - 200 * HOUR)];
    // 10000 clamps to 168; 200h-old session is still dropped.
    let merged = merge_session_lists(vec![], persisted, now, 10_000, None);
    assert!(merged.is_empty());
}

#[test]
fn sorted_by_recency_descending_with_limit() {
    let now = 10 * HOUR;
    let live = vec![
        summary("a", SessionStatus::Running, now - 3 * HOUR, now - 3 * HOUR),
        summary("b", SessionStatus::Running, now - HOUR, now - HOUR),
        summary("c", SessionStatus::Running, now - 2 * HOUR, now - 2 * HOUR),
    ];
    let merged = merge_session_lists(live, vec![], now, 24, Some(2));
    let ids: Vec<&str> = merged.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["b", "c"]);
}
