// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::signal::AgentFamily;
use super::{Readiness, ReadinessEngine};

#[test]
fn busy_output_transitions_once() {
    let engine = ReadinessEngine::default();
    engine.set_family("p1", Some(AgentFamily::Codex));

    let first = engine.ingest_output("p1", b"\xe2\x80\xa2 Working (2s \xe2\x80\xa2 esc to interrupt)\n");
    assert_eq!(first, Some(Readiness::Busy));

    // Same classification again: no transition.
    let second = engine.ingest_output("p1", b"still going, esc to interrupt\n");
    assert_eq!(second, None);
}

#[test]
fn prompt_is_suppressed_until_input() {
    let engine = ReadinessEngine::default();
    engine.set_family("p1", Some(AgentFamily::Claude));

    let prompt = "\u{276f} ready\n\u{2500}\u{2500}\u{2500}\u{2500}\u{2500}\u{2500}\u{2500}\u{2500}\u{2500}\u{2500}\u{2500}\u{2500}\u{2500}\u{2500}\u{2500}\u{2500}\u{2500}\u{2500}\u{2500}\u{2500}\u{2500}\u{2500}\n? for shortcuts\n";
    assert_eq!(engine.ingest_output("p1", prompt.as_bytes()), Some(Readiness::Prompt));

    // The prompt is already surfaced; further prompt-classified chunks stay quiet.
    assert_eq!(engine.ingest_output("p1", b"\n"), None);

    // Typing resets suppression and marks the session busy.
    engine.mark_input("p1", b"do the thing\r");
    assert_eq!(engine.status("p1").unwrap().state, Readiness::Busy);
}

#[test]
fn pane_observation_maps_to_readiness() {
    let engine = ReadinessEngine::default();

    let (first, changed) = engine.observe_pane("p2", "initial pane", 80, 24);
    assert_eq!(changed, Some(Readiness::Waiting));
    assert_eq!(first.recheck_ms, None);

    let (second, changed) = engine.observe_pane("p2", "pane moved on", 80, 24);
    assert_eq!(changed, Some(Readiness::Busy));
    assert!(second.recheck_ms.is_some());
}

#[test]
fn pane_permission_prompt_surfaces() {
    let engine = ReadinessEngine::default();
    engine.observe_pane("p3", "Do you want to proceed?\n", 80, 24);
    assert_eq!(engine.status("p3").unwrap().state, Readiness::Permission);
}

#[test]
fn clear_drops_session_state() {
    let engine = ReadinessEngine::default();
    engine.mark_ready("p4");
    assert!(engine.status("p4").is_some());
    engine.clear("p4");
    assert!(engine.status("p4").is_none());
}

#[test]
fn status_is_none_before_any_signal() {
    let engine = ReadinessEngine::default();
    assert!(engine.status("unseen").is_none());
    engine.set_family("p5", Some(AgentFamily::Codex));
    // Family registration alone carries no state.
    assert!(engine.status("p5").is_none());
}
