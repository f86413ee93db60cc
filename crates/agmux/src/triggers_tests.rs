// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{highlight_reason, TriggerSet};
use crate::readiness::Readiness;

#[test]
fn triggers_compile_from_the_settings_preference() {
    let settings = serde_json::json!({
        "triggers": [
            {"name": "build-done", "pattern": "BUILD (OK|FAILED)"},
            {"name": "broken", "pattern": "("}
        ]
    });
    let set = TriggerSet::from_settings(Some(&settings));

    let hits = set.scan("12:00 BUILD OK\nnothing here\n");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].trigger, "build-done");
    assert_eq!(hits[0].matched, "BUILD OK");
    assert_eq!(hits[0].line, "12:00 BUILD OK");
}

#[test]
fn missing_settings_mean_no_triggers() {
    assert!(TriggerSet::from_settings(None).is_empty());
    let settings = serde_json::json!({"theme": "dark"});
    assert!(TriggerSet::from_settings(Some(&settings)).is_empty());
}

#[test]
fn each_matching_line_fires_once_per_trigger() {
    let settings = serde_json::json!({
        "triggers": [{"name": "err", "pattern": "ERROR"}]
    });
    let set = TriggerSet::from_settings(Some(&settings));
    let hits = set.scan("ERROR one\nok\nERROR two\n");
    assert_eq!(hits.len(), 2);
}

#[yare::parameterized(
    prompt = { Readiness::Prompt, Some("prompt") },
    permission = { Readiness::Permission, Some("permission") },
    busy = { Readiness::Busy, None },
    waiting = { Readiness::Waiting, None },
    ready = { Readiness::Ready, None },
)]
fn highlight_only_for_attention_states(state: Readiness, expected: Option<&str>) {
    assert_eq!(highlight_reason(state), expected);
}
