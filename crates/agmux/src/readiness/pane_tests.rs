// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{detect_permission_prompt, observe_pane, PaneCache, PaneState};

const GRACE: i64 = 1_500;

fn cache(content: &str, width: u16, height: u16, last_changed: i64, ever: bool) -> PaneCache {
    PaneCache {
        content: content.to_owned(),
        width,
        height,
        last_changed,
        has_ever_changed: ever,
    }
}

#[test]
fn first_observation_is_waiting() {
    let (cache, decision) = observe_pane(None, "shell prompt $", 80, 24, 1_000, GRACE);
    assert_eq!(decision.state, PaneState::Waiting);
    assert_eq!(decision.recheck_ms, None);
    assert!(!cache.has_ever_changed);
}

#[test]
fn first_observation_with_permission_prompt() {
    let content = "Tool wants to edit main.rs\nDo you want to proceed?\n";
    let (_, decision) = observe_pane(None, content, 80, 24, 1_000, GRACE);
    assert_eq!(decision.state, PaneState::Permission);
}

#[test]
fn content_change_means_working() {
    let prev = cache("old output", 80, 24, 500, false);
    let (next, decision) = observe_pane(Some(&prev), "new output", 80, 24, 1_000, GRACE);
    assert_eq!(decision.state, PaneState::Working);
    assert_eq!(decision.recheck_ms, Some(GRACE));
    assert_eq!(next.last_changed, 1_000);
    assert!(next.has_ever_changed);
}

#[test]
fn recheck_floor_is_100ms() {
    let prev = cache("old", 80, 24, 500, false);
    let (_, decision) = observe_pane(Some(&prev), "new", 80, 24, 1_000, 10);
    assert_eq!(decision.recheck_ms, Some(100));
}

#[test]
fn unchanged_within_grace_stays_working() {
    let prev = cache("same", 80, 24, 1_000, true);
    let (_, decision) = observe_pane(Some(&prev), "same", 80, 24, 1_400, GRACE);
    assert_eq!(decision.state, PaneState::Working);
    assert_eq!(decision.recheck_ms, Some(GRACE - 400));
}

#[test]
fn unchanged_past_grace_is_waiting() {
    let prev = cache("same", 80, 24, 1_000, true);
    let (_, decision) = observe_pane(Some(&prev), "same", 80, 24, 1_000 + GRACE, GRACE);
    assert_eq!(decision.state, PaneState::Waiting);
}

#[test]
fn never_changed_pane_is_waiting_even_within_grace() {
    let prev = cache("same", 80, 24, 1_000, false);
    let (_, decision) = observe_pane(Some(&prev), "same", 80, 24, 1_100, GRACE);
    assert_eq!(decision.state, PaneState::Waiting);
}

#[test]
fn stable_pane_with_permission_prompt() {
    let content = "running tool\n? [y/N]\n";
    let prev = cache(content, 80, 24, 0, true);
    let (_, decision) = observe_pane(Some(&prev), content, 80, 24, 10_000, GRACE);
    assert_eq!(decision.state, PaneState::Permission);
}

#[test]
fn resize_with_same_words_is_not_a_change() {
    let prev_content = "alpha beta gamma delta epsilon zeta eta theta iota kappa\n";
    // Same tokens re-wrapped at a narrower width.
    let next_content = "alpha beta gamma delta epsilon\nzeta eta theta iota kappa\n";
    let prev = cache(prev_content, 120, 30, 1_000, true);
    let (_, decision) = observe_pane(Some(&prev), next_content, 80, 30, 5_000, GRACE);
    assert_eq!(decision.state, PaneState::Waiting);
}

#[test]
fn resize_with_new_words_is_a_change() {
    let prev_content = "alpha beta gamma delta epsilon zeta eta theta iota kappa\n";
    let next_content = "one two three four five six seven eight nine ten\n";
    let prev = cache(prev_content, 120, 30, 1_000, true);
    let (_, decision) = observe_pane(Some(&prev), next_content, 80, 30, 5_000, GRACE);
    assert_eq!(decision.state, PaneState::Working);
}

#[test]
fn resize_with_sparse_panes_counts_as_change() {
    let prev = cache("ok\n", 120, 30, 1_000, true);
    let (_, decision) = observe_pane(Some(&prev), "ok\n", 80, 30, 5_000, GRACE);
    assert_eq!(decision.state, PaneState::Working);
}

#[test]
fn status_chrome_does_not_affect_the_resize_comparison() {
    let prev_content = "alpha beta gamma delta epsilon zeta eta theta\n42% context left\n";
    let next_content = "alpha beta gamma delta epsilon zeta eta theta\n17% context left\n";
    let prev = cache(prev_content, 120, 30, 1_000, true);
    let (_, decision) = observe_pane(Some(&prev), next_content, 80, 30, 5_000, GRACE);
    assert_eq!(decision.state, PaneState::Waiting);
}

#[yare::parameterized(
    proceed = { "Do you want to proceed?" },
    continue_q = { "do you want to continue?" },
    allow_run = { "Do you want to run this command?" },
    session_yes = { "1. Yes, for this session" },
    session_during = { "yes, during this session" },
    allow_deny = { "[Allow]   [Deny]" },
    y_n = { "Overwrite? [y/N]" },
    numbered_with_esc = { "❯ 1. Yes\n  2. No\nEsc to cancel" },
)]
fn permission_catalog(snippet: &str) {
    let content = format!("tool output\n{snippet}\n");
    assert!(detect_permission_prompt(&content), "missed: {snippet}");
}

#[test]
fn permission_prompt_outside_window_is_ignored() {
    let mut content = String::from("Do you want to proceed?\n");
    for i in 0..12 {
        content.push_str(&format!("subsequent line {i}\n"));
    }
    assert!(!detect_permission_prompt(&content));
}

#[test]
fn numbered_options_without_cancel_hint_are_not_permission() {
    assert!(!detect_permission_prompt("❯ 1. apples\n2. oranges\n"));
}
