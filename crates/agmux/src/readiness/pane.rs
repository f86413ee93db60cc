// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pane-change inference for tmux-backed sessions.
//!
//! Classifies a pane snapshot against the previous capture. A changing pane
//! means the agent is working; a stable pane showing a confirmation dialog
//! means it is waiting on a permission; anything else is waiting for input.
//! Resizes redraw the whole pane, so a dimension change only counts as
//! activity when the visible words actually differ.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

/// Cached pane snapshot state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaneCache {
    pub content: String,
    pub width: u16,
    pub height: u16,
    /// Epoch ms of the last meaningful content change.
    pub last_changed: i64,
    pub has_ever_changed: bool,
}

/// State inferred from a pane snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaneState {
    Working,
    Permission,
    Waiting,
}

/// Inference result: the state plus when to look again, if at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaneDecision {
    pub state: PaneState,
    pub recheck_ms: Option<i64>,
}

/// Token-set overlap below which a resized pane counts as changed.
const RESIZE_OVERLAP_THRESHOLD: f64 = 0.9;

/// Minimum distinct tokens needed for a reliable overlap comparison.
const MIN_COMPARABLE_TOKENS: usize = 8;

/// Lines from the bottom of the pane searched for permission prompts.
const PERMISSION_WINDOW: usize = 10;

/// Lines from the bottom of the pane used for the resize token comparison.
const OVERLAP_WINDOW: usize = 20;

#[allow(clippy::unwrap_used)]
static TIMER_PARENTHETICAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(\d+s[^)]*\)").unwrap());

#[allow(clippy::unwrap_used)]
static UI_GLYPHS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[•❯⏵⏺↵]").unwrap());

#[allow(clippy::unwrap_used)]
static BOX_DRAWING_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[─│┌┐└┘├┤┬┴┼╭╮╯╰═║\s]+$").unwrap());

/// Status chrome that redraws without meaning anything changed.
const STATUS_METADATA: &[&str] = &[
    "context left",
    "background terminal running",
    "for shortcuts",
    "/ps to view",
    "esc to interrupt",
];

#[allow(clippy::unwrap_used)]
static PERMISSION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)do you want to (?:proceed|continue|allow|run)\??",
        r"(?i)yes,? (?:for|during) this session",
        r"(?i)\[allow\].*\[deny\]",
        r"(?i)\?\s*[\[(]y/n[\])]",
        r"(?i)[\[(]y/n[\])]\s*$",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Whether the trailing lines of a pane show a permission confirmation.
///
/// The catalog is heuristic; misclassification downgrades to `waiting` and
/// is non-fatal.
pub fn detect_permission_prompt(content: &str) -> bool {
    let lines: Vec<&str> = content.lines().collect();
    let skip = lines.len().saturating_sub(PERMISSION_WINDOW);
    let window = &lines[skip..];

    if window.iter().any(|l| PERMISSION_PATTERNS.iter().any(|re| re.is_match(l))) {
        return true;
    }

    // Numbered-option dialogs: a `❯ 1.` selector plus an Esc-to-cancel hint.
    let has_selector = window.iter().any(|l| l.contains("❯ 1."));
    let has_cancel = window.iter().any(|l| l.to_lowercase().contains("esc to cancel"));
    has_selector && has_cancel
}

/// Distinct normalized tokens in the trailing lines of a pane.
fn normalized_tokens(content: &str) -> HashSet<String> {
    let lines: Vec<&str> = content.lines().collect();
    let skip = lines.len().saturating_sub(OVERLAP_WINDOW);

    let mut tokens = HashSet::new();
    for line in &lines[skip..] {
        if line.trim().is_empty() || BOX_DRAWING_LINE.is_match(line) {
            continue;
        }
        let lower = line.to_lowercase();
        if STATUS_METADATA.iter().any(|m| lower.contains(m)) {
            continue;
        }
        let cleaned = TIMER_PARENTHETICAL.replace_all(line, "");
        let cleaned = UI_GLYPHS.replace_all(&cleaned, "");
        for token in cleaned.split_whitespace() {
            tokens.insert(token.to_owned());
        }
    }
    tokens
}

/// Whether a dimension-changed snapshot differs in substance from the
/// previous one: token overlap (by min cardinality) under the threshold, or
/// too few tokens on either side to compare.
fn meaningfully_changed(prev: &str, next: &str) -> bool {
    let a = normalized_tokens(prev);
    let b = normalized_tokens(next);
    if a.len() < MIN_COMPARABLE_TOKENS || b.len() < MIN_COMPARABLE_TOKENS {
        return true;
    }
    let intersection = a.intersection(&b).count();
    let overlap = intersection as f64 / a.len().min(b.len()) as f64;
    overlap < RESIZE_OVERLAP_THRESHOLD
}

/// Classify a new pane snapshot against the cached one.
///
/// Returns the updated cache and the decision. `grace_ms` is the working
/// grace period: an unchanged pane still counts as working until the grace
/// elapses since the last change.
pub fn observe_pane(
    prev: Option<&PaneCache>,
    content: &str,
    width: u16,
    height: u16,
    now: i64,
    grace_ms: i64,
) -> (PaneCache, PaneDecision) {
    let permission = detect_permission_prompt(content);

    let Some(prev) = prev else {
        let cache = PaneCache {
            content: content.to_owned(),
            width,
            height,
            last_changed: now,
            has_ever_changed: false,
        };
        let state = if permission { PaneState::Permission } else { PaneState::Waiting };
        return (cache, PaneDecision { state, recheck_ms: None });
    };

    let changed = if (width, height) != (prev.width, prev.height) {
        meaningfully_changed(&prev.content, content)
    } else {
        content != prev.content
    };

    if changed {
        let cache = PaneCache {
            content: content.to_owned(),
            width,
            height,
            last_changed: now,
            has_ever_changed: true,
        };
        let recheck = grace_ms.max(100);
        return (
            cache,
            PaneDecision { state: PaneState::Working, recheck_ms: Some(recheck) },
        );
    }

    let cache = PaneCache {
        content: content.to_owned(),
        width,
        height,
        last_changed: prev.last_changed,
        has_ever_changed: prev.has_ever_changed,
    };

    if permission {
        return (cache, PaneDecision { state: PaneState::Permission, recheck_ms: None });
    }

    let elapsed = now - cache.last_changed;
    if elapsed < grace_ms && cache.has_ever_changed {
        let recheck = (grace_ms - elapsed).max(1);
        return (
            cache,
            PaneDecision { state: PaneState::Working, recheck_ms: Some(recheck) },
        );
    }

    (cache, PaneDecision { state: PaneState::Waiting, recheck_ms: None })
}

#[cfg(test)]
#[path = "pane_tests.rs"]
mod tests;
