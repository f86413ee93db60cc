// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Unifies live and persisted session summaries into one list for the UI.

use std::collections::HashMap;

use crate::pty::{PtySummary, SessionStatus};

/// Bounds for the inactivity cutoff, in hours.
pub const MIN_INACTIVE_HOURS: i64 = 1;
pub const MAX_INACTIVE_HOURS: i64 = 168;
pub const DEFAULT_INACTIVE_HOURS: i64 = 24;

/// Merge live and persisted summaries.
///
/// Persisted rows claiming `running` are coerced to `exited` — a process
/// cannot be assumed to have survived a restart. Live entries win on id
/// conflicts. Exited sessions older than the inactivity cutoff are dropped.
/// The result is sorted by recency, newest first.
pub fn merge_session_lists(
    live: Vec<PtySummary>,
    persisted: Vec<PtySummary>,
    now: i64,
    inactive_max_age_hours: i64,
    limit: Option<usize>,
) -> Vec<PtySummary> {
    let hours = inactive_max_age_hours.clamp(MIN_INACTIVE_HOURS, MAX_INACTIVE_HOURS);
    let cutoff = now - hours * 3_600 * 1_000;

    let mut by_id: HashMap<String, PtySummary> = HashMap::new();
    for mut summary in persisted {
        if summary.status == SessionStatus::Running {
            summary.status = SessionStatus::Exited;
        }
        by_id.insert(summary.id.clone(), summary);
    }
    for summary in live {
        by_id.insert(summary.id.clone(), summary);
    }

    let mut merged: Vec<PtySummary> = by_id
        .into_values()
        .filter(|s| {
            s.status == SessionStatus::Running || s.last_seen_at.max(s.created_at) >= cutoff
        })
        .collect();

    merged.sort_by_key(|s| std::cmp::Reverse(recency(s)));

    if let Some(limit) = limit.filter(|&n| n > 0) {
        merged.truncate(limit);
    }
    merged
}

fn recency(summary: &PtySummary) -> i64 {
    if summary.last_seen_at > 0 {
        summary.last_seen_at
    } else {
        summary.created_at
    }
}

#[cfg(test)]
#[path = "sessions_tests.rs"]
mod tests;
