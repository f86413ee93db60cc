// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

pub mod pane;
pub mod signal;
pub mod tail;

use std::collections::HashMap;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::now_ms;
use pane::{observe_pane, PaneCache, PaneDecision, PaneState};
use signal::{detect_output_signal, AgentFamily, OutputSignal, SignalOverrides};
use tail::RollingTail;

/// Default working grace period for pane-change inference.
pub const DEFAULT_GRACE_MS: i64 = 1_500;

/// Inferred per-session readiness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Readiness {
    Busy,
    Prompt,
    Permission,
    Waiting,
    Ready,
}

/// Snapshot of a session's readiness state.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadinessSnapshot {
    pub state: Readiness,
    pub since: i64,
}

#[derive(Debug, Default)]
struct SessionReadiness {
    family: Option<AgentFamily>,
    tail: RollingTail,
    pane: Option<PaneCache>,
    state: Option<Readiness>,
    since: i64,
    /// Set when a prompt has been surfaced; cleared by user input so the
    /// next prompt detection fires a fresh transition.
    prompt_surfaced: bool,
}

/// Owns per-session tails, pane caches, and debounced readiness state.
///
/// Output chunks and pane snapshots feed in; state transitions come out so
/// the hub can notify clients. All caches are keyed by PTY id and cleared
/// on exit.
pub struct ReadinessEngine {
    sessions: Mutex<HashMap<String, SessionReadiness>>,
    overrides: SignalOverrides,
    grace_ms: i64,
}

impl Default for ReadinessEngine {
    fn default() -> Self {
        Self::new(SignalOverrides::default(), DEFAULT_GRACE_MS)
    }
}

impl ReadinessEngine {
    pub fn new(overrides: SignalOverrides, grace_ms: i64) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            overrides,
            grace_ms,
        }
    }

    /// Record which agent family a session runs, gating its catalogs.
    pub fn set_family(&self, id: &str, family: Option<AgentFamily>) {
        let mut sessions = self.sessions.lock();
        sessions.entry(id.to_owned()).or_default().family = family;
    }

    /// Feed an output chunk. Returns the new readiness when the chunk
    /// caused a state transition.
    pub fn ingest_output(&self, id: &str, chunk: &[u8]) -> Option<Readiness> {
        let decoded = String::from_utf8_lossy(chunk);
        let mut sessions = self.sessions.lock();
        let session = sessions.entry(id.to_owned()).or_default();
        session.tail.push(&decoded);

        let signal = detect_output_signal(session.tail.as_str(), session.family, &self.overrides);
        let next = match signal {
            OutputSignal::Busy => Some(Readiness::Busy),
            OutputSignal::Prompt => {
                if session.prompt_surfaced {
                    return None;
                }
                session.prompt_surfaced = true;
                Some(Readiness::Prompt)
            }
            OutputSignal::None => None,
        }?;

        transition(session, next)
    }

    /// Feed user keystrokes: resets prompt suppression so the next detected
    /// prompt surfaces again, and marks the session busy (the agent is
    /// about to process input).
    pub fn mark_input(&self, id: &str, _data: &[u8]) {
        let mut sessions = self.sessions.lock();
        let session = sessions.entry(id.to_owned()).or_default();
        session.prompt_surfaced = false;
        transition(session, Readiness::Busy);
    }

    /// Feed a tmux pane snapshot. Returns the decision (with its recheck
    /// hint) plus the readiness transition, if any.
    pub fn observe_pane(
        &self,
        id: &str,
        content: &str,
        width: u16,
        height: u16,
    ) -> (PaneDecision, Option<Readiness>) {
        let mut sessions = self.sessions.lock();
        let session = sessions.entry(id.to_owned()).or_default();

        let (cache, decision) = observe_pane(
            session.pane.as_ref(),
            content,
            width,
            height,
            now_ms(),
            self.grace_ms,
        );
        session.pane = Some(cache);

        let next = match decision.state {
            PaneState::Working => Readiness::Busy,
            PaneState::Permission => Readiness::Permission,
            PaneState::Waiting => Readiness::Waiting,
        };
        let changed = transition(session, next);
        (decision, changed)
    }

    /// Mark a session ready (e.g. a tmux pane sitting at a bare shell).
    pub fn mark_ready(&self, id: &str) {
        let mut sessions = self.sessions.lock();
        let session = sessions.entry(id.to_owned()).or_default();
        transition(session, Readiness::Ready);
    }

    pub fn status(&self, id: &str) -> Option<ReadinessSnapshot> {
        let sessions = self.sessions.lock();
        let session = sessions.get(id)?;
        Some(ReadinessSnapshot {
            state: session.state?,
            since: session.since,
        })
    }

    /// Drop all per-session state. Called on exit.
    pub fn clear(&self, id: &str) {
        self.sessions.lock().remove(id);
    }
}

/// Apply a state transition; returns the new state only when it differs.
fn transition(session: &mut SessionReadiness, next: Readiness) -> Option<Readiness> {
    if session.state == Some(next) {
        return None;
    }
    session.state = Some(next);
    session.since = now_ms();
    Some(next)
}

#[cfg(test)]
#[path = "readiness_tests.rs"]
mod tests;
