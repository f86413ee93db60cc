// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Output triggers and attention highlights.
//!
//! Users configure named regex triggers in the `settings` preference;
//! matching output lines broadcast a `trigger_fired` frame. Independently,
//! a session whose readiness lands on `prompt` or `permission` broadcasts
//! a `pty_highlight` so the UI can draw the eye to it.

use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use crate::readiness::Readiness;

/// TTL attached to attention highlights.
pub const HIGHLIGHT_TTL_MS: i64 = 5_000;

/// One configured trigger, as stored in preferences.
#[derive(Debug, Clone, Deserialize)]
pub struct TriggerConfig {
    pub name: String,
    pub pattern: String,
}

/// A trigger match on one output line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerHit {
    pub trigger: String,
    pub matched: String,
    pub line: String,
}

/// Compiled trigger patterns.
#[derive(Debug, Default)]
pub struct TriggerSet {
    triggers: Vec<(String, Regex)>,
}

impl TriggerSet {
    /// Compile triggers from the `settings` preference value. Invalid
    /// patterns are skipped; a missing or malformed section means no
    /// triggers.
    pub fn from_settings(settings: Option<&serde_json::Value>) -> Self {
        let configs: Vec<TriggerConfig> = settings
            .and_then(|v| v.get("triggers"))
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();

        let mut triggers = Vec::with_capacity(configs.len());
        for config in configs {
            match Regex::new(&config.pattern) {
                Ok(re) => triggers.push((config.name, re)),
                Err(e) => debug!(trigger = %config.name, "skipping invalid trigger pattern: {e}"),
            }
        }
        Self { triggers }
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }

    /// Match a decoded output chunk line-by-line.
    pub fn scan(&self, chunk: &str) -> Vec<TriggerHit> {
        if self.triggers.is_empty() {
            return vec![];
        }
        let mut hits = Vec::new();
        for line in chunk.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            for (name, re) in &self.triggers {
                if let Some(m) = re.find(line) {
                    hits.push(TriggerHit {
                        trigger: name.clone(),
                        matched: m.as_str().to_owned(),
                        line: line.to_owned(),
                    });
                }
            }
        }
        hits
    }
}

/// The highlight reason for a readiness transition, when one is warranted.
pub fn highlight_reason(state: Readiness) -> Option<&'static str> {
    match state {
        Readiness::Prompt => Some("prompt"),
        Readiness::Permission => Some("permission"),
        Readiness::Busy | Readiness::Waiting | Readiness::Ready => None,
    }
}

#[cfg(test)]
#[path = "triggers_tests.rs"]
mod tests;
