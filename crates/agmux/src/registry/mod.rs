// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable registry of coding-agent conversations.
//!
//! A single agent session may be visible from three places at once: the
//! `agent_sessions` table, a legacy `sessions` row keyed
//! `log:<provider>:<id>`, and a conversation log file on disk. Listing
//! merges all three under the documented cwd-provenance precedence.

pub mod logs;
pub mod restore;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::pty::PtySummary;
use crate::store::{merge_records, AgentProvider, AgentSessionRecord, CwdSource, Store};

use logs::LogDiscovery;

/// Resume CLI arguments for a provider: claude takes a flag, codex and pi
/// take a subcommand.
pub fn resume_args(provider: AgentProvider, provider_session_id: &str) -> Vec<String> {
    match provider {
        AgentProvider::Claude => {
            vec!["--resume".to_owned(), provider_session_id.to_owned()]
        }
        AgentProvider::Codex | AgentProvider::Pi => {
            vec!["resume".to_owned(), provider_session_id.to_owned()]
        }
    }
}

/// Parse a legacy `sessions` row id of the form `log:<provider>:<id>`.
pub fn parse_legacy_id(id: &str) -> Option<(AgentProvider, &str)> {
    let rest = id.strip_prefix("log:")?;
    let (provider, session_id) = rest.split_once(':')?;
    if session_id.is_empty() {
        return None;
    }
    Some((AgentProvider::parse(provider)?, session_id))
}

fn legacy_row_to_record(summary: &PtySummary) -> Option<AgentSessionRecord> {
    let (provider, session_id) = parse_legacy_id(&summary.id)?;
    Some(AgentSessionRecord {
        provider,
        provider_session_id: session_id.to_owned(),
        name: summary.name.clone(),
        command: summary.command.clone(),
        args: summary.args.clone(),
        cwd: summary.cwd.clone(),
        cwd_source: CwdSource::Db,
        created_at: summary.created_at,
        last_seen_at: summary.last_seen_at,
        last_restored_at: None,
    })
}

/// Fold candidate records sharing `(provider, provider_session_id)` into a
/// single entry each, sorted by `last_seen_at` descending.
pub fn merge_candidates(candidates: Vec<AgentSessionRecord>) -> Vec<AgentSessionRecord> {
    let mut by_key: HashMap<(AgentProvider, String), AgentSessionRecord> = HashMap::new();
    for candidate in candidates {
        let key = (candidate.provider, candidate.provider_session_id.clone());
        match by_key.get_mut(&key) {
            Some(current) => {
                let merged = merge_records(current, &candidate);
                *current = merged;
            }
            None => {
                by_key.insert(key, candidate);
            }
        }
    }
    let mut merged: Vec<AgentSessionRecord> = by_key.into_values().collect();
    merged.sort_by_key(|r| std::cmp::Reverse(r.last_seen_at));
    merged
}

/// Registry over the durable store, legacy rows, and discovered logs.
pub struct AgentSessionRegistry {
    store: Arc<Store>,
    logs: LogDiscovery,
    /// Live attachment of a PTY to the agent session it is showing.
    attachments: Mutex<HashMap<String, (AgentProvider, String)>>,
}

impl AgentSessionRegistry {
    pub fn new(store: Arc<Store>, logs: LogDiscovery) -> Self {
        Self {
            store,
            logs,
            attachments: Mutex::new(HashMap::new()),
        }
    }

    /// All known agent sessions, merged across sources, newest first.
    pub fn list_agent_sessions(&self) -> anyhow::Result<Vec<AgentSessionRecord>> {
        let mut candidates = self.store.list_agent_sessions()?;

        match self.store.list_sessions() {
            Ok(rows) => {
                candidates.extend(rows.iter().filter_map(legacy_row_to_record));
            }
            Err(e) => debug!("legacy session scan failed: {e:#}"),
        }

        candidates.extend(self.logs.discover());
        Ok(merge_candidates(candidates))
    }

    pub fn find_agent_session(
        &self,
        provider: AgentProvider,
        provider_session_id: &str,
    ) -> anyhow::Result<Option<AgentSessionRecord>> {
        Ok(self
            .list_agent_sessions()?
            .into_iter()
            .find(|r| r.provider == provider && r.provider_session_id == provider_session_id))
    }

    pub fn upsert_agent_session(
        &self,
        record: &AgentSessionRecord,
    ) -> anyhow::Result<AgentSessionRecord> {
        self.store.upsert_agent_session(record)
    }

    /// Record a runtime-observed cwd for the agent session a PTY shows.
    /// No-op when the PTY has no attachment.
    pub fn persist_runtime_cwd_for_agent_pty(
        &self,
        pty_id: &str,
        cwd: &str,
        ts: i64,
    ) -> anyhow::Result<()> {
        let key = { self.attachments.lock().get(pty_id).cloned() };
        let Some((provider, session_id)) = key else {
            return Ok(());
        };

        let base = self.store.get_agent_session(provider, &session_id)?;
        let incoming = AgentSessionRecord {
            provider,
            provider_session_id: session_id.clone(),
            name: base.as_ref().map(|r| r.name.clone()).unwrap_or_else(|| session_id.clone()),
            command: base
                .as_ref()
                .map(|r| r.command.clone())
                .unwrap_or_else(|| provider.as_str().to_owned()),
            args: base
                .as_ref()
                .map(|r| r.args.clone())
                .unwrap_or_else(|| resume_args(provider, &session_id)),
            cwd: Some(cwd.to_owned()),
            cwd_source: CwdSource::Runtime,
            created_at: base.as_ref().map(|r| r.created_at).unwrap_or(ts),
            last_seen_at: ts,
            last_restored_at: None,
        };
        self.store.upsert_agent_session(&incoming)?;
        Ok(())
    }

    /// Bind a PTY to the agent session it is attached to.
    pub fn attach_pty(&self, pty_id: &str, provider: AgentProvider, provider_session_id: &str) {
        self.attachments
            .lock()
            .insert(pty_id.to_owned(), (provider, provider_session_id.to_owned()));
    }

    /// Drop a PTY's attachment. Called on exit.
    pub fn detach_pty(&self, pty_id: &str) {
        self.attachments.lock().remove(pty_id);
    }

    pub fn attachment(&self, pty_id: &str) -> Option<(AgentProvider, String)> {
        self.attachments.lock().get(pty_id).cloned()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
