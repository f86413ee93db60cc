// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SQLite-backed durable store: session summaries, agent-session identities,
//! and UI preferences. Single connection in WAL mode; all access serialized
//! behind one lock. An unusable store file is a fatal startup error.

use std::path::Path;

use anyhow::Context;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::pty::{PtyBackend, PtySummary, SessionStatus};

const DB_FILE: &str = "agmux.db";

/// Coding-agent CLI that owns a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentProvider {
    Claude,
    Codex,
    Pi,
}

impl AgentProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Claude => "claude",
            Self::Codex => "codex",
            Self::Pi => "pi",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "claude" => Some(Self::Claude),
            "codex" => Some(Self::Codex),
            "pi" => Some(Self::Pi),
            _ => None,
        }
    }
}

/// Provenance of a stored working directory, in ascending trust order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CwdSource {
    Log,
    Db,
    Runtime,
    User,
}

impl CwdSource {
    /// Merge priority: log < db < runtime < user.
    pub fn priority(&self) -> u8 {
        match self {
            Self::Log => 0,
            Self::Db => 1,
            Self::Runtime => 2,
            Self::User => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Log => "log",
            Self::Db => "db",
            Self::Runtime => "runtime",
            Self::User => "user",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "log" => Some(Self::Log),
            "db" => Some(Self::Db),
            "runtime" => Some(Self::Runtime),
            "user" => Some(Self::User),
            _ => None,
        }
    }
}

/// Durable identity of a coding-agent conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSessionRecord {
    pub provider: AgentProvider,
    pub provider_session_id: String,
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    pub cwd_source: CwdSource,
    pub created_at: i64,
    pub last_seen_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_restored_at: Option<i64>,
}

/// Fold an incoming record into the stored one, per the merge contract:
/// the stored cwd is only replaced by a present cwd from a strictly
/// higher-priority source (or equal priority, newer `last_seen_at`);
/// `created_at` takes the minimum, `last_seen_at` the maximum; descriptive
/// fields follow the newer contributor.
pub fn merge_records(current: &AgentSessionRecord, incoming: &AgentSessionRecord) -> AgentSessionRecord {
    let take_incoming_cwd = incoming.cwd.is_some()
        && (current.cwd.is_none()
            || incoming.cwd_source.priority() > current.cwd_source.priority()
            || (incoming.cwd_source.priority() == current.cwd_source.priority()
                && incoming.last_seen_at > current.last_seen_at));

    let (cwd, cwd_source) = if take_incoming_cwd {
        (incoming.cwd.clone(), incoming.cwd_source)
    } else {
        (current.cwd.clone(), current.cwd_source)
    };

    let newer = if incoming.last_seen_at >= current.last_seen_at { incoming } else { current };

    let last_restored_at = match (current.last_restored_at, incoming.last_restored_at) {
        (None, None) => None,
        (a, b) => Some(a.unwrap_or(0).max(b.unwrap_or(0))).filter(|&v| v > 0),
    };

    AgentSessionRecord {
        provider: current.provider,
        provider_session_id: current.provider_session_id.clone(),
        name: newer.name.clone(),
        command: newer.command.clone(),
        args: newer.args.clone(),
        cwd,
        cwd_source,
        created_at: current.created_at.min(incoming.created_at),
        last_seen_at: current.last_seen_at.max(incoming.last_seen_at),
        last_restored_at,
    }
}

/// Single-connection SQLite store.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open (or create) the database under `data_dir` and ensure the schema.
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        Self::open_file(&data_dir.join(DB_FILE))
    }

    /// Open a specific database file (used by tests).
    pub fn open_file(path: &Path) -> anyhow::Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open store at {}", path.display()))?;
        conn.pragma_update(None, "journal_mode", "WAL").context("enabling WAL")?;
        create_tables(&conn).context("creating tables")?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Persist a session summary (insert or full replace by id).
    pub fn upsert_session(&self, summary: &PtySummary) -> anyhow::Result<()> {
        let args_json = serde_json::to_string(&summary.args)?;
        let backend = match summary.backend {
            PtyBackend::Pty => "pty",
            PtyBackend::Tmux => "tmux",
        };
        let status = match summary.status {
            SessionStatus::Running => "running",
            SessionStatus::Exited => "exited",
        };
        self.conn.lock().execute(
            "INSERT INTO sessions
                 (id, name, command, args_json, cwd, created_at, last_seen_at,
                  status, exit_code, exit_signal, backend, tmux_session)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 command = excluded.command,
                 args_json = excluded.args_json,
                 cwd = excluded.cwd,
                 last_seen_at = excluded.last_seen_at,
                 status = excluded.status,
                 exit_code = excluded.exit_code,
                 exit_signal = excluded.exit_signal,
                 backend = excluded.backend,
                 tmux_session = excluded.tmux_session",
            params![
                summary.id,
                summary.name,
                summary.command,
                args_json,
                summary.cwd,
                summary.created_at,
                summary.last_seen_at,
                status,
                summary.exit_code,
                summary.exit_signal,
                backend,
                summary.tmux_session,
            ],
        )?;
        Ok(())
    }

    pub fn list_sessions(&self) -> anyhow::Result<Vec<PtySummary>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, name, command, args_json, cwd, created_at, last_seen_at,
                    status, exit_code, exit_signal, backend, tmux_session
             FROM sessions",
        )?;
        let rows = stmt.query_map([], row_to_summary)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Normalize stale rows on startup: a process cannot have survived a
    /// restart, so every persisted `running` becomes `exited`.
    pub fn mark_running_exited(&self) -> anyhow::Result<usize> {
        let n = self
            .conn
            .lock()
            .execute("UPDATE sessions SET status = 'exited' WHERE status = 'running'", [])?;
        Ok(n)
    }

    pub fn delete_session(&self, id: &str) -> anyhow::Result<bool> {
        let n = self.conn.lock().execute("DELETE FROM sessions WHERE id = ?1", params![id])?;
        Ok(n > 0)
    }

    pub fn get_agent_session(
        &self,
        provider: AgentProvider,
        provider_session_id: &str,
    ) -> anyhow::Result<Option<AgentSessionRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT provider, provider_session_id, name, command, args_json, cwd,
                    cwd_source, created_at, last_seen_at, last_restored_at
             FROM agent_sessions
             WHERE provider = ?1 AND provider_session_id = ?2",
        )?;
        let record = stmt
            .query_row(params![provider.as_str(), provider_session_id], row_to_record)
            .optional()?;
        Ok(record)
    }

    /// Merge-upsert an agent-session record; returns the stored result.
    pub fn upsert_agent_session(
        &self,
        incoming: &AgentSessionRecord,
    ) -> anyhow::Result<AgentSessionRecord> {
        let merged = match self
            .get_agent_session(incoming.provider, &incoming.provider_session_id)?
        {
            Some(current) => merge_records(&current, incoming),
            None => incoming.clone(),
        };

        let args_json = serde_json::to_string(&merged.args)?;
        self.conn.lock().execute(
            "INSERT INTO agent_sessions
                 (provider, provider_session_id, name, command, args_json, cwd,
                  cwd_source, created_at, last_seen_at, last_restored_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(provider, provider_session_id) DO UPDATE SET
                 name = excluded.name,
                 command = excluded.command,
                 args_json = excluded.args_json,
                 cwd = excluded.cwd,
                 cwd_source = excluded.cwd_source,
                 created_at = excluded.created_at,
                 last_seen_at = excluded.last_seen_at,
                 last_restored_at = excluded.last_restored_at",
            params![
                merged.provider.as_str(),
                merged.provider_session_id,
                merged.name,
                merged.command,
                args_json,
                merged.cwd,
                merged.cwd_source.as_str(),
                merged.created_at,
                merged.last_seen_at,
                merged.last_restored_at,
            ],
        )?;
        Ok(merged)
    }

    pub fn list_agent_sessions(&self) -> anyhow::Result<Vec<AgentSessionRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT provider, provider_session_id, name, command, args_json, cwd,
                    cwd_source, created_at, last_seen_at, last_restored_at
             FROM agent_sessions",
        )?;
        let rows = stmt.query_map([], row_to_record)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn get_preference(&self, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
        let conn = self.conn.lock();
        let json: Option<String> = conn
            .query_row(
                "SELECT value_json FROM preferences WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        match json {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    pub fn set_preference(&self, key: &str, value: &serde_json::Value) -> anyhow::Result<()> {
        let text = serde_json::to_string(value)?;
        self.conn.lock().execute(
            "INSERT INTO preferences (key, value_json) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
            params![key, text],
        )?;
        Ok(())
    }
}

fn create_tables(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS sessions (
            id            TEXT PRIMARY KEY,
            name          TEXT NOT NULL,
            command       TEXT NOT NULL,
            args_json     TEXT NOT NULL,
            cwd           TEXT,
            created_at    INTEGER NOT NULL,
            last_seen_at  INTEGER NOT NULL,
            status        TEXT NOT NULL,
            exit_code     INTEGER,
            exit_signal   INTEGER,
            backend       TEXT,
            tmux_session  TEXT
        );

        CREATE TABLE IF NOT EXISTS agent_sessions (
            provider             TEXT NOT NULL,
            provider_session_id  TEXT NOT NULL,
            name                 TEXT NOT NULL,
            command              TEXT NOT NULL,
            args_json            TEXT NOT NULL,
            cwd                  TEXT,
            cwd_source           TEXT NOT NULL,
            created_at           INTEGER NOT NULL,
            last_seen_at         INTEGER NOT NULL,
            last_restored_at     INTEGER,
            PRIMARY KEY (provider, provider_session_id)
        );

        CREATE TABLE IF NOT EXISTS preferences (
            key         TEXT PRIMARY KEY,
            value_json  TEXT NOT NULL
        );
        ",
    )
}

fn row_to_summary(row: &rusqlite::Row<'_>) -> rusqlite::Result<PtySummary> {
    let args_json: String = row.get(3)?;
    let status: String = row.get(7)?;
    let backend: Option<String> = row.get(10)?;
    Ok(PtySummary {
        id: row.get(0)?,
        name: row.get(1)?,
        command: row.get(2)?,
        args: serde_json::from_str(&args_json).unwrap_or_default(),
        cwd: row.get(4)?,
        backend: match backend.as_deref() {
            Some("tmux") => PtyBackend::Tmux,
            _ => PtyBackend::Pty,
        },
        tmux_session: row.get(11)?,
        tmux_server: None,
        created_at: row.get(5)?,
        last_seen_at: row.get(6)?,
        status: if status == "running" { SessionStatus::Running } else { SessionStatus::Exited },
        exit_code: row.get(8)?,
        exit_signal: row.get(9)?,
    })
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<AgentSessionRecord> {
    let provider: String = row.get(0)?;
    let args_json: String = row.get(4)?;
    let cwd_source: String = row.get(6)?;
    let last_restored_at: Option<i64> = row.get(9)?;
    Ok(AgentSessionRecord {
        provider: AgentProvider::parse(&provider).unwrap_or(AgentProvider::Claude),
        provider_session_id: row.get(1)?,
        name: row.get(2)?,
        command: row.get(3)?,
        args: serde_json::from_str(&args_json).unwrap_or_default(),
        cwd: row.get(5)?,
        cwd_source: CwdSource::parse(&cwd_source).unwrap_or(CwdSource::Db),
        created_at: row.get(7)?,
        last_seen_at: row.get(8)?,
        last_restored_at: last_restored_at.filter(|&v| v > 0),
    })
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
