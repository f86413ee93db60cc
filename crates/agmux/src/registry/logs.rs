// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Filesystem discovery of provider conversation logs.
//!
//! Each provider keeps per-conversation JSONL files under a canonical home
//! directory. Discovery enumerates them into agent-session candidates with
//! `cwd_source = log`. Unreadable trees degrade to an empty list; results
//! are cached briefly because the UI polls the merged listing.

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::debug;

use crate::store::{AgentProvider, AgentSessionRecord, CwdSource};

/// Default cap on files examined per discovery pass.
pub const DEFAULT_SCAN_LIMIT: usize = 500;

/// Default cache lifetime for discovery results.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5);

pub struct LogDiscovery {
    home: PathBuf,
    scan_limit: usize,
    cache_ttl: Duration,
    cache: Mutex<Option<(Instant, Vec<AgentSessionRecord>)>>,
}

impl LogDiscovery {
    pub fn new(scan_limit: usize, cache_ttl: Duration) -> Self {
        let home = std::env::var("HOME").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("."));
        Self::with_home(home, scan_limit, cache_ttl)
    }

    pub fn with_home(home: PathBuf, scan_limit: usize, cache_ttl: Duration) -> Self {
        Self {
            home,
            scan_limit,
            cache_ttl,
            cache: Mutex::new(None),
        }
    }

    /// Enumerate `(provider, provider_session_id, cwd?)` candidates from
    /// all providers' log trees.
    pub fn discover(&self) -> Vec<AgentSessionRecord> {
        {
            let cache = self.cache.lock();
            if let Some((at, ref records)) = *cache {
                if at.elapsed() < self.cache_ttl {
                    return records.clone();
                }
            }
        }

        let mut budget = self.scan_limit;
        let mut records = Vec::new();
        records.extend(self.discover_project_tree(
            AgentProvider::Claude,
            &self.home.join(".claude").join("projects"),
            &mut budget,
        ));
        records.extend(self.discover_codex(&mut budget));
        records.extend(self.discover_project_tree(
            AgentProvider::Pi,
            &self.home.join(".pi").join("agent").join("sessions"),
            &mut budget,
        ));

        *self.cache.lock() = Some((Instant::now(), records.clone()));
        records
    }

    /// claude/pi layout: `<root>/<munged-cwd>/<session-uuid>.jsonl`.
    fn discover_project_tree(
        &self,
        provider: AgentProvider,
        root: &Path,
        budget: &mut usize,
    ) -> Vec<AgentSessionRecord> {
        let mut out = Vec::new();
        let Ok(projects) = fs::read_dir(root) else {
            return out;
        };

        for project in projects.flatten() {
            let project_path = project.path();
            if !project_path.is_dir() {
                continue;
            }
            let cwd = decode_munged_cwd(&project.file_name().to_string_lossy());

            let Ok(files) = fs::read_dir(&project_path) else {
                continue;
            };
            for file in files.flatten() {
                if *budget == 0 {
                    debug!("log discovery scan limit reached");
                    return out;
                }
                *budget -= 1;

                let path = file.path();
                let Some(session_id) = jsonl_stem(&path).filter(|s| looks_like_uuid(s)) else {
                    continue;
                };
                let seen = mtime_ms(&path);
                out.push(AgentSessionRecord {
                    provider,
                    provider_session_id: session_id.to_owned(),
                    name: format!("{} {}", provider.as_str(), short_id(session_id)),
                    command: provider.as_str().to_owned(),
                    args: super::resume_args(provider, session_id),
                    cwd: cwd.clone(),
                    cwd_source: CwdSource::Log,
                    created_at: seen,
                    last_seen_at: seen,
                    last_restored_at: None,
                });
            }
        }
        out
    }

    /// codex layout: `~/.codex/sessions/YYYY/MM/DD/rollout-<ts>-<uuid>.jsonl`
    /// with the cwd recorded in the first JSONL entry.
    fn discover_codex(&self, budget: &mut usize) -> Vec<AgentSessionRecord> {
        let root = self.home.join(".codex").join("sessions");
        let mut files = Vec::new();
        collect_jsonl_files(&root, 4, &mut files);

        let mut out = Vec::new();
        for path in files {
            if *budget == 0 {
                debug!("log discovery scan limit reached");
                break;
            }
            *budget -= 1;

            let Some(stem) = jsonl_stem(&path) else { continue };
            let Some(session_id) = rollout_session_id(stem) else { continue };
            let seen = mtime_ms(&path);
            out.push(AgentSessionRecord {
                provider: AgentProvider::Codex,
                provider_session_id: session_id.to_owned(),
                name: format!("codex {}", short_id(session_id)),
                command: "codex".to_owned(),
                args: super::resume_args(AgentProvider::Codex, session_id),
                cwd: first_line_cwd(&path),
                cwd_source: CwdSource::Log,
                created_at: seen,
                last_seen_at: seen,
                last_restored_at: None,
            });
        }
        out
    }
}

/// Claude and pi munge the project cwd into a directory name by replacing
/// `/` with `-`. The decode is lossy for paths containing dashes; the
/// merged cwd precedence lets higher-trust sources correct it.
pub fn decode_munged_cwd(munged: &str) -> Option<String> {
    if !munged.starts_with('-') {
        return None;
    }
    Some(munged.replace('-', "/"))
}

/// The session UUID at the end of a codex rollout file stem.
pub fn rollout_session_id(stem: &str) -> Option<&str> {
    let rest = stem.strip_prefix("rollout-")?;
    if rest.len() < 36 {
        return None;
    }
    let candidate = &rest[rest.len() - 36..];
    looks_like_uuid(candidate).then_some(candidate)
}

pub fn looks_like_uuid(s: &str) -> bool {
    let bytes = s.as_bytes();
    if bytes.len() != 36 {
        return false;
    }
    s.char_indices().all(|(i, c)| match i {
        8 | 13 | 18 | 23 => c == '-',
        _ => c.is_ascii_hexdigit(),
    })
}

fn jsonl_stem(path: &Path) -> Option<&str> {
    if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
        return None;
    }
    path.file_stem().and_then(|s| s.to_str())
}

fn short_id(id: &str) -> &str {
    id.split('-').next().unwrap_or(id)
}

fn mtime_ms(path: &Path) -> i64 {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Pull a `cwd` field out of the first JSONL entry, if the file has one.
fn first_line_cwd(path: &Path) -> Option<String> {
    let file = fs::File::open(path).ok()?;
    let mut line = String::new();
    BufReader::new(file).read_line(&mut line).ok()?;
    let value: serde_json::Value = serde_json::from_str(line.trim()).ok()?;
    find_cwd(&value)
}

fn find_cwd(value: &serde_json::Value) -> Option<String> {
    if let Some(cwd) = value.get("cwd").and_then(|v| v.as_str()) {
        return Some(cwd.to_owned());
    }
    // Codex nests session metadata one level down.
    value
        .get("payload")
        .and_then(|p| p.get("cwd"))
        .and_then(|v| v.as_str())
        .map(str::to_owned)
}

fn collect_jsonl_files(dir: &Path, max_depth: usize, out: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            if max_depth > 0 {
                collect_jsonl_files(&path, max_depth - 1, out);
            }
        } else if path.extension().and_then(|e| e.to_str()) == Some("jsonl") {
            out.push(path);
        }
    }
}

#[cfg(test)]
#[path = "logs_tests.rs"]
mod tests;
