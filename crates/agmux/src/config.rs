// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::net::IpAddr;
use std::path::PathBuf;

use clap::Parser;
use rand::RngCore;

/// Local multi-agent terminal multiplexer.
#[derive(Debug, Clone, Parser)]
#[command(name = "agmux", version, about)]
pub struct Config {
    /// Host address to bind to. Non-loopback hosts are refused unless
    /// ALLOW_NON_LOOPBACK=1 is set.
    #[arg(long, env = "AGMUX_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// HTTP/WebSocket port to listen on.
    #[arg(long, env = "AGMUX_PORT", default_value = "7787")]
    pub port: u16,

    /// Directory for the durable store. Defaults to ~/.local/share/agmux.
    #[arg(long, env = "AGMUX_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Require a token on the API and WebSocket surfaces.
    #[arg(long, env = "AGMUX_AUTH")]
    pub auth: bool,

    /// Token used when --auth is set. A random 32-byte hex token is
    /// generated (and logged) when omitted.
    #[arg(long, env = "AGMUX_TOKEN")]
    pub auth_token: Option<String>,

    /// Additional allowed Origin values for WebSocket upgrades (repeatable).
    #[arg(long = "allow-origin", env = "AGMUX_ALLOW_ORIGINS", value_delimiter = ',')]
    pub allow_origins: Vec<String>,

    /// Hide exited sessions older than this many hours (clamped to 1..=168).
    #[arg(long, env = "AGMUX_INACTIVE_MAX_AGE_HOURS", default_value = "24")]
    pub inactive_max_age_hours: i64,

    /// Maximum number of provider log files scanned per discovery pass.
    #[arg(long, env = "AGMUX_LOG_SCAN_LIMIT", default_value = "500")]
    pub log_scan_limit: usize,

    /// Log-discovery cache lifetime in milliseconds.
    #[arg(long, env = "AGMUX_LOG_CACHE_MS", default_value = "5000")]
    pub log_cache_ms: u64,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "AGMUX_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log format (json or text).
    #[arg(long, env = "AGMUX_LOG_FORMAT", default_value = "json")]
    pub log_format: String,
}

impl Config {
    /// Validate the configuration after parsing.
    ///
    /// Binding a non-loopback host without the ALLOW_NON_LOOPBACK=1
    /// override is a fatal startup error.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !host_is_loopback(&self.host) && !non_loopback_allowed() {
            anyhow::bail!(
                "refusing to bind non-loopback host '{}' (set ALLOW_NON_LOOPBACK=1 to override)",
                self.host
            );
        }
        if self.inactive_max_age_hours < 1 {
            anyhow::bail!("--inactive-max-age-hours must be at least 1");
        }
        Ok(())
    }

    /// Resolve the token for authenticated mode: the configured value, or a
    /// freshly generated 32-byte hex token.
    ///
    /// Returns `None` when auth is disabled.
    pub fn effective_token(&self) -> Option<String> {
        if !self.auth {
            return None;
        }
        match self.auth_token {
            Some(ref t) if !t.is_empty() => Some(t.clone()),
            _ => Some(generate_token()),
        }
    }

    /// The Origin allowlist: configured entries plus loopback defaults for
    /// the bound port.
    pub fn allowed_origins(&self) -> Vec<String> {
        let mut origins = self.allow_origins.clone();
        for host in ["127.0.0.1", "localhost", "[::1]"] {
            origins.push(format!("http://{host}:{}", self.port));
        }
        origins
    }

    /// Resolve the data directory, creating it if necessary.
    pub fn resolve_data_dir(&self) -> anyhow::Result<PathBuf> {
        let dir = match self.data_dir {
            Some(ref d) => d.clone(),
            None => {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_owned());
                PathBuf::from(home).join(".local").join("share").join("agmux")
            }
        };
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Clamp the inactivity cutoff to the supported range.
    pub fn inactive_max_age_hours_clamped(&self) -> i64 {
        self.inactive_max_age_hours.clamp(1, 168)
    }
}

fn non_loopback_allowed() -> bool {
    std::env::var("ALLOW_NON_LOOPBACK").map(|v| v == "1").unwrap_or(false)
}

/// Whether the given host string names a loopback interface.
pub fn host_is_loopback(host: &str) -> bool {
    if host == "localhost" {
        return true;
    }
    let bare = host.trim_start_matches('[').trim_end_matches(']');
    match bare.parse::<IpAddr>() {
        Ok(ip) => ip.is_loopback(),
        Err(_) => false,
    }
}

/// Generate a random 32-byte token, hex-encoded.
fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    let mut out = String::with_capacity(64);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
