// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire frames for the client channel.
//!
//! Frames are internally-tagged JSON. Anything malformed, oversized, or
//! out of range is rejected silently: a misbehaving client gets no
//! feedback channel to probe with.

use serde::{Deserialize, Serialize};

use crate::pty::PtySummary;
use crate::tmux::ScrollDirection;

/// Maximum raw frame size accepted from a client.
pub const MAX_FRAME_BYTES: usize = 256 * 1024;

/// Maximum `input.data` payload.
pub const MAX_INPUT_BYTES: usize = 64 * 1024;

/// Bounds for `resize` geometry.
pub const MAX_DIMENSION: i64 = 1_000;

/// Bounds for `tmux_control.lines`.
pub const MAX_SCROLL_LINES: i64 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlDirection {
    Up,
    Down,
}

impl From<ControlDirection> for ScrollDirection {
    fn from(d: ControlDirection) -> Self {
        match d {
            ControlDirection::Up => ScrollDirection::Up,
            ControlDirection::Down => ScrollDirection::Down,
        }
    }
}

/// Client → server frames.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    #[serde(rename_all = "camelCase")]
    Subscribe { pty_id: String },
    #[serde(rename_all = "camelCase")]
    Input { pty_id: String, data: String },
    #[serde(rename_all = "camelCase")]
    Resize { pty_id: String, cols: i64, rows: i64 },
    #[serde(rename_all = "camelCase")]
    TmuxControl {
        pty_id: String,
        direction: ControlDirection,
        lines: i64,
    },
}

/// Server → client frames.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    #[serde(rename_all = "camelCase")]
    PtyList { ptys: Vec<PtySummary> },
    #[serde(rename_all = "camelCase")]
    PtyOutput { pty_id: String, data: String },
    #[serde(rename_all = "camelCase")]
    PtyExit {
        pty_id: String,
        code: Option<i32>,
        signal: Option<i32>,
    },
    #[serde(rename_all = "camelCase")]
    TriggerFired {
        pty_id: String,
        trigger: String,
        #[serde(rename = "match")]
        matched: String,
        line: String,
        ts: i64,
    },
    #[serde(rename_all = "camelCase")]
    PtyHighlight {
        pty_id: String,
        reason: String,
        ttl_ms: i64,
    },
}

/// Parse and validate a raw client frame. `None` means reject silently.
pub fn parse_client_frame(raw: &str) -> Option<ClientFrame> {
    if raw.len() > MAX_FRAME_BYTES {
        return None;
    }
    let frame: ClientFrame = serde_json::from_str(raw).ok()?;
    match &frame {
        ClientFrame::Subscribe { pty_id } => {
            if pty_id.is_empty() {
                return None;
            }
        }
        ClientFrame::Input { data, .. } => {
            if data.len() > MAX_INPUT_BYTES {
                return None;
            }
        }
        ClientFrame::Resize { cols, rows, .. } => {
            if !(1..=MAX_DIMENSION).contains(cols) || !(1..=MAX_DIMENSION).contains(rows) {
                return None;
            }
        }
        ClientFrame::TmuxControl { lines, .. } => {
            if !(1..=MAX_SCROLL_LINES).contains(lines) {
                return None;
            }
        }
    }
    Some(frame)
}

#[cfg(test)]
#[path = "frames_tests.rs"]
mod tests;
