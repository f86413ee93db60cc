// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Output-marker inference.
//!
//! Classifies a session's rolling output tail as *busy* (the agent is
//! actively working), *prompt* (the agent is idle at its input prompt), or
//! neither. Prompt glyphs appear mid-transcript too, so a glyph line only
//! counts when corroborated by UI chrome appropriate to the agent family.

use std::sync::LazyLock;

use regex::Regex;

use super::tail::trailing_chars;

/// Which coding agent produced the stream. Gates the pattern catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AgentFamily {
    Codex,
    Claude,
    #[default]
    Other,
}

/// Result of output-marker classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputSignal {
    Busy,
    Prompt,
    None,
}

/// Window of normalized lines considered for classification.
const LINE_WINDOW: usize = 18;

/// Characters of tail considered after ANSI stripping.
const NORMALIZED_WINDOW: usize = 1_400;

#[allow(clippy::unwrap_used)]
static ANSI: LazyLock<Regex> = LazyLock::new(|| {
    // CSI sequences, OSC strings (BEL or ST terminated), and lone escapes.
    Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)|\x1b[@-Z\\-_]")
        .unwrap()
});

#[allow(clippy::unwrap_used)]
static BUSY_WORKING_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[•·●]?\s*working\b.*\besc to interrupt\b").unwrap()
});

#[allow(clippy::unwrap_used)]
static THINKING_GLYPH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[✶✻✢✳*]\s+.+\((?:thinking|analyzing|planning|reasoning)\)\s*$").unwrap()
});

#[allow(clippy::unwrap_used)]
static PROMPT_GLYPH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[›❯]\s*(?:$|\S.*)$").unwrap()
});

#[allow(clippy::unwrap_used)]
static CONTEXT_LEFT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d{1,3}% context left").unwrap()
});

#[allow(clippy::unwrap_used)]
static SHORTCUTS_HINT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\?\s*for shortcuts").unwrap()
});

#[allow(clippy::unwrap_used)]
static RULE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[─-]{20,}$").unwrap()
});

/// Extra patterns layered over the built-in catalog.
#[derive(Debug, Default, Clone)]
pub struct SignalOverrides {
    pub busy: Vec<Regex>,
    pub prompt: Vec<Regex>,
}

/// Normalize a raw tail into the trimmed trailing line window:
/// strip ANSI, fold `\r` to `\n` and NBSP to space, keep the trailing
/// [`NORMALIZED_WINDOW`] chars, drop empty lines, keep the last
/// [`LINE_WINDOW`] lines.
pub fn normalize_tail(tail: &str) -> Vec<String> {
    let stripped = ANSI.replace_all(tail, "");
    let folded = stripped.replace('\r', "\n").replace('\u{a0}', " ");
    let window = trailing_chars(&folded, NORMALIZED_WINDOW);

    let lines: Vec<String> = window
        .split('\n')
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_owned)
        .collect();

    let skip = lines.len().saturating_sub(LINE_WINDOW);
    lines.into_iter().skip(skip).collect()
}

/// Classify a session's rolling tail.
///
/// The classification is a pure function of the tail, so any chunking of
/// the same byte stream yields the same result.
pub fn detect_output_signal(
    tail: &str,
    family: Option<AgentFamily>,
    overrides: &SignalOverrides,
) -> OutputSignal {
    let lines = normalize_tail(tail);
    let family = family.unwrap_or(AgentFamily::Other);

    if is_busy(&lines, family, overrides) {
        return OutputSignal::Busy;
    }
    if is_prompt(&lines, family, overrides) {
        return OutputSignal::Prompt;
    }
    OutputSignal::None
}

fn is_busy(lines: &[String], family: AgentFamily, overrides: &SignalOverrides) -> bool {
    let codex_busy = || {
        lines.iter().any(|l| l.to_lowercase().contains("esc to interrupt"))
            || lines.iter().any(|l| BUSY_WORKING_LINE.is_match(l))
    };
    let claude_busy = || lines.iter().any(|l| THINKING_GLYPH.is_match(l));

    let matched = match family {
        AgentFamily::Codex => codex_busy(),
        AgentFamily::Claude => claude_busy(),
        AgentFamily::Other => codex_busy() || claude_busy(),
    };
    matched || overrides.busy.iter().any(|re| lines.iter().any(|l| re.is_match(l)))
}

fn is_prompt(lines: &[String], family: AgentFamily, overrides: &SignalOverrides) -> bool {
    if !lines.iter().any(|l| PROMPT_GLYPH.is_match(l)) {
        return false;
    }

    let shared = || {
        lines.iter().any(|l| SHORTCUTS_HINT.is_match(l))
            || lines.iter().any(|l| RULE_LINE.is_match(l))
    };
    let codex_context = || lines.iter().any(|l| CONTEXT_LEFT.is_match(l));
    let claude_banner = || lines.iter().any(|l| l.contains("Claude Code"));

    let qualified = match family {
        AgentFamily::Codex => codex_context() || shared(),
        AgentFamily::Claude => claude_banner() || shared(),
        AgentFamily::Other => codex_context() || claude_banner() || shared(),
    };
    qualified || overrides.prompt.iter().any(|re| lines.iter().any(|l| re.is_match(l)))
}

impl AgentFamily {
    /// Infer the family from the command an agent session runs.
    pub fn from_command(command: &str) -> Option<Self> {
        let program = command.rsplit('/').next().unwrap_or(command);
        match program {
            "codex" => Some(Self::Codex),
            "claude" => Some(Self::Claude),
            "pi" => Some(Self::Other),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "signal_tests.rs"]
mod tests;
