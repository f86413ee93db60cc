// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::Path;

use super::{
    attach_command, capture_args, linked_session_args, new_session_args, scroll_args, server_args,
    ScrollDirection,
};
use crate::pty::TmuxServerKind;

#[test]
fn agmux_server_uses_private_socket() {
    assert_eq!(server_args(TmuxServerKind::Agmux), vec!["-L", "agmux"]);
    assert!(server_args(TmuxServerKind::Default).is_empty());
}

#[test]
fn capture_visible_pane() {
    assert_eq!(capture_args("agent:1", None), vec!["capture-pane", "-p", "-t", "agent:1"]);
}

#[test]
fn capture_with_history() {
    assert_eq!(
        capture_args("agent:1", Some(500)),
        vec!["capture-pane", "-p", "-t", "agent:1", "-S", "-500"]
    );
}

#[test]
fn new_session_is_detached_with_geometry() {
    let args = new_session_args("agmux", Path::new("/work"), Some("zsh"));
    assert_eq!(
        args,
        vec!["new-session", "-d", "-s", "agmux", "-c", "/work", "-x", "220", "-y", "50", "zsh"]
    );
}

#[test]
fn linked_session_groups_with_target() {
    assert_eq!(
        linked_session_args("agmux", "agmux-view-1"),
        vec!["new-session", "-d", "-s", "agmux-view-1", "-t", "agmux"]
    );
}

#[yare::parameterized(
    up = { ScrollDirection::Up, "scroll-up" },
    down = { ScrollDirection::Down, "scroll-down" },
)]
fn scroll_enters_copy_mode_then_scrolls(direction: ScrollDirection, key: &str) {
    let steps = scroll_args("agent:1", direction, 25);
    assert_eq!(steps.len(), 2);
    assert_eq!(steps[0], vec!["copy-mode", "-t", "agent:1"]);
    assert_eq!(steps[1], vec!["send-keys", "-X", "-t", "agent:1", "-N", "25", key]);
}

#[test]
fn attach_command_targets_the_right_server() {
    assert_eq!(
        attach_command(TmuxServerKind::Agmux, "agmux-view-1"),
        vec!["tmux", "-L", "agmux", "attach-session", "-t", "agmux-view-1"]
    );
    assert_eq!(
        attach_command(TmuxServerKind::Default, "dev"),
        vec!["tmux", "attach-session", "-t", "dev"]
    );
}
