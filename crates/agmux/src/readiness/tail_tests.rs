// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{trailing_chars, RollingTail, TAIL_CAP};

#[test]
fn short_pushes_accumulate() {
    let mut tail = RollingTail::new();
    tail.push("hello ");
    tail.push("world");
    assert_eq!(tail.as_str(), "hello world");
}

#[test]
fn tail_is_capped_to_trailing_window() {
    let mut tail = RollingTail::new();
    tail.push(&"a".repeat(TAIL_CAP));
    tail.push("xyz");
    assert_eq!(tail.as_str().chars().count(), TAIL_CAP);
    assert!(tail.as_str().ends_with("xyz"));
}

#[test]
fn chunked_pushes_match_single_push() {
    let stream = "0123456789".repeat(900);
    let mut whole = RollingTail::new();
    whole.push(&stream);

    let mut chunked = RollingTail::new();
    for chunk in stream.as_bytes().chunks(7) {
        chunked.push(std::str::from_utf8(chunk).unwrap());
    }
    assert_eq!(whole.as_str(), chunked.as_str());
}

#[test]
fn trailing_chars_respects_char_boundaries() {
    let s = "ééééé";
    assert_eq!(trailing_chars(s, 2), "éé");
    assert_eq!(trailing_chars(s, 10), s);
}
