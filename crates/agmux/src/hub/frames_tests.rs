// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{parse_client_frame, ClientFrame, ControlDirection, ServerFrame, MAX_FRAME_BYTES};

#[test]
fn subscribe_parses() {
    let frame = parse_client_frame(r#"{"type":"subscribe","ptyId":"p1"}"#).unwrap();
    assert_eq!(frame, ClientFrame::Subscribe { pty_id: "p1".to_owned() });
}

#[test]
fn input_parses() {
    let frame = parse_client_frame(r#"{"type":"input","ptyId":"p1","data":"ls\n"}"#).unwrap();
    assert_eq!(
        frame,
        ClientFrame::Input { pty_id: "p1".to_owned(), data: "ls\n".to_owned() }
    );
}

#[test]
fn tmux_control_parses() {
    let frame =
        parse_client_frame(r#"{"type":"tmux_control","ptyId":"p1","direction":"up","lines":40}"#)
            .unwrap();
    assert_eq!(
        frame,
        ClientFrame::TmuxControl {
            pty_id: "p1".to_owned(),
            direction: ControlDirection::Up,
            lines: 40
        }
    );
}

#[yare::parameterized(
    not_json = { "subscribe p1" },
    unknown_type = { r#"{"type":"shutdown"}"# },
    missing_field = { r#"{"type":"subscribe"}"# },
    empty_pty_id = { r#"{"type":"subscribe","ptyId":""}"# },
    zero_cols = { r#"{"type":"resize","ptyId":"p","cols":0,"rows":24}"# },
    huge_rows = { r#"{"type":"resize","ptyId":"p","cols":80,"rows":1001}"# },
    negative_cols = { r#"{"type":"resize","ptyId":"p","cols":-1,"rows":24}"# },
    float_cols = { r#"{"type":"resize","ptyId":"p","cols":80.5,"rows":24}"# },
    zero_lines = { r#"{"type":"tmux_control","ptyId":"p","direction":"up","lines":0}"# },
    excess_lines = { r#"{"type":"tmux_control","ptyId":"p","direction":"down","lines":201}"# },
    bad_direction = { r#"{"type":"tmux_control","ptyId":"p","direction":"left","lines":5}"# },
)]
fn invalid_frames_are_rejected(raw: &str) {
    assert!(parse_client_frame(raw).is_none(), "accepted: {raw}");
}

#[test]
fn boundary_values_are_accepted() {
    assert!(parse_client_frame(r#"{"type":"resize","ptyId":"p","cols":1,"rows":1000}"#).is_some());
    assert!(
        parse_client_frame(r#"{"type":"tmux_control","ptyId":"p","direction":"down","lines":200}"#)
            .is_some()
    );
}

#[test]
fn oversized_raw_frames_are_rejected() {
    let padding = "x".repeat(MAX_FRAME_BYTES);
    let raw = format!(r#"{{"type":"input","ptyId":"p1","data":"{padding}"}}"#);
    assert!(parse_client_frame(&raw).is_none());
}

#[test]
fn oversized_input_data_is_rejected() {
    // Under the raw cap but over the input cap.
    let data = "y".repeat(super::MAX_INPUT_BYTES + 1);
    let raw = format!(r#"{{"type":"input","ptyId":"p1","data":"{data}"}}"#);
    assert!(raw.len() <= MAX_FRAME_BYTES);
    assert!(parse_client_frame(&raw).is_none());
}

#[test]
fn server_frames_serialize_with_wire_names() {
    let json = serde_json::to_value(ServerFrame::PtyHighlight {
        pty_id: "p1".to_owned(),
        reason: "prompt".to_owned(),
        ttl_ms: 5_000,
    })
    .unwrap();
    assert_eq!(json["type"], "pty_highlight");
    assert_eq!(json["ptyId"], "p1");
    assert_eq!(json["ttlMs"], 5_000);

    let json = serde_json::to_value(ServerFrame::TriggerFired {
        pty_id: "p1".to_owned(),
        trigger: "build-done".to_owned(),
        matched: "BUILD OK".to_owned(),
        line: "12:00 BUILD OK".to_owned(),
        ts: 1_000,
    })
    .unwrap();
    assert_eq!(json["type"], "trigger_fired");
    assert_eq!(json["match"], "BUILD OK");
}
