// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::frames::ServerFrame;
use super::Hub;

fn output(pty_id: &str) -> ServerFrame {
    ServerFrame::PtyOutput {
        pty_id: pty_id.to_owned(),
        data: "x".to_owned(),
    }
}

#[tokio::test]
async fn output_goes_only_to_subscribers() {
    let hub = Hub::new();
    let (sub, mut sub_rx) = hub.register();
    let (_other, mut other_rx) = hub.register();

    hub.subscribe(sub, "p1");
    hub.send_to_subscribers("p1", &output("p1"));

    let got = sub_rx.try_recv().unwrap();
    assert!(got.contains("\"ptyId\":\"p1\""));
    assert!(other_rx.try_recv().is_err());
}

#[tokio::test]
async fn broadcast_reaches_everyone() {
    let hub = Hub::new();
    let (_a, mut a_rx) = hub.register();
    let (_b, mut b_rx) = hub.register();

    hub.broadcast(&ServerFrame::PtyExit {
        pty_id: "p1".to_owned(),
        code: Some(0),
        signal: None,
    });

    assert!(a_rx.try_recv().unwrap().contains("pty_exit"));
    assert!(b_rx.try_recv().unwrap().contains("pty_exit"));
}

#[tokio::test]
async fn unregister_removes_the_client() {
    let hub = Hub::new();
    let (id, _rx) = hub.register();
    assert_eq!(hub.client_count(), 1);
    hub.unregister(id);
    assert_eq!(hub.client_count(), 0);
}

#[tokio::test]
async fn full_buffer_drops_the_client_not_the_peers() {
    let hub = Hub::new();
    let (stuck, stuck_rx) = hub.register();
    let (healthy, mut healthy_rx) = hub.register();
    hub.subscribe(stuck, "p1");
    hub.subscribe(healthy, "p1");

    // Never drain the stuck client's receiver.
    std::mem::forget(stuck_rx);
    for _ in 0..super::CLIENT_BUFFER + 1 {
        hub.send_to_subscribers("p1", &output("p1"));
    }

    assert_eq!(hub.client_count(), 1);
    // The healthy client got everything its buffer could hold.
    assert!(healthy_rx.try_recv().is_ok());
}

#[tokio::test]
async fn subscription_state_is_per_client() {
    let hub = Hub::new();
    let (a, _a_rx) = hub.register();
    let (b, _b_rx) = hub.register();

    hub.subscribe(a, "p1");
    assert!(hub.is_subscribed(a, "p1"));
    assert!(!hub.is_subscribed(b, "p1"));
}
