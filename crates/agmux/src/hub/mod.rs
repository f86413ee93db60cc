// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transport hub: client registry and frame routing.
//!
//! Clients connect over WebSocket, subscribe to PTY ids, and receive
//! output only for their subscriptions; lifecycle frames broadcast to
//! everyone. The hub holds weak references to sessions (ids only) and
//! never blocks on a slow client: a full outbound buffer drops that
//! client instead of stalling its peers.

pub mod auth;
pub mod frames;
pub mod state;
pub mod ws;

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use frames::ServerFrame;

/// Outbound frames buffered per client before it is considered stuck.
const CLIENT_BUFFER: usize = 256;

pub type ClientId = u64;

struct ClientHandle {
    tx: mpsc::Sender<String>,
    subscriptions: HashSet<String>,
}

#[derive(Default)]
pub struct Hub {
    clients: Mutex<HashMap<ClientId, ClientHandle>>,
    next_id: AtomicU64,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connected client; the receiver feeds its socket writer.
    pub fn register(&self) -> (ClientId, mpsc::Receiver<String>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(CLIENT_BUFFER);
        self.clients.lock().insert(
            id,
            ClientHandle {
                tx,
                subscriptions: HashSet::new(),
            },
        );
        (id, rx)
    }

    pub fn unregister(&self, client: ClientId) {
        self.clients.lock().remove(&client);
    }

    pub fn client_count(&self) -> usize {
        self.clients.lock().len()
    }

    /// Add a PTY id to a client's subscription set.
    pub fn subscribe(&self, client: ClientId, pty_id: &str) {
        if let Some(handle) = self.clients.lock().get_mut(&client) {
            handle.subscriptions.insert(pty_id.to_owned());
        }
    }

    pub fn is_subscribed(&self, client: ClientId, pty_id: &str) -> bool {
        self.clients
            .lock()
            .get(&client)
            .map(|h| h.subscriptions.contains(pty_id))
            .unwrap_or(false)
    }

    /// Send one frame to one client.
    pub fn send_to(&self, client: ClientId, frame: &ServerFrame) {
        let Ok(json) = serde_json::to_string(frame) else {
            return;
        };
        let mut dead = Vec::new();
        {
            let clients = self.clients.lock();
            if let Some(handle) = clients.get(&client) {
                if handle.tx.try_send(json).is_err() {
                    dead.push(client);
                }
            }
        }
        self.drop_clients(&dead);
    }

    /// Broadcast a frame to every connected client.
    pub fn broadcast(&self, frame: &ServerFrame) {
        let Ok(json) = serde_json::to_string(frame) else {
            return;
        };
        let mut dead = Vec::new();
        {
            let clients = self.clients.lock();
            for (id, handle) in clients.iter() {
                if handle.tx.try_send(json.clone()).is_err() {
                    dead.push(*id);
                }
            }
        }
        self.drop_clients(&dead);
    }

    /// Deliver a frame only to clients subscribed to `pty_id`.
    pub fn send_to_subscribers(&self, pty_id: &str, frame: &ServerFrame) {
        let Ok(json) = serde_json::to_string(frame) else {
            return;
        };
        let mut dead = Vec::new();
        {
            let clients = self.clients.lock();
            for (id, handle) in clients.iter() {
                if !handle.subscriptions.contains(pty_id) {
                    continue;
                }
                if handle.tx.try_send(json.clone()).is_err() {
                    dead.push(*id);
                }
            }
        }
        self.drop_clients(&dead);
    }

    fn drop_clients(&self, dead: &[ClientId]) {
        if dead.is_empty() {
            return;
        }
        let mut clients = self.clients.lock();
        for id in dead {
            debug!(client = *id, "dropping client with full outbound buffer");
            clients.remove(id);
        }
    }
}

#[cfg(test)]
#[path = "hub_tests.rs"]
mod tests;
