// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::now_ms;
use crate::pty::{PtyManager, PtySummary};
use crate::readiness::ReadinessEngine;
use crate::registry::AgentSessionRegistry;
use crate::runtime::Runtime;
use crate::sessions::merge_session_lists;
use crate::store::Store;
use crate::tmux::TmuxClient;
use crate::triggers::TriggerSet;

use super::Hub;

/// Transport-facing configuration, immutable after startup.
pub struct HubSettings {
    pub auth_token: Option<String>,
    pub allowed_origins: Vec<String>,
    pub inactive_max_age_hours: i64,
}

/// Shared application state handed to every handler.
///
/// Cross-module references are one-way: everything here addresses sessions
/// by id, so there are no cycles to manage.
pub struct AppState {
    pub hub: Hub,
    pub manager: Arc<PtyManager>,
    pub runtime: Runtime,
    pub readiness: Arc<ReadinessEngine>,
    pub registry: Arc<AgentSessionRegistry>,
    pub store: Arc<Store>,
    pub tmux: TmuxClient,
    pub triggers: TriggerSet,
    pub settings: HubSettings,
    pub shutdown: CancellationToken,
}

impl AppState {
    /// The unified session list: live sessions merged with persisted rows,
    /// inactive entries aged out.
    pub fn session_list(&self, limit: Option<usize>) -> Vec<PtySummary> {
        let persisted = match self.store.list_sessions() {
            Ok(rows) => rows,
            Err(e) => {
                debug!("persisted session scan failed: {e:#}");
                vec![]
            }
        };
        merge_session_lists(
            self.manager.list(),
            persisted,
            now_ms(),
            self.settings.inactive_max_age_hours,
            limit,
        )
    }

    /// Push a fresh session list to every client. Called whenever the set
    /// of sessions changes.
    pub fn broadcast_pty_list(&self) {
        self.hub.broadcast(&super::frames::ServerFrame::PtyList {
            ptys: self.session_list(None),
        });
    }
}
