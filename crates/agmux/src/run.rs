// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Top-level wiring: store, engines, fan-out, servers, signals.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::hub::frames::ServerFrame;
use crate::hub::state::{AppState, HubSettings};
use crate::hub::Hub;
use crate::now_ms;
use crate::pty::{PtyBackend, PtyEvent, PtyManager, SessionStatus, TmuxServerKind};
use crate::readiness::ReadinessEngine;
use crate::registry::logs::LogDiscovery;
use crate::registry::AgentSessionRegistry;
use crate::runtime::Runtime;
use crate::store::Store;
use crate::tmux::TmuxClient;
use crate::triggers::{highlight_reason, TriggerSet, HIGHLIGHT_TTL_MS};

/// How often tmux-backed sessions are inspected for pane changes and cwd.
const PANE_POLL: Duration = Duration::from_millis(1_000);
const CWD_POLL: Duration = Duration::from_secs(5);

/// Initialize tracing/logging from config.
///
/// Uses `try_init` so it's safe to call multiple times (e.g. from tests).
pub fn init_tracing(config: &Config) {
    use tracing_subscriber::fmt;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let result = match config.log_format.as_str() {
        "json" => fmt::fmt().with_env_filter(filter).json().try_init(),
        _ => fmt::fmt().with_env_filter(filter).try_init(),
    };
    drop(result);
}

/// Build the shared state: open the store (fatal if unusable), normalize
/// stale rows, and assemble the engines.
pub fn prepare(config: &Config) -> anyhow::Result<Arc<AppState>> {
    let data_dir = config.resolve_data_dir().context("resolving data dir")?;
    let store = Arc::new(Store::open(&data_dir).context("opening durable store")?);
    let normalized = store.mark_running_exited()?;
    if normalized > 0 {
        info!("normalized {normalized} stale running session(s) to exited");
    }

    let manager = Arc::new(PtyManager::new());
    let readiness = Arc::new(ReadinessEngine::default());
    let tmux = TmuxClient::new();
    let logs = LogDiscovery::new(
        config.log_scan_limit,
        Duration::from_millis(config.log_cache_ms),
    );
    let registry = Arc::new(AgentSessionRegistry::new(Arc::clone(&store), logs));

    let triggers = match store.get_preference("settings") {
        Ok(settings) => TriggerSet::from_settings(settings.as_ref()),
        Err(e) => {
            debug!("settings preference unreadable, no triggers: {e:#}");
            TriggerSet::default()
        }
    };

    let auth_token = config.effective_token();
    if config.auth && config.auth_token.is_none() {
        if let Some(ref token) = auth_token {
            info!("generated auth token: {token}");
        }
    }

    Ok(Arc::new(AppState {
        hub: Hub::new(),
        runtime: Runtime::new(Arc::clone(&manager), tmux.clone()),
        manager,
        readiness,
        registry,
        store,
        tmux,
        triggers,
        settings: HubSettings {
            auth_token,
            allowed_origins: config.allowed_origins(),
            inactive_max_age_hours: config.inactive_max_age_hours_clamped(),
        },
        shutdown: CancellationToken::new(),
    }))
}

/// Run the server to completion.
pub async fn run(config: Config) -> anyhow::Result<()> {
    init_tracing(&config);
    config.validate()?;
    let state = prepare(&config)?;

    spawn_fanout(Arc::clone(&state));
    spawn_pane_observer(Arc::clone(&state));
    spawn_cwd_observer(Arc::clone(&state));
    spawn_signal_handler(state.shutdown.clone());

    let router = crate::http::build_router(Arc::clone(&state));
    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("listening on {}", listener.local_addr()?);

    let shutdown = state.shutdown.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .context("server error")?;

    info!("shut down");
    Ok(())
}

/// Route PTY events: readiness ingest, subscriber output, trigger scan,
/// exit bookkeeping. Ordering per session is preserved — events arrive on
/// one channel and are handled sequentially.
fn spawn_fanout(state: Arc<AppState>) {
    let mut events = state.manager.subscribe();
    let shutdown = state.shutdown.clone();
    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                _ = shutdown.cancelled() => break,
                event = events.recv() => match event {
                    Ok(e) => e,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        warn!("fan-out lagged by {n} events");
                        continue;
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                },
            };

            match event {
                PtyEvent::Output { id, data } => {
                    let transition = state.readiness.ingest_output(&id, &data);

                    let text = String::from_utf8_lossy(&data).into_owned();
                    state.hub.send_to_subscribers(
                        &id,
                        &ServerFrame::PtyOutput {
                            pty_id: id.clone(),
                            data: text.clone(),
                        },
                    );

                    for hit in state.triggers.scan(&text) {
                        state.hub.broadcast(&ServerFrame::TriggerFired {
                            pty_id: id.clone(),
                            trigger: hit.trigger,
                            matched: hit.matched,
                            line: hit.line,
                            ts: now_ms(),
                        });
                    }

                    if let Some(reason) = transition.and_then(highlight_reason) {
                        state.hub.broadcast(&ServerFrame::PtyHighlight {
                            pty_id: id.clone(),
                            reason: reason.to_owned(),
                            ttl_ms: HIGHLIGHT_TTL_MS,
                        });
                    }
                }
                PtyEvent::Exit { id, code, signal } => {
                    if let Some(summary) = state.manager.summary(&id) {
                        if let Err(e) = state.store.upsert_session(&summary) {
                            warn!("failed to persist exited session {id}: {e:#}");
                        }
                    }
                    state.readiness.clear(&id);
                    state.registry.detach_pty(&id);

                    state.hub.broadcast(&ServerFrame::PtyExit {
                        pty_id: id,
                        code,
                        signal,
                    });
                    state.broadcast_pty_list();
                }
            }
        }
    });
}

/// Periodically capture panes of running tmux-backed sessions and feed the
/// readiness engine, honoring each session's recheck hint.
fn spawn_pane_observer(state: Arc<AppState>) {
    let shutdown = state.shutdown.clone();
    tokio::spawn(async move {
        let mut next_check: HashMap<String, i64> = HashMap::new();
        let mut interval = tokio::time::interval(PANE_POLL);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {}
            }

            let now = now_ms();
            let sessions = state.manager.list();
            next_check.retain(|id, _| sessions.iter().any(|s| s.id == *id));

            for summary in sessions {
                if summary.backend != PtyBackend::Tmux
                    || summary.status != SessionStatus::Running
                {
                    continue;
                }
                if next_check.get(&summary.id).is_some_and(|&at| now < at) {
                    continue;
                }
                let Some(ref session) = summary.tmux_session else { continue };
                let server = summary.tmux_server.unwrap_or(TmuxServerKind::Agmux);

                let Some(pane) = state.tmux.capture_pane(server, session, None).await else {
                    continue;
                };
                let (width, height) = pane_geometry(&pane);
                let (decision, transition) =
                    state.readiness.observe_pane(&summary.id, &pane, width, height);

                next_check.insert(
                    summary.id.clone(),
                    now + decision.recheck_ms.unwrap_or(PANE_POLL.as_millis() as i64),
                );

                // A stable pane sitting at a bare shell is ready, not waiting.
                if decision.state == crate::readiness::pane::PaneState::Waiting {
                    if let Some(cmd) = state.tmux.pane_current_command(server, session).await {
                        if crate::runtime::is_shell_command(&cmd) {
                            state.readiness.mark_ready(&summary.id);
                        }
                    }
                }

                if let Some(reason) = transition.and_then(highlight_reason) {
                    state.hub.broadcast(&ServerFrame::PtyHighlight {
                        pty_id: summary.id.clone(),
                        reason: reason.to_owned(),
                        ttl_ms: HIGHLIGHT_TTL_MS,
                    });
                }
            }
        }
    });
}

/// Coarse pane geometry from captured text: the widest line and line count.
fn pane_geometry(pane: &str) -> (u16, u16) {
    let width = pane.lines().map(|l| l.chars().count()).max().unwrap_or(0);
    let height = pane.lines().count();
    (width.min(u16::MAX as usize) as u16, height.min(u16::MAX as usize) as u16)
}

/// Periodically record the working directory of running tmux sessions,
/// feeding both the live summary and the agent-session registry.
fn spawn_cwd_observer(state: Arc<AppState>) {
    let shutdown = state.shutdown.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CWD_POLL);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {}
            }

            for summary in state.manager.list() {
                if summary.backend != PtyBackend::Tmux
                    || summary.status != SessionStatus::Running
                {
                    continue;
                }
                let Some(ref session) = summary.tmux_session else { continue };
                let server = summary.tmux_server.unwrap_or(TmuxServerKind::Agmux);

                let Some(cwd) = state.tmux.pane_current_path(server, session).await else {
                    continue;
                };
                if summary.cwd.as_deref() == Some(cwd.as_str()) {
                    continue;
                }
                state.manager.update_cwd(&summary.id, &cwd);
                if let Err(e) =
                    state.registry.persist_runtime_cwd_for_agent_pty(&summary.id, &cwd, now_ms())
                {
                    debug!("cwd persistence failed for {}: {e:#}", summary.id);
                }
            }
        }
    });
}

/// First SIGTERM/SIGINT triggers graceful shutdown; the second forces exit.
fn spawn_signal_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).ok();
        let mut sigint =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt()).ok();

        tokio::select! {
            _ = async {
                if let Some(ref mut s) = sigterm { s.recv().await } else { std::future::pending().await }
            } => {
                info!("received SIGTERM");
            }
            _ = async {
                if let Some(ref mut s) = sigint { s.recv().await } else { std::future::pending().await }
            } => {
                info!("received SIGINT");
            }
        }
        shutdown.cancel();

        tokio::select! {
            _ = async {
                if let Some(ref mut s) = sigterm { s.recv().await } else { std::future::pending().await }
            } => {}
            _ = async {
                if let Some(ref mut s) = sigint { s.recv().await } else { std::future::pending().await }
            } => {}
        }
        error!("second signal, forcing exit");
        std::process::exit(130);
    });
}
