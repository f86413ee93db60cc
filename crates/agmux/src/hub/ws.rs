// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket endpoint: upgrade-time auth, the per-connection loop, and
//! client-frame dispatch.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::debug;

use crate::pty::{PtyBackend, TmuxServerKind};

use super::auth::{validate_origin, validate_token};
use super::frames::{parse_client_frame, ClientFrame, ServerFrame};
use super::state::AppState;
use super::ClientId;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}

/// `GET /ws` — WebSocket upgrade.
///
/// When auth is enabled the token must arrive with the upgrade (header,
/// bearer, or query); a bad token or a disallowed origin refuses the
/// upgrade outright.
pub async fn ws_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let token_ok = validate_token(
        &headers,
        query.token.as_deref(),
        state.settings.auth_token.as_deref(),
    )
    .is_ok();
    let origin_ok = validate_origin(&headers, &state.settings.allowed_origins).is_ok();

    if !token_ok || !origin_ok {
        return axum::http::Response::builder()
            .status(401)
            .body(axum::body::Body::from("unauthorized"))
            .unwrap_or_default()
            .into_response();
    }

    ws.on_upgrade(move |socket| handle_connection(state, socket))
        .into_response()
}

/// Per-connection loop: pump hub frames out, parse client frames in.
async fn handle_connection(state: Arc<AppState>, socket: WebSocket) {
    let (client, mut outbound_rx) = state.hub.register();
    let (mut ws_tx, mut ws_rx) = socket.split();

    // Every client starts with the current session list.
    state.hub.send_to(
        client,
        &ServerFrame::PtyList {
            ptys: state.session_list(None),
        },
    );

    loop {
        tokio::select! {
            _ = state.shutdown.cancelled() => break,
            frame = outbound_rx.recv() => {
                let Some(json) = frame else { break };
                if ws_tx.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
            msg = ws_rx.next() => {
                let msg = match msg {
                    Some(Ok(m)) => m,
                    Some(Err(_)) | None => break,
                };
                match msg {
                    Message::Text(text) => {
                        // Invalid frames are dropped without a reply.
                        if let Some(frame) = parse_client_frame(&text) {
                            handle_client_frame(&state, client, frame).await;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    }

    state.hub.unregister(client);
}

async fn handle_client_frame(state: &Arc<AppState>, client: ClientId, frame: ClientFrame) {
    match frame {
        ClientFrame::Subscribe { pty_id } => {
            state.hub.subscribe(client, &pty_id);

            // tmux-backed sessions get a one-shot snapshot of the visible
            // pane so the terminal is not blank until the next change.
            if let Some(summary) = state.manager.summary(&pty_id) {
                if summary.backend == PtyBackend::Tmux {
                    if let Some(session) = summary.tmux_session {
                        let server = summary.tmux_server.unwrap_or(TmuxServerKind::Agmux);
                        let state = Arc::clone(state);
                        tokio::spawn(async move {
                            if let Some(pane) =
                                state.tmux.capture_pane(server, &session, None).await
                            {
                                let mut data = pane;
                                if !data.ends_with('\n') {
                                    data.push('\n');
                                }
                                state.hub.send_to(
                                    client,
                                    &ServerFrame::PtyOutput { pty_id, data },
                                );
                            }
                        });
                    }
                }
            }
        }

        ClientFrame::Input { pty_id, data } => {
            state.readiness.mark_input(&pty_id, data.as_bytes());
            state.runtime.send(&pty_id, bytes::Bytes::from(data)).await;
        }

        ClientFrame::Resize { pty_id, cols, rows } => {
            // Ranges were validated at parse time; the casts cannot truncate.
            state.runtime.resize(&pty_id, cols as u16, rows as u16).await;
        }

        ClientFrame::TmuxControl { pty_id, direction, lines } => {
            let Some(summary) = state.manager.summary(&pty_id) else {
                return;
            };
            let Some(session) = summary.tmux_session else {
                debug!(%pty_id, "tmux_control on a non-tmux session");
                return;
            };
            let server = summary.tmux_server.unwrap_or(TmuxServerKind::Agmux);
            let state = Arc::clone(state);
            tokio::spawn(async move {
                state
                    .tmux
                    .scroll_history(server, &session, direction.into(), lines as u32)
                    .await;
            });
        }
    }
}
