//! WebSocket handler for the live board.
//!
//! The `/ws/messages` endpoint upgrades an HTTP connection to a WebSocket.
//! Once connected, the handler:
//!
//! - **Pushes the board:** sends the current sync state and full ordered
//!   message list right away, then again after every applied snapshot.
//!   Frames are [`BoardEvent`]s encoded as JSON text.
//! - **Receives commands:** parses incoming text frames as [`WsCommand`].
//!
//! The board is watched through `tokio::sync::watch`, so a slow client never
//! lags: it skips straight to the newest list.

use axum::extract::State;
use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};

use corkboard_types::event::BoardEvent;

use crate::state::AppState;

/// Incoming command from a WebSocket client.
///
/// Unknown or malformed frames are logged and ignored.
#[derive(Debug, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WsCommand {
    /// Server responds with `{"type":"pong"}`.
    Ping,
    /// Re-send the current list and state.
    Refresh,
}

/// Upgrade an HTTP request to a live board connection.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state))
}

/// Core connection loop: one task multiplexes board changes and client
/// frames with `tokio::select!`.
async fn handle_ws_connection(socket: WebSocket, state: AppState) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let mut messages_rx = state.board.watch_messages();
    let mut state_rx = state.board.watch_state();

    if send_snapshot(&mut ws_sender, &mut messages_rx, &mut state_rx).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            changed = messages_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = messages_rx.borrow_and_update().clone();
                let event = BoardEvent::Messages {
                    messages: view.messages.to_vec(),
                    applied: view.applied,
                };
                if send_event(&mut ws_sender, &event).await.is_err() {
                    break;
                }
            }

            changed = state_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let sync_state = *state_rx.borrow_and_update();
                if send_event(&mut ws_sender, &BoardEvent::SyncState { state: sync_state }).await.is_err() {
                    break;
                }
            }

            msg_result = ws_receiver.next() => {
                match msg_result {
                    Some(Ok(WsMessage::Text(text))) => {
                        let sent = match parse_command(&text) {
                            Some(WsCommand::Ping) => send_event(&mut ws_sender, &BoardEvent::Pong).await,
                            Some(WsCommand::Refresh) => {
                                send_snapshot(&mut ws_sender, &mut messages_rx, &mut state_rx).await
                            }
                            None => Ok(()),
                        };
                        if sent.is_err() {
                            break;
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Err(err)) => {
                        tracing::debug!("WebSocket receive error: {err}");
                        break;
                    }
                    // Binary and protocol-level ping/pong frames
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    tracing::debug!("board WebSocket closed");
}

fn parse_command(text: &str) -> Option<WsCommand> {
    match serde_json::from_str(text) {
        Ok(cmd) => Some(cmd),
        Err(err) => {
            tracing::warn!(raw = %text, error = %err, "Ignoring malformed WebSocket command");
            None
        }
    }
}

/// Send the current state followed by the current list, marking both seen.
async fn send_snapshot(
    ws_sender: &mut (impl SinkExt<WsMessage, Error = axum::Error> + Unpin),
    messages_rx: &mut tokio::sync::watch::Receiver<corkboard_core::sync::BoardView>,
    state_rx: &mut tokio::sync::watch::Receiver<corkboard_types::event::SyncState>,
) -> Result<(), axum::Error> {
    let sync_state = *state_rx.borrow_and_update();
    send_event(ws_sender, &BoardEvent::SyncState { state: sync_state }).await?;

    let view = messages_rx.borrow_and_update().clone();
    let event = BoardEvent::Messages {
        messages: view.messages.to_vec(),
        applied: view.applied,
    };
    send_event(ws_sender, &event).await
}

async fn send_event(
    ws_sender: &mut (impl SinkExt<WsMessage, Error = axum::Error> + Unpin),
    event: &BoardEvent,
) -> Result<(), axum::Error> {
    match serde_json::to_string(event) {
        Ok(json) => ws_sender.send(WsMessage::Text(json.into())).await,
        Err(err) => {
            tracing::warn!("Failed to serialize BoardEvent: {err}");
            Ok(())
        }
    }
}
