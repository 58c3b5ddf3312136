//! WebSocket upgrade handler

use std::fmt::Display;
use std::ops::ControlFlow;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{
    stream::{SplitSink, SplitStream},
    Sink, SinkExt, StreamExt,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::AggregatorError;
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::fanout::Frame;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (connection_id, frames) = state.fanout.subscribe();
    info!(connection_id = %connection_id, "New WebSocket connection");

    let (mut ws_sink, ws_stream) = socket.split();

    if let Err(e) = greet(&mut ws_sink, connection_id, &state).await {
        error!(connection_id = %connection_id, error = %e, "Failed to greet connection");
        state.fanout.unsubscribe(connection_id);
        return;
    }

    run_session(connection_id, ws_sink, ws_stream, frames, &state).await;

    state.fanout.unsubscribe(connection_id);
    info!(connection_id = %connection_id, "WebSocket connection closed");
}

/// Send `welcome`, then the current state so late joiners need not wait for
/// a change. Written directly so both precede anything already queued for us.
async fn greet<S>(sink: &mut S, connection_id: Uuid, state: &AppState) -> Result<(), String>
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let welcome = ServerMsg::Welcome {
        connection_id,
        server_time: unix_millis(),
    };
    send_msg(sink, &welcome).await?;

    match state.aggregator.snapshot().await {
        Ok(snapshot) => send_msg(sink, &ServerMsg::GameStateUpdate(snapshot)).await?,
        Err(e) => warn!(connection_id = %connection_id, error = %e, "No initial snapshot"),
    }
    Ok(())
}

/// Run the WebSocket session with read/write split
async fn run_session(
    connection_id: Uuid,
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut ws_stream: SplitStream<WebSocket>,
    mut frames: mpsc::Receiver<Frame>,
    state: &AppState,
) {
    let rate_limiter = ConnectionRateLimiter::new(state.config.input_rate_limit);

    // Spawn writer task: fan-out queue -> WebSocket
    let writer_handle = tokio::spawn(async move {
        while let Some(frame) = frames.recv().await {
            if let Err(e) = ws_sink.send(Message::Text(frame.to_string())).await {
                debug!(connection_id = %connection_id, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    // Reader loop: WebSocket -> aggregator / fan-out
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check() {
                    warn!(connection_id = %connection_id, "Rate limited inbound message");
                    continue;
                }

                if handle_text(state, connection_id, &text).await.is_break() {
                    break;
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(connection_id = %connection_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                debug!(connection_id = %connection_id, "Received ping/pong");
            }
            Ok(Message::Close(_)) => {
                info!(connection_id = %connection_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(connection_id = %connection_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    writer_handle.abort();
}

/// Parse and route one text frame. A game update that does not parse is
/// refused back to its sender like any other rejected update.
pub async fn handle_text(state: &AppState, connection_id: Uuid, text: &str) -> ControlFlow<()> {
    match serde_json::from_str::<ClientMsg>(text) {
        Ok(msg) => dispatch(state, connection_id, msg).await,
        Err(e) => {
            warn!(connection_id = %connection_id, error = %e, "Failed to parse client message");
            if let Some(event) = ClientMsg::update_event(text) {
                state.fanout.send_to(
                    connection_id,
                    &ServerMsg::UpdateRejected {
                        event,
                        reason: e.to_string(),
                    },
                );
            }
            ControlFlow::Continue(())
        }
    }
}

/// Route one inbound message. Breaks only when the aggregator is gone.
pub async fn dispatch(state: &AppState, connection_id: Uuid, msg: ClientMsg) -> ControlFlow<()> {
    let event = msg.event_name();

    let result = match msg {
        ClientMsg::PlayerMove(update) => state.aggregator.apply_move(update).await,
        ClientMsg::PlayerShoot(shot) => state.aggregator.apply_shot(shot).await,
        ClientMsg::JoystickInput(input) => {
            debug!(connection_id = %connection_id, ?input, "Joystick input received");
            state.fanout.broadcast(&ServerMsg::JoystickData(input));
            return ControlFlow::Continue(());
        }
    };

    match result {
        Ok(()) => ControlFlow::Continue(()),
        Err(AggregatorError::Rejected(reason)) => {
            warn!(connection_id = %connection_id, event, reason = %reason, "Update rejected");
            state.fanout.send_to(
                connection_id,
                &ServerMsg::UpdateRejected {
                    event,
                    reason: reason.to_string(),
                },
            );
            ControlFlow::Continue(())
        }
        Err(e @ AggregatorError::Stopped) => {
            error!(connection_id = %connection_id, error = %e, "Dropping connection");
            ControlFlow::Break(())
        }
    }
}

/// Send a message over WebSocket
async fn send_msg<S>(sink: &mut S, msg: &ServerMsg) -> Result<(), String>
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json)).await.map_err(|e| e.to_string())
}
