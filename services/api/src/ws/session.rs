//! Manages the WebSocket connection lifecycle for a conversation session.

use super::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;
use anyhow::Result;
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use duologue_core::{SchedulerHandle, SessionEvent, TurnExecutor, TurnScheduler};
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{Instrument, error, info, warn};
use uuid::Uuid;

/// Axum handler to upgrade an HTTP connection to a WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Main handler for an individual WebSocket connection.
///
/// Spawns a dedicated scheduler for the connection, sends the initial state and
/// then bridges client messages and scheduler events until either side closes.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let session_id = Uuid::new_v4();
    let span = tracing::info_span!("ws_session", %session_id);
    async move {
        info!("New WebSocket connection.");
        if let Err(e) = run_session(socket, state, session_id).await {
            error!(error = ?e, "Session terminated with error.");
        }
        info!("Session finished.");
    }
    .instrument(span)
    .await
}

async fn run_session(socket: WebSocket, state: Arc<AppState>, session_id: Uuid) -> Result<()> {
    let executor: Arc<dyn TurnExecutor> = state.boundary.clone();
    let (scheduler, mut events, scheduler_task) =
        TurnScheduler::spawn(state.config.scheduler, executor);

    let (mut socket_tx, mut socket_rx) = socket.split();

    let capabilities = state.boundary.check_capabilities();
    let missing = capabilities.missing_env_vars();

    let snapshot = scheduler.snapshot().await?;
    send_msg(
        &mut socket_tx,
        ServerMessage::Initialized {
            session_id,
            capabilities,
            turns: snapshot.turns,
        },
    )
    .await?;
    // The welcome notice is already part of the snapshot.
    drain_initial(&mut events);
    if !missing.is_empty() {
        warn!(?missing, "Session started with missing provider credentials.");
        send_msg(
            &mut socket_tx,
            ServerMessage::Error {
                message: format!("Set {} in .env.", missing.join(" and ")),
            },
        )
        .await?;
    }

    loop {
        tokio::select! {
            incoming = socket_rx.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(msg) => forward(&scheduler, msg).await?,
                            Err(e) => {
                                warn!(error = %e, "Ignoring malformed client message.");
                                send_msg(&mut socket_tx, ServerMessage::Error { message: e.to_string() }).await?;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("Client closed the connection.");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        error!("Error receiving from client WebSocket: {:?}", e);
                        break;
                    }
                }
            },
            Some(event) = events.recv() => {
                send_msg(&mut socket_tx, event.into()).await?;
            },
            else => break,
        }
    }

    // Dropping the last handle stops the scheduler; an in-flight call is abandoned with it.
    drop(scheduler);
    scheduler_task.abort();
    Ok(())
}

fn drain_initial(events: &mut mpsc::UnboundedReceiver<SessionEvent>) {
    while events.try_recv().is_ok() {}
}

/// Translates a client message into a scheduler command.
async fn forward(scheduler: &SchedulerHandle, msg: ClientMessage) -> Result<()> {
    match msg {
        ClientMessage::Start { theme } => scheduler.start(theme).await?,
        ClientMessage::SetTheme { theme } => scheduler.set_theme(theme).await?,
        ClientMessage::ThemeEditing { active } => scheduler.theme_editing(active).await?,
        ClientMessage::TogglePause => scheduler.toggle_pause().await?,
        ClientMessage::Typing => scheduler.user_typing().await?,
        ClientMessage::TypingStopped => scheduler.user_idle().await?,
        ClientMessage::UserMessage { text } => scheduler.submit(text).await?,
    }
    Ok(())
}

/// A helper function to serialize and send a `ServerMessage` to the client.
async fn send_msg(
    socket_tx: &mut SplitSink<WebSocket, Message>,
    msg: ServerMessage,
) -> Result<()> {
    let serialized = serde_json::to_string(&msg)?;
    socket_tx.send(Message::Text(serialized.into())).await?;
    Ok(())
}
