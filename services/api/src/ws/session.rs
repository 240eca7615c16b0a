//! Manages the WebSocket connection lifecycle for a live interview.

use super::protocol::{ClientMessage, ServerMessage};
use crate::{
    models::{Session, SessionStatus},
    state::AppState,
};
use anyhow::{Context, Result, anyhow};
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use interview_core::{
    Command,
    language::{Language, Level},
    persistence::SessionStore,
    runtime::{SessionHandle, SessionInput, run},
    session::{InterviewSession, SessionConfig},
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{Instrument, error, info, instrument, warn};

/// Axum handler to upgrade an HTTP connection to a WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Entry point for a new connection.
///
/// The first frame must be `init`. It attaches the socket to an in-progress
/// session, starts the interview driver and then hands the socket over to
/// the relay loop.
#[instrument(name = "ws_session", skip_all, fields(session_id))]
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let temp_id: u32 = rand::random();
    tracing::Span::current().record("session_id", temp_id);
    info!("New WebSocket connection. Awaiting initialization...");

    let (mut socket_tx, mut socket_rx) = socket.split();

    let attached = match socket_rx.next().await {
        Some(Ok(Message::Text(text))) => attach_session(&text, &state).await,
        Some(Ok(_)) => Err(anyhow!("First message was not a text `init` message.")),
        Some(Err(e)) => Err(anyhow!("Failed to read init message: {e}")),
        None => {
            info!("Client disconnected before sending init message.");
            return;
        }
    };

    let Attached {
        session,
        config,
        handle,
        inputs,
    } = match attached {
        Ok(attached) => attached,
        Err(e) => {
            error!("Session initialization failed: {:?}", e);
            let _ = send_msg(
                &mut socket_tx,
                ServerMessage::Error {
                    message: e.to_string(),
                },
            )
            .await;
            return;
        }
    };
    let session_id = session.id;

    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let store: Arc<dyn SessionStore> = state.db.clone();
    let interview = InterviewSession::new(
        session_id,
        config.clone(),
        state.llm_client.clone(),
        store,
        state.prompts.clone(),
        command_tx,
    );
    let driver = tokio::spawn(run(interview, inputs));

    let registry = state.sessions.clone();
    tokio::spawn(
        async move {
            match driver.await {
                Ok(report) => info!(
                    reason = %report.reason,
                    overall_score = report.feedback.overall_score,
                    messages = report.transcript.len(),
                    "Interview finished."
                ),
                Err(e) => error!(error = ?e, "Interview driver panicked."),
            }
            registry.remove(session_id).await;
        }
        .in_current_span(),
    );

    if send_msg(
        &mut socket_tx,
        ServerMessage::Initialized {
            session_id,
            job_role: config.role.clone(),
            job_level: config.level,
            language: config.language,
        },
    )
    .await
    .is_err()
    {
        error!("Failed to send Initialized message to client.");
        let _ = handle.end();
        return;
    }

    let relay_span = tracing::info_span!(
        "interview_relay",
        %session_id,
        job_role = %session.job_role,
        job_level = %config.level
    );
    tokio::spawn(
        async move {
            if let Err(e) = relay(socket_tx, socket_rx, handle, command_rx).await {
                error!(error = ?e, "Relay terminated with error.");
            }
            info!("WebSocket relay finished.");
        }
        .instrument(relay_span),
    );
}

/// A session claimed by this connection. Its handle is already in the
/// registry; the driver has not started yet.
struct Attached {
    session: Session,
    config: SessionConfig,
    handle: SessionHandle,
    inputs: mpsc::UnboundedReceiver<SessionInput>,
}

/// Parses the `init` frame, loads the session it names and claims it in the
/// registry so no second connection can drive it.
async fn attach_session(init_text: &str, state: &Arc<AppState>) -> Result<Attached> {
    let session_id = match serde_json::from_str::<ClientMessage>(init_text)? {
        ClientMessage::Init { session_id } => session_id,
        _ => return Err(anyhow!("First message must be `init`")),
    };
    tracing::Span::current().record("session_id", session_id.to_string().as_str());

    let session = state
        .db
        .find_session(session_id)
        .await?
        .with_context(|| format!("Session '{session_id}' not found"))?;
    if session.status != SessionStatus::InProgress {
        return Err(anyhow!("Session '{session_id}' is already {}", session.status));
    }
    let level: Level = session.job_level.parse()?;
    let config = SessionConfig::new(
        session.job_role.clone(),
        level,
        Language::from_code(&session.language),
    )
    .with_limits(state.limits.clone());

    let (handle, inputs) = SessionHandle::channel(session_id);
    if !state.sessions.try_insert(handle.clone()).await {
        return Err(anyhow!("Session '{session_id}' already has a live connection"));
    }
    info!(job_role = %session.job_role, %level, "Attaching to session");

    Ok(Attached {
        session,
        config,
        handle,
        inputs,
    })
}

/// Relays client frames into the interview and interview commands back out,
/// until either side goes away.
async fn relay(
    mut socket_tx: SplitSink<WebSocket, Message>,
    mut socket_rx: SplitStream<WebSocket>,
    handle: SessionHandle,
    mut commands: mpsc::UnboundedReceiver<Command>,
) -> Result<()> {
    loop {
        tokio::select! {
            frame = socket_rx.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(ClientMessage::Init { .. }) => {
                            warn!("Ignoring repeated init message.");
                        }
                        Ok(msg) => {
                            if let Some(input) = msg.into_input() {
                                if handle.send(input).is_err() {
                                    info!("Interview already stopped; ignoring client input.");
                                }
                            }
                        }
                        Err(e) => {
                            warn!("Ignoring malformed client message: {}", e);
                            send_msg(&mut socket_tx, ServerMessage::Error {
                                message: format!("Malformed message: {e}"),
                            }).await?;
                        }
                    }
                }
                Some(Ok(Message::Binary(_))) => warn!("Ignoring unexpected binary frame."),
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                Some(Ok(Message::Close(_))) | None => {
                    info!("Client closed the socket. Ending interview.");
                    let _ = handle.end();
                    break;
                }
                Some(Err(e)) => {
                    error!("Error receiving from client WebSocket: {:?}", e);
                    let _ = handle.end();
                    break;
                }
            },
            command = commands.recv() => match command {
                Some(command) => {
                    if let Err(e) = send_msg(&mut socket_tx, ServerMessage::from(command)).await {
                        let _ = handle.end();
                        return Err(e);
                    }
                }
                // The driver dropped the session: everything has been sent.
                None => {
                    let _ = socket_tx.send(Message::Close(None)).await;
                    break;
                }
            },
        }
    }
    Ok(())
}

/// A helper function to serialize and send a `ServerMessage` to the client.
pub(crate) async fn send_msg(
    socket_tx: &mut SplitSink<WebSocket, Message>,
    msg: ServerMessage,
) -> Result<()> {
    let serialized = serde_json::to_string(&msg)?;
    socket_tx.send(Message::Text(serialized.into())).await?;
    Ok(())
}
