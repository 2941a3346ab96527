//! WebSocket upgrade handler

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::snapshot::Published;
use crate::game::RefereeHandle;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ServerMsg};

type WsSink = futures::stream::SplitSink<WebSocket, Message>;
type WsStream = futures::stream::SplitStream<WebSocket>;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state.referee))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, referee: RefereeHandle) {
    let client_id = Uuid::new_v4();
    info!(client_id = %client_id, "New WebSocket connection");

    let (mut ws_sink, ws_stream) = socket.split();

    let published = referee.published();
    let mut cursor = EventCursor::new(published.match_id());
    let mut greeting = vec![
        ServerMsg::Welcome {
            match_id: published.match_id(),
            server_time: unix_millis(),
        },
        ServerMsg::Snapshot {
            view: Box::new(published.view.clone()),
        },
    ];
    greeting.extend(cursor.advance(&published));

    for msg in &greeting {
        if let Err(e) = send_msg(&mut ws_sink, msg).await {
            error!(client_id = %client_id, error = %e, "Failed to send welcome");
            return;
        }
    }

    run_session(client_id, referee, cursor, ws_sink, ws_stream).await;

    info!(client_id = %client_id, "WebSocket connection closed");
}

/// Run the WebSocket session with read/write split
async fn run_session(
    client_id: Uuid,
    referee: RefereeHandle,
    cursor: EventCursor,
    ws_sink: WsSink,
    mut ws_stream: WsStream,
) {
    let (reply_tx, reply_rx) = mpsc::channel::<ServerMsg>(16);

    // Writer task: published state, collaborator dispatches and replies -> WebSocket
    let writer_handle = tokio::spawn(write_loop(
        client_id,
        ws_sink,
        cursor,
        referee.subscribe_state(),
        referee.subscribe_dispatches(),
        reply_rx,
    ));

    // Reader loop: WebSocket -> replies
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMsg>(&text) {
                Ok(ClientMsg::Ping { t }) => {
                    if reply_tx.send(ServerMsg::Pong { t }).await.is_err() {
                        break;
                    }
                }
                Ok(ClientMsg::Resync { since }) => {
                    let published = referee.published();
                    let reply = ServerMsg::Events {
                        match_id: published.match_id(),
                        events: published.events_since(since).to_vec(),
                    };
                    if reply_tx.send(reply).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!(client_id = %client_id, error = %e, "Failed to parse client message");
                    let reply = ServerMsg::Error {
                        code: "bad_message".to_string(),
                        message: e.to_string(),
                    };
                    if reply_tx.send(reply).await.is_err() {
                        break;
                    }
                }
            },
            Ok(Message::Binary(_)) => {
                warn!(client_id = %client_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(client_id = %client_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(client_id = %client_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    writer_handle.abort();
}

async fn write_loop(
    client_id: Uuid,
    mut ws_sink: WsSink,
    mut cursor: EventCursor,
    mut state_rx: watch::Receiver<Arc<Published>>,
    mut dispatch_rx: broadcast::Receiver<ServerMsg>,
    mut reply_rx: mpsc::Receiver<ServerMsg>,
) {
    loop {
        let outgoing = tokio::select! {
            changed = state_rx.changed() => {
                if changed.is_err() {
                    debug!(client_id = %client_id, "Referee state channel closed");
                    break;
                }
                let published = Arc::clone(&state_rx.borrow_and_update());
                let mut msgs = vec![ServerMsg::Snapshot {
                    view: Box::new(published.view.clone()),
                }];
                msgs.extend(cursor.advance(&published));
                msgs
            }
            dispatch = dispatch_rx.recv() => match dispatch {
                Ok(msg) => vec![msg],
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(client_id = %client_id, lagged_count = n, "Client lagged, skipping {} dispatches", n);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!(client_id = %client_id, "Dispatch channel closed");
                    break;
                }
            },
            reply = reply_rx.recv() => match reply {
                Some(msg) => vec![msg],
                None => break,
            },
        };

        for msg in &outgoing {
            if let Err(e) = send_msg(&mut ws_sink, msg).await {
                debug!(client_id = %client_id, error = %e, "WebSocket send failed");
                return;
            }
        }
    }
}

/// Tracks which events a client has already been sent
#[derive(Debug, Clone, PartialEq)]
struct EventCursor {
    match_id: Uuid,
    last_sequence: Option<u64>,
}

impl EventCursor {
    fn new(match_id: Uuid) -> Self {
        Self {
            match_id,
            last_sequence: None,
        }
    }

    /// Events the client has not seen yet; everything again after a match reset
    fn advance(&mut self, published: &Published) -> Option<ServerMsg> {
        if published.match_id() != self.match_id {
            *self = Self::new(published.match_id());
        }

        let events = published.events_since(self.last_sequence);
        let last = events.last()?;
        self.last_sequence = Some(last.sequence);

        Some(ServerMsg::Events {
            match_id: self.match_id,
            events: events.to_vec(),
        })
    }
}

/// Send a message over WebSocket
async fn send_msg(sink: &mut WsSink, msg: &ServerMsg) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
