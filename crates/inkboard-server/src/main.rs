//! Inkboard WebSocket Document Store Server
//!
//! Keeps the latest blob of every board document in memory and pushes
//! overwrites to the other clients following that document.
//!
//! ## Protocol
//!
//! Messages are JSON tagged by `type`:
//! ```json
//! { "type": "get", "doc": "demo/whiteboard" }
//! { "type": "set", "doc": "demo/whiteboard", "data": "[...]" }
//! { "type": "subscribe", "doc": "demo/whiteboard" }
//! { "type": "unsubscribe", "doc": "demo/whiteboard" }
//! ```
//! The server answers `document`, `saved` and `error`, and pushes `changed`
//! to subscribers other than the writer.

use axum::{
    Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use inkboard_core::sync::{ClientMessage, ServerMessage};
use std::{collections::HashMap, net::SocketAddr, sync::Arc};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info, warn};
use uuid::Uuid;

const CHANNEL_CAPACITY: usize = 256;
const DEFAULT_ADDR: &str = "0.0.0.0:3030";

/// A change tagged with the connection that wrote it.
type Change = (String, ServerMessage);

/// Document state
struct Document {
    /// Broadcast channel for subscribers of this document
    tx: broadcast::Sender<Change>,
    /// Latest blob, `None` until first written
    data: Option<String>,
}

impl Document {
    fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx, data: None }
    }
}

/// Shared application state
struct AppState {
    documents: DashMap<String, Document>,
}

impl AppState {
    fn new() -> Self {
        Self {
            documents: DashMap::new(),
        }
    }

    /// Latest blob of a document
    fn read(&self, doc: &str) -> Option<String> {
        self.documents.get(doc).and_then(|d| d.data.clone())
    }

    /// Overwrite a document and notify its subscribers. Returns the number of
    /// subscriptions the change was queued for.
    fn write(&self, doc: &str, from: &str, data: String) -> usize {
        let mut document = self
            .documents
            .entry(doc.to_string())
            .or_insert_with(Document::new);
        document.data = Some(data.clone());
        let change = ServerMessage::Changed {
            doc: doc.to_string(),
            data,
        };
        document.tx.send((from.to_string(), change)).unwrap_or(0)
    }

    /// Follow changes to a document
    fn subscribe(&self, doc: &str) -> broadcast::Receiver<Change> {
        self.documents
            .entry(doc.to_string())
            .or_insert_with(Document::new)
            .tx
            .subscribe()
    }
}

/// Per-connection subscriptions, keyed by document.
type Forwarders = HashMap<String, JoinHandle<()>>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "inkboard_server=info,tower_http=info".into()),
        )
        .init();

    let addr: SocketAddr = std::env::var("INKBOARD_ADDR")
        .unwrap_or_else(|_| DEFAULT_ADDR.to_string())
        .parse()?;

    let state = Arc::new(AppState::new());

    let app = Router::new()
        .route("/", get(index))
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    info!("Inkboard document store listening on {}", addr);
    info!("WebSocket endpoint: ws://{}/ws", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn index() -> &'static str {
    "Inkboard Document Store - Connect via WebSocket at /ws"
}

async fn health() -> &'static str {
    "ok"
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle a WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let peer_id = Uuid::new_v4().to_string();
    info!("New connection: {}", peer_id);

    let (mut sender, mut receiver) = socket.split();
    let (outbox, mut pushed) = mpsc::unbounded_channel::<ServerMessage>();
    let mut forwarders = Forwarders::new();

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let reply = match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => handle_message(
                                &state,
                                &peer_id,
                                client_msg,
                                &mut forwarders,
                                &outbox,
                            ),
                            Err(e) => {
                                warn!("Invalid message from {}: {}", peer_id, e);
                                Some(ServerMessage::Error {
                                    message: format!("Invalid message: {}", e),
                                })
                            }
                        };
                        if let Some(reply) = reply {
                            if send(&mut sender, &reply).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("WebSocket error for {}: {}", peer_id, e);
                        break;
                    }
                }
            }

            Some(change) = pushed.recv() => {
                if send(&mut sender, &change).await.is_err() {
                    break;
                }
            }
        }
    }

    for (_, task) in forwarders {
        task.abort();
    }
    info!("Connection closed: {}", peer_id);
}

/// Apply one client message; returns the direct reply, if any.
fn handle_message(
    state: &AppState,
    peer_id: &str,
    msg: ClientMessage,
    forwarders: &mut Forwarders,
    outbox: &mpsc::UnboundedSender<ServerMessage>,
) -> Option<ServerMessage> {
    match msg {
        ClientMessage::Get { doc } => {
            let data = state.read(&doc);
            Some(ServerMessage::Document { doc, data })
        }
        ClientMessage::Set { doc, data } => {
            let notified = state.write(&doc, peer_id, data);
            debug!("{} overwrote {} ({} subscriptions)", peer_id, doc, notified);
            Some(ServerMessage::Saved { doc })
        }
        ClientMessage::Subscribe { doc } => {
            if !forwarders.contains_key(&doc) {
                let rx = state.subscribe(&doc);
                let task = tokio::spawn(forward_changes(rx, peer_id.to_string(), outbox.clone()));
                info!("Peer {} subscribed to {}", peer_id, doc);
                forwarders.insert(doc, task);
            }
            None
        }
        ClientMessage::Unsubscribe { doc } => {
            if let Some(task) = forwarders.remove(&doc) {
                task.abort();
                info!("Peer {} unsubscribed from {}", peer_id, doc);
            }
            None
        }
    }
}

/// Relay a document's changes to one connection, skipping its own writes.
async fn forward_changes(
    mut rx: broadcast::Receiver<Change>,
    peer_id: String,
    outbox: mpsc::UnboundedSender<ServerMessage>,
) {
    loop {
        match rx.recv().await {
            Ok((from, change)) => {
                if from == peer_id {
                    continue;
                }
                if outbox.send(change).is_err() {
                    break;
                }
            }
            // Every change carries the whole document, so skipping is harmless.
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Peer {} lagged behind by {} changes", peer_id, skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

async fn send(
    sender: &mut SplitSink<WebSocket, Message>,
    msg: &ServerMessage,
) -> Result<(), axum::Error> {
    match serde_json::to_string(msg) {
        Ok(json) => sender.send(Message::Text(json.into())).await,
        Err(e) => {
            warn!("Failed to encode {:?}: {}", msg, e);
            Ok(())
        }
    }
}
