//! WebSocket document store client for native platforms.
//!
//! Socket I/O runs on a background thread; the board talks to it through
//! channels so writes never block the caller.

use super::{
    ClientMessage, DocumentStore, ServerMessage, StoreEvent, Subscription, SyncError, SyncResult,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender, TryRecvError, channel};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tungstenite::{Message, connect};
use url::Url;

/// Commands sent to the WebSocket thread.
enum WsCommand {
    Send(ClientMessage),
    Subscribe { doc: String, tx: Sender<StoreEvent> },
    Unsubscribe { doc: String },
    Close,
}

/// Replies to point reads.
enum Reply {
    Document(Option<String>),
    Failed(String),
}

/// Document store backed by an `inkboard-server` WebSocket endpoint.
pub struct WsDocumentStore {
    cmd_tx: Sender<WsCommand>,
    reply_rx: Receiver<Reply>,
    connected: Arc<AtomicBool>,
    timeout: Duration,
    _thread: Option<JoinHandle<()>>,
}

impl WsDocumentStore {
    /// Connect to a store server, waiting at most `timeout` for the handshake.
    pub fn connect(url: &str, timeout: Duration) -> SyncResult<Self> {
        let parsed =
            Url::parse(url).map_err(|e| SyncError::Protocol(format!("Invalid URL: {}", e)))?;
        // Built without a TLS backend, so only plain `ws` can connect.
        if parsed.scheme() != "ws" {
            return Err(SyncError::Protocol(format!(
                "Unsupported WebSocket URL scheme: {}",
                parsed.scheme()
            )));
        }

        let (cmd_tx, cmd_rx) = channel::<WsCommand>();
        let (reply_tx, reply_rx) = channel::<Reply>();
        let (ready_tx, ready_rx) = channel::<Result<(), String>>();
        let connected = Arc::new(AtomicBool::new(false));

        let url = url.to_string();
        let flag = connected.clone();
        let handle = thread::spawn(move || run_socket(&url, cmd_rx, reply_tx, ready_tx, flag));

        match ready_rx.recv_timeout(timeout) {
            Ok(Ok(())) => Ok(Self {
                cmd_tx,
                reply_rx,
                connected,
                timeout,
                _thread: Some(handle),
            }),
            Ok(Err(message)) => Err(SyncError::Connectivity(message)),
            Err(_) => {
                let _ = cmd_tx.send(WsCommand::Close);
                Err(SyncError::Connectivity(format!(
                    "Timed out connecting to {}",
                    parsed
                )))
            }
        }
    }

    /// Whether the background connection is still alive.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn send(&self, command: WsCommand) -> SyncResult<()> {
        if !self.is_connected() {
            return Err(SyncError::Connectivity("Not connected".to_string()));
        }
        self.cmd_tx
            .send(command)
            .map_err(|e| SyncError::Connectivity(format!("Send failed: {}", e)))
    }
}

impl DocumentStore for WsDocumentStore {
    fn get(&mut self, id: &str) -> SyncResult<Option<String>> {
        // Drop replies left over from an earlier timed-out read.
        while self.reply_rx.try_recv().is_ok() {}

        self.send(WsCommand::Send(ClientMessage::Get { doc: id.to_string() }))?;
        match self.reply_rx.recv_timeout(self.timeout) {
            Ok(Reply::Document(data)) => Ok(data),
            Ok(Reply::Failed(message)) => Err(SyncError::Connectivity(message)),
            Err(RecvTimeoutError::Timeout) => Err(SyncError::Connectivity(format!(
                "Timed out reading {}",
                id
            ))),
            Err(RecvTimeoutError::Disconnected) => {
                Err(SyncError::Connectivity("Connection closed".to_string()))
            }
        }
    }

    fn set(&mut self, id: &str, blob: &str) -> SyncResult<()> {
        self.send(WsCommand::Send(ClientMessage::Set {
            doc: id.to_string(),
            data: blob.to_string(),
        }))
    }

    fn subscribe(&mut self, id: &str) -> SyncResult<Subscription> {
        let (tx, rx) = channel();
        self.send(WsCommand::Subscribe {
            doc: id.to_string(),
            tx,
        })?;

        let cmd_tx = self.cmd_tx.clone();
        let doc = id.to_string();
        Ok(Subscription::new(id, rx, move || {
            let _ = cmd_tx.send(WsCommand::Unsubscribe { doc });
        }))
    }
}

impl Drop for WsDocumentStore {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(WsCommand::Close);
    }
}

/// Outgoing frames are logged up to this many characters.
const LOG_PREVIEW_CHARS: usize = 100;

/// Leading `max_chars` characters of `text`, cut on a char boundary.
fn preview(text: &str, max_chars: usize) -> &str {
    text.char_indices()
        .nth(max_chars)
        .map_or(text, |(end, _)| &text[..end])
}

fn encode(msg: &ClientMessage) -> Option<String> {
    match serde_json::to_string(msg) {
        Ok(json) => Some(json),
        Err(e) => {
            log::error!("Failed to encode {:?}: {}", msg, e);
            None
        }
    }
}

/// Body of the WebSocket thread.
fn run_socket(
    url: &str,
    cmd_rx: Receiver<WsCommand>,
    reply_tx: Sender<Reply>,
    ready_tx: Sender<Result<(), String>>,
    connected: Arc<AtomicBool>,
) {
    log::info!("WebSocket thread: connecting to {}", url);

    let mut socket = match connect(url) {
        Ok((socket, response)) => {
            log::info!("WebSocket connected, status: {}", response.status());
            socket
        }
        Err(e) => {
            log::error!("WebSocket connection failed: {}", e);
            let _ = ready_tx.send(Err(format!("Connection failed: {}", e)));
            return;
        }
    };

    // Short read timeout so commands are picked up between reads.
    match socket.get_mut() {
        tungstenite::stream::MaybeTlsStream::Plain(tcp) => {
            let _ = tcp.set_read_timeout(Some(Duration::from_millis(50)));
            let _ = tcp.set_write_timeout(Some(Duration::from_secs(5)));
        }
        #[allow(unreachable_patterns)]
        _ => {
            log::debug!("TLS or other stream - using default timeout handling");
        }
    }

    connected.store(true, Ordering::SeqCst);
    let _ = ready_tx.send(Ok(()));

    let mut subscribers: HashMap<String, Sender<StoreEvent>> = HashMap::new();
    let mut failure = "Connection closed".to_string();

    'io: loop {
        loop {
            let outgoing = match cmd_rx.try_recv() {
                Ok(WsCommand::Send(msg)) => encode(&msg),
                Ok(WsCommand::Subscribe { doc, tx }) => {
                    subscribers.insert(doc.clone(), tx);
                    encode(&ClientMessage::Subscribe { doc })
                }
                Ok(WsCommand::Unsubscribe { doc }) => {
                    subscribers.remove(&doc);
                    encode(&ClientMessage::Unsubscribe { doc })
                }
                Ok(WsCommand::Close) => {
                    log::info!("WebSocket close requested");
                    let _ = socket.close(None);
                    break 'io;
                }
                Err(TryRecvError::Disconnected) => {
                    log::info!("WebSocket command channel disconnected");
                    break 'io;
                }
                Err(TryRecvError::Empty) => break,
            };

            if let Some(text) = outgoing {
                log::debug!("WebSocket sending: {}", preview(&text, LOG_PREVIEW_CHARS));
                if let Err(e) = socket.send(Message::Text(text)) {
                    log::error!("WebSocket send error: {}", e);
                    failure = format!("Send failed: {}", e);
                    break 'io;
                }
            }
        }

        match socket.read() {
            Ok(Message::Text(txt)) => match serde_json::from_str::<ServerMessage>(&txt) {
                Ok(ServerMessage::Document { data, .. }) => {
                    let _ = reply_tx.send(Reply::Document(data));
                }
                Ok(ServerMessage::Changed { doc, data }) => {
                    if let Some(tx) = subscribers.get(&doc) {
                        let _ = tx.send(StoreEvent::Changed(data));
                    }
                }
                Ok(ServerMessage::Saved { doc }) => {
                    log::debug!("Store acknowledged write to {}", doc);
                }
                Ok(ServerMessage::Error { message }) => {
                    log::warn!("Store reported an error: {}", message);
                    let _ = reply_tx.send(Reply::Failed(message.clone()));
                    for tx in subscribers.values() {
                        let _ = tx.send(StoreEvent::Failed(message.clone()));
                    }
                }
                Err(e) => {
                    log::warn!("Failed to parse server message: {} ({})", txt, e);
                }
            },
            Ok(Message::Ping(data)) => {
                let _ = socket.send(Message::Pong(data));
            }
            Ok(Message::Close(_)) => {
                log::info!("WebSocket received close frame");
                break;
            }
            Ok(_) => {}
            Err(tungstenite::Error::Io(ref e))
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                continue;
            }
            Err(e) => {
                log::error!("WebSocket read error: {}", e);
                failure = format!("Read failed: {}", e);
                break;
            }
        }
    }

    connected.store(false, Ordering::SeqCst);
    let _ = reply_tx.send(Reply::Failed(failure.clone()));
    for tx in subscribers.values() {
        let _ = tx.send(StoreEvent::Failed(failure.clone()));
    }
    log::info!("WebSocket thread exiting");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_websocket_scheme() {
        let result =
            WsDocumentStore::connect("http://localhost:3030/ws", Duration::from_millis(10));
        assert!(matches!(result, Err(SyncError::Protocol(_))));
    }

    #[test]
    fn test_rejects_secure_scheme_without_tls() {
        let result = WsDocumentStore::connect("wss://localhost:3030/ws", Duration::from_millis(10));
        assert!(matches!(result, Err(SyncError::Protocol(_))));
    }

    #[test]
    fn test_preview_cuts_on_char_boundary() {
        let text = format!("{}{}", "a".repeat(67), "é".repeat(10));
        assert_eq!(text.len(), 87);
        assert_eq!(preview(&text, 70), format!("{}{}", "a".repeat(67), "ééé"));
        assert_eq!(preview(&text, 100), text);

        let long = format!("{}{}", "a".repeat(99), "é".repeat(10));
        assert_eq!(preview(&long, LOG_PREVIEW_CHARS), format!("{}é", "a".repeat(99)));
    }

    #[test]
    fn test_preview_logs_multibyte_set_frame() {
        let _ = env_logger::builder()
            .is_test(true)
            .filter_level(log::LevelFilter::Debug)
            .try_init();
        let msg = ClientMessage::Set {
            doc: "d".to_string(),
            data: format!("[{{\"color\":\"{}\"}}]", "é".repeat(80)),
        };
        let text = encode(&msg).unwrap();
        log::debug!("WebSocket sending: {}", preview(&text, LOG_PREVIEW_CHARS));
        assert!(preview(&text, LOG_PREVIEW_CHARS).chars().count() <= LOG_PREVIEW_CHARS);
    }

    #[test]
    fn test_rejects_invalid_url() {
        let result = WsDocumentStore::connect("not a url", Duration::from_millis(10));
        assert!(matches!(result, Err(SyncError::Protocol(_))));
    }

    #[test]
    fn test_unreachable_server_is_connectivity_error() {
        // Port 9 (discard) is closed on any sane test host.
        let result = WsDocumentStore::connect("ws://127.0.0.1:9/ws", Duration::from_secs(5));
        assert!(matches!(result, Err(SyncError::Connectivity(_))));
    }
}
