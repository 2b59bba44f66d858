//! WebSocket Battle Server
//!
//! Async WebSocket server in front of the matchmaking rendezvous.
//! A connection authenticates, joins a battle and receives the result.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, instrument, warn};

use crate::battle::participant::ParticipantId;
use crate::matchmaking::{Entry, Matchmaker, MatchmakingConfig, MatchmakingError};
use crate::matchmaking::rendezvous::PairingResult;
use crate::network::auth::{authenticate, AuthConfig};
use crate::network::protocol::{
    AuthResult, BattleFinished, ClientMessage, ErrorCode, ErrorPayload, ServerMessage,
};

/// Default listening port.
pub const DEFAULT_PORT: u16 = 10001;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Rendezvous settings.
    pub matchmaking: MatchmakingConfig,
    /// JSON seed file for the in-memory store.
    pub seed_data_path: Option<PathBuf>,
    /// Server version string.
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            max_connections: 1000,
            matchmaking: MatchmakingConfig::default(),
            seed_data_path: None,
            version: crate::VERSION.to_string(),
        }
    }
}

impl ServerConfig {
    /// Create config from environment variables, defaulting what is unset.
    pub fn from_env() -> Result<Self, ServerError> {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("BIND_ADDR") {
            config.bind_addr = addr
                .parse()
                .map_err(|e| ServerError::Config(format!("BIND_ADDR={}: {}", addr, e)))?;
        }
        if let Ok(max) = std::env::var("MAX_CONNECTIONS") {
            config.max_connections = max
                .parse()
                .map_err(|e| ServerError::Config(format!("MAX_CONNECTIONS={}: {}", max, e)))?;
        }
        if let Ok(secs) = std::env::var("MATCHMAKING_TIMEOUT_SECS") {
            let secs: u64 = secs
                .parse()
                .map_err(|e| ServerError::Config(format!("MATCHMAKING_TIMEOUT_SECS={}: {}", secs, e)))?;
            // Zero keeps waiting forever
            config.matchmaking.wait_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        config.seed_data_path = std::env::var("SEED_DATA_PATH").ok().map(PathBuf::from);

        Ok(config)
    }
}

/// Server errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Connected client state.
struct ConnectedClient {
    /// Participant (after auth).
    participant: Option<ParticipantId>,
    /// Connection time.
    connected_at: Instant,
}

/// State shared by all connection tasks.
struct Shared {
    auth: AuthConfig,
    matchmaker: Arc<Matchmaker>,
    clients: RwLock<BTreeMap<SocketAddr, ConnectedClient>>,
    version: String,
}

/// The battle server.
pub struct BattleServer {
    config: ServerConfig,
    shared: Arc<Shared>,
    shutdown_tx: broadcast::Sender<()>,
}

impl BattleServer {
    /// Create a server over a rendezvous.
    pub fn new(config: ServerConfig, auth: AuthConfig, matchmaker: Arc<Matchmaker>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let shared = Arc::new(Shared {
            auth,
            matchmaker,
            clients: RwLock::new(BTreeMap::new()),
            version: config.version.clone(),
        });

        Self {
            config,
            shared,
            shutdown_tx,
        }
    }

    /// Bind the configured address and run until shutdown.
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        self.run_with_listener(listener).await
    }

    /// Run on an already bound listener until shutdown.
    #[instrument(skip_all)]
    pub async fn run_with_listener(&self, listener: TcpListener) -> Result<(), ServerError> {
        info!("Battle server listening on {}", listener.local_addr()?);

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let clients_count = self.shared.clients.read().await.len();
                            if clients_count >= self.config.max_connections {
                                warn!("Connection limit reached, rejecting {}", addr);
                                tokio::spawn(reject_connection(stream, addr));
                                continue;
                            }

                            info!("New connection from {}", addr);
                            tokio::spawn(handle_connection(
                                self.shared.clone(),
                                stream,
                                addr,
                                self.shutdown_tx.subscribe(),
                            ));
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Get active connection count.
    pub async fn connection_count(&self) -> usize {
        self.shared.clients.read().await.len()
    }

    /// Get authenticated connection count.
    pub async fn authenticated_count(&self) -> usize {
        self.shared
            .clients
            .read()
            .await
            .values()
            .filter(|c| c.participant.is_some())
            .count()
    }
}

fn server_time_millis() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}

/// Tell an over-limit client why it is being dropped.
async fn reject_connection(stream: TcpStream, addr: SocketAddr) {
    let mut ws = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            debug!("Handshake failed for rejected {}: {}", addr, e);
            return;
        }
    };
    let msg = ServerMessage::Error(ErrorPayload::new(ErrorCode::ServerOverloaded, "Connection limit reached"));
    if let Ok(text) = msg.to_json() {
        let _ = ws.send(Message::Text(text)).await;
    }
    let _ = ws.close(None).await;
}

/// Per-connection task.
async fn handle_connection(
    shared: Arc<Shared>,
    stream: TcpStream,
    addr: SocketAddr,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            error!("WebSocket handshake failed for {}: {}", addr, e);
            return;
        }
    };

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(64);

    shared.clients.write().await.insert(addr, ConnectedClient {
        participant: None,
        connected_at: Instant::now(),
    });

    let sender_task = tokio::spawn(async move {
        while let Some(msg) = msg_rx.recv().await {
            let text = match msg.to_json() {
                Ok(t) => t,
                Err(e) => {
                    error!("Failed to serialize message: {}", e);
                    continue;
                }
            };
            if ws_sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
        let _ = ws_sender.close().await;
    });

    let mut connection = Connection {
        addr,
        participant: None,
        pending: None,
        sender: msg_tx,
    };

    loop {
        tokio::select! {
            msg = ws_receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match ClientMessage::from_json(&text) {
                            Ok(client_msg) => connection.handle(&shared, client_msg).await,
                            Err(e) => {
                                debug!("Invalid message from {}: {}", addr, e);
                                connection
                                    .send(ServerMessage::Error(ErrorPayload::new(
                                        ErrorCode::InvalidInput,
                                        "Invalid message format",
                                    )))
                                    .await;
                            }
                        }
                    }
                    Some(Ok(Message::Binary(_))) => {
                        connection
                            .send(ServerMessage::Error(ErrorPayload::new(
                                ErrorCode::InvalidInput,
                                "Binary frames are not supported",
                            )))
                            .await;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("Client {} disconnected", addr);
                        break;
                    }
                    Some(Err(e)) => {
                        error!("WebSocket error for {}: {}", addr, e);
                        break;
                    }
                    _ => {}
                }
            }
            _ = shutdown_rx.recv() => {
                connection
                    .send(ServerMessage::Shutdown {
                        reason: "Server shutting down".to_string(),
                    })
                    .await;
                break;
            }
        }
    }

    // Dropping the pending wait frees the rendezvous slot
    if let Some(pending) = connection.pending.take() {
        pending.abort();
    }
    drop(connection);
    if tokio::time::timeout(Duration::from_secs(1), sender_task).await.is_err() {
        debug!("Sender for {} did not drain in time", addr);
    }

    if let Some(client) = shared.clients.write().await.remove(&addr) {
        info!(
            "Client {} cleaned up after {:?}",
            addr,
            client.connected_at.elapsed()
        );
    }
}

/// Connection-local state.
struct Connection {
    addr: SocketAddr,
    participant: Option<ParticipantId>,
    /// Task awaiting a battle while this connection holds the waiting slot.
    pending: Option<JoinHandle<()>>,
    sender: mpsc::Sender<ServerMessage>,
}

impl Connection {
    async fn send(&self, msg: ServerMessage) {
        let _ = self.sender.send(msg).await;
    }

    async fn handle(&mut self, shared: &Arc<Shared>, msg: ClientMessage) {
        match msg {
            ClientMessage::Auth { token } => self.handle_auth(shared, &token).await,
            ClientMessage::JoinBattle => self.handle_join(shared).await,
            ClientMessage::Ping { timestamp } => {
                self.send(ServerMessage::Pong {
                    timestamp,
                    server_time: server_time_millis(),
                })
                .await;
            }
        }
    }

    async fn handle_auth(&mut self, shared: &Arc<Shared>, token: &str) {
        match authenticate(token, &shared.auth) {
            Ok(participant) => {
                if let Some(client) = shared.clients.write().await.get_mut(&self.addr) {
                    client.participant = Some(participant.clone());
                }
                debug!("Client {} authenticated as {}", self.addr, participant);

                self.send(ServerMessage::AuthResult(AuthResult {
                    success: true,
                    participant: Some(participant.to_string()),
                    error: None,
                    server_version: shared.version.clone(),
                }))
                .await;
                self.participant = Some(participant);
            }
            Err(e) => {
                warn!("Authentication failed for {}: {}", self.addr, e);
                self.send(ServerMessage::AuthResult(AuthResult {
                    success: false,
                    participant: None,
                    error: Some(e.to_string()),
                    server_version: shared.version.clone(),
                }))
                .await;
            }
        }
    }

    async fn handle_join(&mut self, shared: &Arc<Shared>) {
        let Some(participant) = self.participant.clone() else {
            self.send(ServerMessage::Error(ErrorPayload::new(
                ErrorCode::NotAuthenticated,
                "Must authenticate first",
            )))
            .await;
            return;
        };

        if self.pending.as_ref().is_some_and(|h| !h.is_finished()) {
            let err = MatchmakingError::AlreadyWaiting(participant);
            self.send(ServerMessage::Error(ErrorPayload::from(&err))).await;
            return;
        }

        match shared.matchmaker.enter(participant).await {
            Ok(Entry::Paired(result)) => self.send(battle_reply(Ok(result))).await,
            Ok(Entry::Waiting(pending)) => {
                self.send(ServerMessage::Waiting {
                    message: "Waiting for an opponent".to_string(),
                })
                .await;

                let matchmaker = shared.matchmaker.clone();
                let sender = self.sender.clone();
                self.pending = Some(tokio::spawn(async move {
                    let result = matchmaker.wait(pending).await;
                    let _ = sender.send(battle_reply(result)).await;
                }));
            }
            Err(e) => self.send(battle_reply(Err(e))).await,
        }
    }
}

fn battle_reply(result: PairingResult) -> ServerMessage {
    match result {
        Ok(result) => ServerMessage::BattleFinished(BattleFinished::from(result.as_ref())),
        Err(e) => ServerMessage::Error(ErrorPayload::from(&e)),
    }
}
