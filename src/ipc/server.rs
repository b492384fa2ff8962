//! Unix domain socket server for IPC
//!
//! Answers queries from a status mirror kept up to date by engine events,
//! forwards configuration requests to the keys manager through its input
//! channel, and pushes events to subscribed clients.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::{debug, error, info, warn};

use crate::events::KeysEvent;
use crate::hotkey::InputEvent;
use crate::state::Command;

use super::protocol::{DaemonStatus, Notification, Request, Response};

const MAX_MESSAGE_LEN: usize = 1024 * 1024;

/// IPC Server handling client connections
pub struct Server {
    socket_path: PathBuf,
    listener: Option<UnixListener>,
    state: Arc<RwLock<ServerState>>,
    shutdown_tx: broadcast::Sender<()>,
    input_tx: mpsc::Sender<InputEvent>,
    events: broadcast::Sender<KeysEvent>,
}

/// Shared server state
struct ServerState {
    status: DaemonStatus,
    start_time: std::time::Instant,
}

impl ServerState {
    fn new() -> Self {
        Self {
            status: DaemonStatus::default(),
            start_time: std::time::Instant::now(),
        }
    }
}

impl Server {
    /// Bind the socket. Configuration requests go to `input_tx`; clients
    /// subscribe to `events`.
    pub fn new(
        socket_path: &Path,
        input_tx: mpsc::Sender<InputEvent>,
        events: broadcast::Sender<KeysEvent>,
    ) -> Result<Self> {
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent).context("failed to create socket directory")?;
        }

        // Remove stale socket if it exists
        if socket_path.exists() {
            std::fs::remove_file(socket_path).context("failed to remove stale socket")?;
        }

        let listener = UnixListener::bind(socket_path).context("failed to bind Unix socket")?;

        // Owner-only
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))?;
        }

        let (shutdown_tx, _) = broadcast::channel(1);

        info!(?socket_path, "IPC server listening");

        Ok(Self {
            socket_path: socket_path.to_owned(),
            listener: Some(listener),
            state: Arc::new(RwLock::new(ServerState::new())),
            shutdown_tx,
            input_tx,
            events,
        })
    }

    pub async fn set_listener_active(&self, active: bool) {
        self.state.write().await.status.listener_active = active;
    }

    /// Fold an engine event into the status mirror
    pub async fn apply_event(&self, event: &KeysEvent) {
        self.state.write().await.status.apply(event);
    }

    /// Keep the status mirror in step with the engine until the channel closes
    pub async fn track_events(&self) {
        let mut rx = self.events.subscribe();
        loop {
            match rx.recv().await {
                Ok(event) => self.apply_event(&event).await,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "status mirror lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    /// Run the server, accepting connections
    pub async fn run(&self) -> Result<()> {
        let listener = self.listener.as_ref().context("server not initialized")?;

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    debug!("client connected");
                    let state = Arc::clone(&self.state);
                    let input_tx = self.input_tx.clone();
                    let events = self.events.clone();
                    let mut shutdown_rx = self.shutdown_tx.subscribe();

                    tokio::spawn(async move {
                        tokio::select! {
                            result = Self::handle_client(stream, state, input_tx, events) => {
                                if let Err(e) = result {
                                    warn!(?e, "client handler error");
                                }
                            }
                            _ = shutdown_rx.recv() => {
                                debug!("client handler shutting down");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(?e, "accept error");
                }
            }
        }
    }

    /// Handle a single client connection
    async fn handle_client(
        stream: UnixStream,
        state: Arc<RwLock<ServerState>>,
        input_tx: mpsc::Sender<InputEvent>,
        events: broadcast::Sender<KeysEvent>,
    ) -> Result<()> {
        let (reader, mut writer) = stream.into_split();

        // Frames are read on their own task so a push never interrupts a
        // partially read request
        let (request_tx, mut request_rx) = mpsc::channel(8);
        let read_task = tokio::spawn(Self::read_requests(reader, request_tx));

        let mut subscription: Option<broadcast::Receiver<KeysEvent>> = None;

        let result = loop {
            tokio::select! {
                request = request_rx.recv() => {
                    let Some(request) = request else {
                        break Ok(());
                    };
                    let request = match request {
                        Ok(request) => request,
                        Err(e) => break Err(e),
                    };
                    debug!(?request, "received request");

                    let (response, subscribe) =
                        Self::process_request(request, &state, &input_tx).await;
                    if subscribe && subscription.is_none() {
                        subscription = Some(events.subscribe());
                        debug!("client subscribed to notifications");
                    }
                    if let Err(e) = Self::send_message(&mut writer, &response).await {
                        break Err(e);
                    }
                }
                event = next_event(&mut subscription) => {
                    match event {
                        Ok(event) => {
                            let notification = Notification::Event { event };
                            if let Err(e) = Self::send_message(&mut writer, &notification).await {
                                break Err(e);
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!(skipped = n, "subscriber lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            subscription = None;
                        }
                    }
                }
            }
        };

        read_task.abort();
        result
    }

    async fn read_requests(mut reader: OwnedReadHalf, tx: mpsc::Sender<Result<Request>>) {
        let mut len_buf = [0u8; 4];

        loop {
            // Read message length (4-byte little-endian)
            match reader.read_exact(&mut len_buf).await {
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    debug!("client disconnected");
                    return;
                }
                Err(e) => {
                    let _ = tx.send(Err(e.into())).await;
                    return;
                }
            }

            let len = u32::from_le_bytes(len_buf) as usize;
            if len > MAX_MESSAGE_LEN {
                warn!(len, "message too large, disconnecting");
                return;
            }

            let mut msg_buf = vec![0u8; len];
            let request = match reader.read_exact(&mut msg_buf).await {
                Ok(_) => serde_json::from_slice(&msg_buf).context("failed to parse request"),
                Err(e) => Err(e.into()),
            };
            let failed = request.is_err();
            if tx.send(request).await.is_err() || failed {
                return;
            }
        }
    }

    /// Send a length-prefixed JSON message
    async fn send_message<T: serde::Serialize>(writer: &mut OwnedWriteHalf, msg: &T) -> Result<()> {
        let msg_bytes = serde_json::to_vec(msg)?;
        let msg_len = (msg_bytes.len() as u32).to_le_bytes();

        writer.write_all(&msg_len).await?;
        writer.write_all(&msg_bytes).await?;

        Ok(())
    }

    /// Process a request and return a response
    /// Returns (Response, should_subscribe)
    async fn process_request(
        request: Request,
        state: &Arc<RwLock<ServerState>>,
        input_tx: &mpsc::Sender<InputEvent>,
    ) -> (Response, bool) {
        match request {
            Request::Ping => (Response::Pong, false),

            Request::GetStatus => {
                let mut state = state.write().await;
                state.status.uptime_secs = state.start_time.elapsed().as_secs();
                (Response::Status(state.status.clone()), false)
            }

            Request::IsHeld { keys } => {
                let state = state.read().await;
                let held = !keys.is_empty() && keys.is_subset(&state.status.held);
                (Response::Held { held }, false)
            }

            Request::SetModifiers { group, keys } => {
                if !group.is_configured() {
                    let message = format!("{group} derives its modifiers");
                    return (Response::error("not_configurable", message), false);
                }
                info!(%group, %keys, "modifiers changed via IPC");
                let command = Command::SetModifiers { group, keys };
                (Self::forward(input_tx, command).await, false)
            }

            Request::SetKeys { group, keys } => {
                info!(%group, count = keys.len(), "keys changed via IPC");
                (Self::forward(input_tx, Command::SetKeys { group, keys }).await, false)
            }

            Request::ArmTestCapture { keys, forward } => {
                let command = Command::ArmTestCapture { keys, forward };
                (Self::forward(input_tx, command).await, false)
            }

            Request::Subscribe => (Response::Subscribed, true),
        }
    }

    async fn forward(input_tx: &mpsc::Sender<InputEvent>, command: Command) -> Response {
        match input_tx.send(InputEvent::Command(command)).await {
            Ok(()) => Response::Ok,
            Err(_) => Response::error("engine_unavailable", "keys manager is not running"),
        }
    }

    /// Gracefully shutdown the server
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());

        // Remove socket file
        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(?e, "failed to remove socket file");
            }
        }

        info!("IPC server shutdown complete");
    }
}

async fn next_event(
    subscription: &mut Option<broadcast::Receiver<KeysEvent>>,
) -> Result<KeysEvent, broadcast::error::RecvError> {
    match subscription {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
