//! HTTP and WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{ConnectInfo, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use tokio::net::TcpListener;
use tracing::{debug, info, info_span, Instrument};

use super::page::{ChannelInfo, PageSource};
use crate::controller::Controller;
use crate::session::{FrameTransport, Session, TransportError};

/// Everything a request handler needs.
pub struct AppState {
    pub controller: Arc<Controller>,
    pub page: PageSource,
    /// Channels offered by the control page.
    pub channels: Vec<ChannelInfo>,
    pub idle_timeout: Option<Duration>,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(get_page))
        .route("/channels", get(get_channels))
        .route("/ws", get(get_websocket))
        .with_state(state)
}

/// Bind and serve until the listener fails.
pub async fn serve(addr: SocketAddr, state: Arc<AppState>) -> std::io::Result<()> {
    info!(%addr, "starting web server");
    let listener = TcpListener::bind(addr).await?;
    serve_on(listener, state).await
}

/// Serve on an already bound listener.
pub async fn serve_on(listener: TcpListener, state: Arc<AppState>) -> std::io::Result<()> {
    let router = build_router(state);
    axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>()).await
}

async fn get_page(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.page.serve_static().await
}

async fn get_channels(State(state): State<Arc<AppState>>) -> Json<Vec<ChannelInfo>> {
    Json(state.channels.clone())
}

async fn get_websocket(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> impl IntoResponse {
    ws.on_upgrade(move |ws| websocket(ws, state, addr).instrument(info_span!("session", peer = %addr)))
}

/// Single WebSocket connection.
async fn websocket(ws: WebSocket, state: Arc<AppState>, addr: SocketAddr) {
    info!(%addr, "handshake done, connection opened");
    let mut transport = WsTransport {
        socket: ws,
        idle_timeout: state.idle_timeout,
    };
    let mut session = Session::new(state.controller.clone());
    if let Err(err) = session.run(&mut transport).await {
        info!(%err, "session ended");
    }
    // The peer may already be gone.
    if let Err(err) = transport.socket.send(Message::Close(None)).await {
        debug!(%err, "close frame not sent");
    }
    info!("connection terminating");
}

/// Frames carried by an axum WebSocket.
struct WsTransport {
    socket: WebSocket,
    idle_timeout: Option<Duration>,
}

impl WsTransport {
    async fn next_message(&mut self) -> Result<Option<Message>, TransportError> {
        let received = match self.idle_timeout {
            Some(limit) => tokio::time::timeout(limit, self.socket.recv())
                .await
                .map_err(|_| TransportError::Timeout(limit))?,
            None => self.socket.recv().await,
        };
        match received {
            Some(Ok(msg)) => Ok(Some(msg)),
            Some(Err(err)) => Err(TransportError::Receive(err.to_string())),
            None => Ok(None),
        }
    }
}

impl FrameTransport for WsTransport {
    async fn recv_frame(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        loop {
            match self.next_message().await? {
                Some(Message::Text(text)) => return Ok(Some(text.into_bytes())),
                Some(Message::Binary(data)) => return Ok(Some(data)),
                // axum answers pings itself.
                Some(Message::Ping(_)) | Some(Message::Pong(_)) => continue,
                Some(Message::Close(_)) | None => return Ok(None),
            }
        }
    }

    async fn send_frame(&mut self, frame: Vec<u8>) -> Result<(), TransportError> {
        let msg = match String::from_utf8(frame) {
            Ok(text) => Message::Text(text),
            Err(err) => Message::Binary(err.into_bytes()),
        };
        self.socket
            .send(msg)
            .await
            .map_err(|err| TransportError::Send(err.to_string()))
    }
}
