//! Accepts page requests and control connections from the network.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Root;
use crate::controller::Controller;

pub mod page;
pub mod web;

pub use self::page::PageSource;
pub use self::web::{build_router, serve_on, AppState};

/// Serve the control page and WebSocket API for a pre-configured Controller.
pub async fn serve(config: &Root, controller: Arc<Controller>) -> io::Result<()> {
    let addr: SocketAddr = config
        .server
        .web_addr
        .parse()
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;

    let state = Arc::new(AppState {
        controller,
        page: PageSource::from_config(config.server.page.as_ref()),
        channels: page::channel_list(&config.output.channels),
        idle_timeout: config.server.idle_timeout_secs.map(Duration::from_secs),
    });

    web::serve(addr, state).await
}
