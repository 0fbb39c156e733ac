//! Static control page.

use std::path::PathBuf;

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::{info, warn};

use crate::config;

const HTML_DOC: &str = include_str!("./index.html");

/// Where the control page comes from.
#[derive(Debug, Clone)]
pub enum PageSource {
    /// The page compiled into the binary.
    Bundled,
    /// A file read on every request.
    File(PathBuf),
}

/// A selectable channel as the control page lists it.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ChannelInfo {
    pub index: usize,
    pub name: String,
}

/// Page entries for the configured outputs. Unnamed channels are numbered from 1.
pub fn channel_list(channels: &[config::Channel]) -> Vec<ChannelInfo> {
    channels
        .iter()
        .enumerate()
        .map(|(index, channel)| ChannelInfo {
            index,
            name: channel.name.clone().unwrap_or_else(|| format!("LED {}", index + 1)),
        })
        .collect()
}

/// A fully rendered static response.
#[derive(Debug)]
pub struct Page {
    pub status: StatusCode,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl PageSource {
    pub fn from_config(page: Option<&PathBuf>) -> PageSource {
        match page {
            Some(path) => PageSource::File(path.clone()),
            None => PageSource::Bundled,
        }
    }

    /// Render the control page.
    pub async fn serve_static(&self) -> Page {
        match self {
            PageSource::Bundled => {
                info!("serve bundled page");
                Page::html(HTML_DOC.as_bytes().to_vec())
            }
            PageSource::File(path) => match tokio::fs::read(path).await {
                Ok(body) => {
                    info!(path = %path.display(), len = body.len(), "serve page");
                    Page::html(body)
                }
                Err(err) => {
                    warn!(path = %path.display(), %err, "unable to read page");
                    Page {
                        status: StatusCode::NOT_FOUND,
                        content_type: "text/plain; charset=utf-8",
                        body: b"control page not found".to_vec(),
                    }
                }
            },
        }
    }
}

impl Page {
    fn html(body: Vec<u8>) -> Page {
        Page {
            status: StatusCode::OK,
            content_type: "text/html; charset=utf-8",
            body,
        }
    }
}

impl IntoResponse for Page {
    fn into_response(self) -> Response {
        (self.status, [(header::CONTENT_TYPE, self.content_type)], self.body).into_response()
    }
}
