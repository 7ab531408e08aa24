//! HTTP link to a timer authority served by `focus-keeper serve`

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::debug;

use super::link::{AuthorityLink, VIEW_BUFFER};
use crate::{
    error::LinkError,
    protocol::{Broadcast, Command, Reply},
};

/// Talks to the authority's `/message` and `/events` endpoints
#[derive(Debug, Clone)]
pub struct HttpLink {
    base_url: String,
    client: reqwest::Client,
}

impl HttpLink {
    /// `base_url` like `http://127.0.0.1:20554`
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl AuthorityLink for HttpLink {
    async fn request(&self, command: Command) -> Result<Reply, LinkError> {
        let response = self
            .client
            .post(format!("{}/message", self.base_url))
            .json(&command)
            .send()
            .await?;

        // Failures carry a structured body too, so the status is not checked
        let reply: Reply = response.json().await?;
        match reply {
            Reply::Failure { error, .. } => Err(LinkError::Rejected(error)),
            reply => Ok(reply),
        }
    }

    async fn subscribe(&self) -> Result<mpsc::Receiver<Broadcast>, LinkError> {
        let response = self
            .client
            .get(format!("{}/events", self.base_url))
            .header("accept", "text/event-stream")
            .send()
            .await?
            .error_for_status()?;

        let (tx, rx) = mpsc::channel(VIEW_BUFFER);
        let mut body = response.bytes_stream();
        tokio::spawn(async move {
            let mut parser = SseParser::default();
            while let Some(chunk) = body.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        debug!("Broadcast stream ended: {}", e);
                        break;
                    }
                };
                for message in parser.feed(&chunk) {
                    if tx.send(message).await.is_err() {
                        return;
                    }
                }
            }
        });
        Ok(rx)
    }
}

/// Incremental parser for `data:` lines of a server-sent-event stream
#[derive(Debug, Default)]
pub(crate) struct SseParser {
    buffer: String,
    data: String,
}

impl SseParser {
    /// Consume a chunk and return every complete broadcast in it
    pub(crate) fn feed(&mut self, chunk: &[u8]) -> Vec<Broadcast> {
        self.buffer.push_str(&String::from_utf8_lossy(chunk));

        let mut messages = Vec::new();
        while let Some(end) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=end).collect();
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if !self.data.is_empty() {
                    match serde_json::from_str(&self.data) {
                        Ok(message) => messages.push(message),
                        Err(e) => debug!("Skipping unreadable broadcast: {}", e),
                    }
                    self.data.clear();
                }
            } else if let Some(data) = line.strip_prefix("data:") {
                if !self.data.is_empty() {
                    self.data.push('\n');
                }
                self.data.push_str(data.strip_prefix(' ').unwrap_or(data));
            }
        }
        messages
    }
}
