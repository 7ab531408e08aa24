//! Channel from a view to the timer authority

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast::error::RecvError, mpsc};

use crate::{
    error::LinkError,
    protocol::{Broadcast, Command, Reply},
    state::AppState,
};

/// Forwarded broadcasts buffered per view
pub(crate) const VIEW_BUFFER: usize = 64;

/// Request/response plus subscription access to the timer authority.
///
/// Unlike broadcasts, requests propagate failure: an unreachable authority
/// is how a view learns it must fall back to a local countdown.
#[async_trait]
pub trait AuthorityLink: Send + Sync {
    async fn request(&self, command: Command) -> Result<Reply, LinkError>;

    /// Stream of broadcasts; the receiver closes when the authority goes away
    async fn subscribe(&self) -> Result<mpsc::Receiver<Broadcast>, LinkError>;
}

/// Link to an authority living in the same process
#[derive(Clone)]
pub struct InProcessLink {
    state: Arc<AppState>,
}

impl InProcessLink {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl AuthorityLink for InProcessLink {
    async fn request(&self, command: Command) -> Result<Reply, LinkError> {
        Ok(self.state.handle(command).await)
    }

    async fn subscribe(&self) -> Result<mpsc::Receiver<Broadcast>, LinkError> {
        let mut events = self.state.subscribe();
        let (tx, rx) = mpsc::channel(VIEW_BUFFER);
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(message) => {
                        if tx.send(message).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                }
            }
        });
        Ok(rx)
    }
}
