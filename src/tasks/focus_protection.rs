//! Focus protection worker
//!
//! The authority only publishes whether protection should be on. This single
//! worker applies the latest wish, so engage/release calls never overlap and
//! rapid flips collapse into the final state.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::state::AppState;

pub fn spawn_focus_protection(state: Arc<AppState>) -> JoinHandle<()> {
    let mut desired = state.protection_receiver();
    let guard = Arc::clone(state.focus_guard());
    drop(state);

    tokio::spawn(async move {
        loop {
            let engage = *desired.borrow_and_update();
            let result = if engage {
                guard.engage().await
            } else {
                guard.release().await
            };
            match result {
                Ok(()) => debug!("Focus protection {}", if engage { "on" } else { "off" }),
                Err(e) => warn!(
                    "Failed to {} focus protection: {}",
                    if engage { "enable" } else { "disable" },
                    e
                ),
            }

            if desired.changed().await.is_err() {
                break;
            }
        }
    })
}
