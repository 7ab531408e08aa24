//! Periodic streak bookkeeping

use std::{sync::Arc, time::Duration};

use tokio::{
    task::JoinHandle,
    time::{interval_at, Instant},
};
use tracing::info;

use crate::state::AppState;

/// Run the daily streak check every `period`, first one period from now
pub fn spawn_streak_check(state: Arc<AppState>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Starting streak check task, every {}min", period.as_secs() / 60);
        let mut interval = interval_at(Instant::now() + period, period);
        loop {
            interval.tick().await;
            state.check_streak().await;
        }
    })
}
