//! Countdown background task

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use tokio::{
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tracing::{debug, info};

use crate::state::AppState;

/// A gap this many tick periods long between two ticks means the host was
/// suspended (or the process starved)
const WALL_CLOCK_JUMP_FACTOR: i64 = 5;

/// Marks one live countdown loop for as long as it exists
struct LiveCountdown(Arc<AtomicUsize>);

impl LiveCountdown {
    fn enter(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for LiveCountdown {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Spawn the periodic tick loop. The caller owns the handle and must abort
/// any previous one first; the loop ends by itself once the timer stops.
pub fn spawn_countdown(state: Arc<AppState>) -> JoinHandle<()> {
    tokio::spawn(countdown_task(state))
}

async fn countdown_task(state: Arc<AppState>) {
    let _live = LiveCountdown::enter(state.countdown_counter());
    let period = state.tick_interval();
    let period_ms = period.as_millis() as i64;
    debug!("Countdown started, ticking every {}ms", period_ms);

    // The command that started us already broadcast the fresh state
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last_tick_ms = state.clock().now_ms();

    loop {
        interval.tick().await;

        let now_ms = state.clock().now_ms();
        let gap_ms = now_ms - last_tick_ms;
        if gap_ms > period_ms * WALL_CLOCK_JUMP_FACTOR {
            info!(
                "Wall clock moved {}s since the last tick, reconciling with deadline",
                gap_ms / 1000
            );
        }
        last_tick_ms = now_ms;

        if !state.tick().await {
            debug!("Timer stopped, countdown finished");
            break;
        }
    }
}
