//! Focus Keeper - a background focus/break timer
//!
//! This library provides the timer authority (a drift-proof countdown that
//! persists itself and survives restarts and host suspension), the HTTP
//! message channel views use to drive it, and the view-side mirror that
//! falls back to a local countdown when the authority is unreachable.

pub mod api;
pub mod clock;
pub mod config;
pub mod error;
pub mod protocol;
pub mod services;
pub mod state;
pub mod store;
pub mod tasks;
pub mod utils;
pub mod view;

// Re-export commonly used types
pub use api::create_router;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use protocol::{Broadcast, Command, Reply, SessionSummary, TimerSnapshot};
pub use state::{AppState, Phase, Settings, StatsRecord};
pub use utils::signals::shutdown_signal;
