//! State management module
//!
//! The pure timer state machine, its settings and statistics, and the
//! [`AppState`] authority that owns them.

pub mod app_state;
pub mod settings;
pub mod stats;
pub mod timer_state;

// Re-export main types
pub use app_state::{AppState, AppStateBuilder};
pub use settings::Settings;
pub use stats::StatsRecord;
pub use timer_state::{BreakKind, Completion, PersistedTimerState, Phase, TickOutcome, TimerState};
