//! Background tasks module
//!
//! This module contains the background tasks driven by the timer authority.

pub mod countdown;
pub mod focus_protection;
pub mod streak_check;

// Re-export main functions
pub use countdown::spawn_countdown;
pub use focus_protection::spawn_focus_protection;
pub use streak_check::spawn_streak_check;
