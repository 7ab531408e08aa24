//! Timer settings

use serde::{Deserialize, Serialize};

use super::timer_state::{BreakKind, Phase};

/// Durations (whole minutes) and behaviour flags read by the timer authority
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    #[serde(rename = "workTime")]
    pub work_minutes: u32,
    #[serde(rename = "breakTime")]
    pub break_minutes: u32,
    #[serde(rename = "longBreakTime")]
    pub long_break_minutes: u32,
    pub sessions_before_long_break: u32,
    pub auto_start_breaks: bool,
    pub auto_start_next_session: bool,
    #[serde(rename = "focusProtection")]
    pub focus_protection_enabled: bool,
    /// Daily focus goal in minutes; only displayed by views
    pub daily_goal: u32,
}

impl Settings {
    /// Copy with every duration at least one minute and a long-break cadence of at least one
    pub fn sanitized(mut self) -> Self {
        self.work_minutes = self.work_minutes.max(1);
        self.break_minutes = self.break_minutes.max(1);
        self.long_break_minutes = self.long_break_minutes.max(1);
        self.sessions_before_long_break = self.sessions_before_long_break.max(1);
        self
    }

    pub fn work_seconds(&self) -> u64 {
        u64::from(self.work_minutes) * 60
    }

    pub fn break_minutes_for(&self, kind: BreakKind) -> u32 {
        match kind {
            BreakKind::Short => self.break_minutes,
            BreakKind::Long => self.long_break_minutes,
        }
    }

    /// Configured length of a phase; idle counts as a focus phase waiting to start
    pub fn minutes_for(&self, phase: Phase) -> u32 {
        match phase {
            Phase::Idle | Phase::Focus => self.work_minutes,
            Phase::Break => self.break_minutes,
            Phase::LongBreak => self.long_break_minutes,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            work_minutes: 25,
            break_minutes: 5,
            long_break_minutes: 15,
            sessions_before_long_break: 4,
            auto_start_breaks: true,
            auto_start_next_session: false,
            focus_protection_enabled: true,
            daily_goal: 240,
        }
    }
}
