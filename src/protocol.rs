//! Messages exchanged between views and the timer authority
//!
//! Commands and broadcasts are JSON objects tagged by a `type` field.
//! Command parsing is exhaustive: a message either becomes a [`Command`] or a
//! [`CommandError`], which the authority reports back as a structured failure.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    error::CommandError,
    state::{BreakKind, Phase, Settings, StatsRecord},
};

/// Command sent by a view to the timer authority
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Command {
    StartTimer,
    StartBreak {
        /// Requested length in minutes
        #[serde(rename = "breakTime", default, skip_serializing_if = "Option::is_none")]
        break_minutes: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        kind: Option<BreakKind>,
    },
    PauseTimer,
    ResumeTimer,
    ResetTimer,
    GetTimerState,
    UpdateSettings {
        settings: Settings,
    },
}

impl Command {
    const KNOWN_TYPES: [&'static str; 7] = [
        "startTimer",
        "startBreak",
        "pauseTimer",
        "resumeTimer",
        "resetTimer",
        "getTimerState",
        "updateSettings",
    ];

    /// Parse a raw JSON message, telling unknown types apart from bad payloads
    pub fn parse(message: Value) -> Result<Self, CommandError> {
        let known = message
            .get("type")
            .and_then(Value::as_str)
            .is_some_and(|kind| Self::KNOWN_TYPES.contains(&kind));
        if !known {
            return Err(CommandError::UnknownType);
        }
        serde_json::from_value(message).map_err(|e| CommandError::Malformed(e.to_string()))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::StartTimer => "startTimer",
            Command::StartBreak { .. } => "startBreak",
            Command::PauseTimer => "pauseTimer",
            Command::ResumeTimer => "resumeTimer",
            Command::ResetTimer => "resetTimer",
            Command::GetTimerState => "getTimerState",
            Command::UpdateSettings { .. } => "updateSettings",
        }
    }

    /// Whether the command changes timer state
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Command::GetTimerState)
    }
}

/// Snapshot of the timer as seen by views
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    /// Remaining seconds in the current phase
    pub time_left: u64,
    pub is_running: bool,
    pub is_break: bool,
    #[serde(default)]
    pub phase: Phase,
    pub session_count: u32,
    pub settings: Settings,
}

impl TimerSnapshot {
    /// Idle view seeded from settings, used before the authority has answered
    pub fn idle(settings: Settings) -> Self {
        Self {
            time_left: settings.work_seconds(),
            is_running: false,
            is_break: false,
            phase: Phase::Idle,
            session_count: 0,
            settings,
        }
    }

    /// `mm:ss` rendering of the remaining time
    pub fn clock(&self) -> String {
        format!("{:02}:{:02}", self.time_left / 60, self.time_left % 60)
    }
}

/// Sent once per finished phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    /// Length of the finished phase in minutes
    pub duration: u32,
    pub is_break: bool,
    pub session_count: u32,
    /// Updated statistics; only present when a focus phase finished
    pub stats: Option<StatsRecord>,
}

/// Unacknowledged message pushed to every listening view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Broadcast {
    TimerUpdate(TimerSnapshot),
    SessionComplete(SessionSummary),
}

/// Answer to a command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reply {
    State(TimerSnapshot),
    Failure { success: bool, error: String },
    Ack { success: bool },
}

impl Reply {
    pub fn ok() -> Self {
        Reply::Ack { success: true }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Reply::Failure {
            success: false,
            error: error.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        match self {
            Reply::State(_) => true,
            Reply::Failure { .. } => false,
            Reply::Ack { success } => *success,
        }
    }
}

impl From<CommandError> for Reply {
    fn from(err: CommandError) -> Self {
        Reply::failure(err.to_string())
    }
}
