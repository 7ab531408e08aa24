//! Mirrored timer view
//!
//! A view mirrors the authority's state for display and forwards user
//! commands. When the authority cannot be reached it keeps the user going
//! with a local countdown that simply decrements once per local tick. That
//! countdown drifts and is overwritten as soon as the authority answers
//! again; it is a degraded mode, not a second source of truth.

use tracing::{debug, info, warn};

use super::link::AuthorityLink;
use crate::{
    error::LinkError,
    protocol::{Broadcast, Command, Reply, SessionSummary, TimerSnapshot},
    state::{BreakKind, Phase, Settings},
};

/// Whether the view is backed by the authority
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    Connected,
    Standalone,
}

pub struct ViewSync<L> {
    link: L,
    view: TimerSnapshot,
    mode: SyncMode,
}

impl<L: AuthorityLink> ViewSync<L> {
    /// New view seeded from the last known settings; call [`ViewSync::connect`] next
    pub fn new(link: L, settings: Settings) -> Self {
        Self {
            link,
            view: TimerSnapshot::idle(settings),
            mode: SyncMode::Standalone,
        }
    }

    pub fn view(&self) -> &TimerSnapshot {
        &self.view
    }

    pub fn mode(&self) -> SyncMode {
        self.mode
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    /// Pull the current state directly instead of waiting for the next broadcast
    pub async fn connect(&mut self) -> SyncMode {
        match self.link.request(Command::GetTimerState).await {
            Ok(Reply::State(snapshot)) => {
                self.view = snapshot;
                self.mode = SyncMode::Connected;
                debug!("View connected to timer authority");
            }
            Ok(other) => {
                warn!("Unexpected reply to state request: {:?}", other);
                self.mode = SyncMode::Standalone;
            }
            Err(e) => {
                info!("Running standalone, {}", e);
                self.mode = SyncMode::Standalone;
            }
        }
        self.mode
    }

    /// Mirror a broadcast. Returns the summary of a finished phase, if any.
    pub fn apply(&mut self, message: Broadcast) -> Option<SessionSummary> {
        self.mode = SyncMode::Connected;
        match message {
            Broadcast::TimerUpdate(snapshot) => {
                self.view = snapshot;
                None
            }
            Broadcast::SessionComplete(summary) => {
                self.view.session_count = summary.session_count;
                Some(summary)
            }
        }
    }

    pub async fn start_focus(&mut self) {
        self.view.phase = Phase::Focus;
        self.view.is_break = false;
        self.view.is_running = true;
        self.view.time_left = self.view.settings.work_seconds();
        self.send(Command::StartTimer).await;
    }

    /// Start the break the session cadence calls for, or the given kind
    pub async fn start_break(&mut self, kind: Option<BreakKind>) {
        let (kind, minutes) = BreakKind::resolve(
            None,
            kind,
            self.view.session_count,
            &self.view.settings,
        );
        self.view.phase = kind.phase();
        self.view.is_break = true;
        self.view.is_running = true;
        self.view.time_left = u64::from(minutes) * 60;
        self.send(Command::StartBreak {
            break_minutes: Some(minutes),
            kind: Some(kind),
        })
        .await;
    }

    pub async fn pause(&mut self) {
        self.view.is_running = false;
        self.send(Command::PauseTimer).await;
    }

    pub async fn resume(&mut self) {
        if self.view.time_left > 0 {
            self.view.is_running = true;
        }
        self.send(Command::ResumeTimer).await;
    }

    pub async fn reset(&mut self) {
        self.view.phase = Phase::Focus;
        self.view.is_break = false;
        self.view.is_running = false;
        self.view.time_left = self.view.settings.work_seconds();
        self.send(Command::ResetTimer).await;
    }

    pub async fn update_settings(&mut self, settings: Settings) {
        let settings = settings.sanitized();
        self.view.settings = settings.clone();
        if !self.view.is_running {
            self.view.time_left = u64::from(settings.minutes_for(self.view.phase)) * 60;
        }
        self.send(Command::UpdateSettings { settings }).await;
    }

    /// Forward a command after the optimistic local update.
    ///
    /// Rejections keep the connection; an unreachable authority switches the
    /// view to its local countdown.
    async fn send(&mut self, command: Command) {
        let name = command.name();
        match self.link.request(command).await {
            Ok(_) => self.mode = SyncMode::Connected,
            Err(LinkError::Rejected(e)) => warn!("Authority rejected {}: {}", name, e),
            Err(e) => {
                if self.mode == SyncMode::Connected {
                    info!("Timer authority unavailable, using local timer: {}", e);
                }
                self.mode = SyncMode::Standalone;
            }
        }
    }

    /// Advance the local countdown by one second. Only does anything while
    /// standalone; returns the summary when the local phase runs out.
    pub fn tick_local(&mut self) -> Option<SessionSummary> {
        if self.mode != SyncMode::Standalone || !self.view.is_running {
            return None;
        }

        self.view.time_left = self.view.time_left.saturating_sub(1);
        if self.view.time_left > 0 {
            return None;
        }

        self.view.is_running = false;
        let was_break = self.view.is_break;
        if !was_break {
            self.view.session_count += 1;
        }
        let minutes = self.view.settings.minutes_for(self.view.phase);
        Some(SessionSummary {
            duration: minutes,
            is_break: was_break,
            session_count: self.view.session_count,
            stats: None,
        })
    }
}
