//! Timer state machine
//!
//! Pure transitions over [`TimerState`]; the caller supplies the current
//! wall-clock time. While running, the remaining time is always derived from
//! the absolute deadline, never decremented per tick, so a tick that arrives
//! minutes late (host suspended) still lands on the right value.

use serde::{Deserialize, Serialize};

use super::settings::Settings;

/// Longest phase a stored record may claim: `u32::MAX` minutes
const MAX_PHASE_SECONDS: i64 = u32::MAX as i64 * 60;

/// Epoch milliseconds `seconds` after `now_ms`, saturating instead of overflowing
fn deadline(now_ms: i64, seconds: u64) -> i64 {
    let span_ms = i64::try_from(seconds)
        .unwrap_or(i64::MAX)
        .saturating_mul(1000);
    now_ms.saturating_add(span_ms)
}

/// Current mode of the timer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    #[default]
    Idle,
    Focus,
    Break,
    LongBreak,
}

impl Phase {
    pub fn is_break(self) -> bool {
        matches!(self, Phase::Break | Phase::LongBreak)
    }

    pub fn label(self) -> &'static str {
        match self {
            Phase::Idle => "Ready",
            Phase::Focus => "Focus",
            Phase::Break => "Break",
            Phase::LongBreak => "Long break",
        }
    }
}

/// Which break to start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreakKind {
    Short,
    Long,
}

impl BreakKind {
    pub fn phase(self) -> Phase {
        match self {
            BreakKind::Short => Phase::Break,
            BreakKind::Long => Phase::LongBreak,
        }
    }

    /// Break that follows `session_count` completed focus sessions
    pub fn after_sessions(session_count: u32, settings: &Settings) -> Self {
        let cadence = settings.sessions_before_long_break.max(1);
        if session_count > 0 && session_count % cadence == 0 {
            BreakKind::Long
        } else {
            BreakKind::Short
        }
    }

    /// Work out kind and length of a requested break.
    ///
    /// An explicit kind wins; a bare length counts as long only when it
    /// matches the long break and not the short one; with neither, the
    /// session cadence decides.
    pub fn resolve(
        minutes: Option<u32>,
        kind: Option<BreakKind>,
        session_count: u32,
        settings: &Settings,
    ) -> (Self, u32) {
        let (kind, minutes) = match (kind, minutes) {
            (Some(kind), minutes) => (kind, minutes.unwrap_or(settings.break_minutes_for(kind))),
            (None, Some(minutes)) => {
                let long = minutes == settings.long_break_minutes
                    && minutes != settings.break_minutes;
                (if long { BreakKind::Long } else { BreakKind::Short }, minutes)
            }
            (None, None) => {
                let kind = Self::after_sessions(session_count, settings);
                (kind, settings.break_minutes_for(kind))
            }
        };
        (kind, minutes.max(1))
    }
}

/// Result of a single tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Timer is not running; nothing to do
    Stopped,
    /// Still counting down
    Running { remaining_seconds: u64 },
    /// Deadline reached; the caller must run [`TimerState::complete`]
    Expired,
}

/// What a finished phase produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    pub finished: Phase,
    /// Length the finished phase was started with
    pub minutes: u32,
    pub session_count: u32,
    /// Phase started automatically afterwards, if any
    pub auto_started: Option<Phase>,
}

/// Authoritative timer state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerState {
    pub phase: Phase,
    pub running: bool,
    /// Frozen value while paused; refreshed from the deadline on every tick while running
    pub remaining_seconds: u64,
    /// Absolute deadline in epoch milliseconds, set whenever `running` is true
    pub end_timestamp_ms: Option<i64>,
    /// Length in minutes the current phase was started with
    pub phase_minutes: u32,
    /// Completed focus sessions since the last reset of the counter
    pub session_count: u32,
}

impl TimerState {
    /// Idle timer with a full focus session loaded
    pub fn new(settings: &Settings) -> Self {
        Self {
            phase: Phase::Idle,
            running: false,
            remaining_seconds: settings.work_seconds(),
            end_timestamp_ms: None,
            phase_minutes: settings.work_minutes,
            session_count: 0,
        }
    }

    pub fn start_focus(&mut self, now_ms: i64, settings: &Settings) {
        self.start_phase(Phase::Focus, settings.work_minutes, now_ms);
    }

    pub fn start_break(&mut self, now_ms: i64, kind: BreakKind, minutes: u32) {
        self.start_phase(kind.phase(), minutes, now_ms);
    }

    fn start_phase(&mut self, phase: Phase, minutes: u32, now_ms: i64) {
        let seconds = u64::from(minutes) * 60;
        self.phase = phase;
        self.phase_minutes = minutes;
        self.remaining_seconds = seconds;
        self.end_timestamp_ms = Some(deadline(now_ms, seconds));
        self.running = true;
    }

    /// Freeze the countdown. Returns false if it was not running.
    pub fn pause(&mut self, now_ms: i64) -> bool {
        if !self.running {
            return false;
        }
        self.remaining_seconds = self.remaining_at(now_ms);
        self.running = false;
        self.end_timestamp_ms = None;
        true
    }

    /// Continue a paused phase from its frozen remaining time.
    /// Returns false if already running or nothing is left.
    pub fn resume(&mut self, now_ms: i64) -> bool {
        if self.running || self.remaining_seconds == 0 {
            return false;
        }
        if self.phase == Phase::Idle {
            self.phase = Phase::Focus;
        }
        self.end_timestamp_ms = Some(deadline(now_ms, self.remaining_seconds));
        self.running = true;
        true
    }

    /// Stop and load a fresh focus session. The session counter is kept.
    pub fn reset(&mut self, settings: &Settings) {
        self.phase = Phase::Focus;
        self.running = false;
        self.end_timestamp_ms = None;
        self.phase_minutes = settings.work_minutes;
        self.remaining_seconds = settings.work_seconds();
    }

    /// Reload a stopped timer with the full configured length of its phase
    pub fn reload(&mut self, settings: &Settings) {
        if self.running {
            return;
        }
        self.phase_minutes = settings.minutes_for(self.phase);
        self.remaining_seconds = u64::from(self.phase_minutes) * 60;
    }

    /// Seconds left at `now_ms`, rounded up and clamped at zero
    pub fn remaining_at(&self, now_ms: i64) -> u64 {
        match (self.running, self.end_timestamp_ms) {
            (true, Some(end)) => {
                let left_ms = end.saturating_sub(now_ms);
                if left_ms <= 0 {
                    0
                } else {
                    (left_ms / 1000 + i64::from(left_ms % 1000 != 0)) as u64
                }
            }
            _ => self.remaining_seconds,
        }
    }

    pub fn is_expired(&self, now_ms: i64) -> bool {
        self.running && self.remaining_at(now_ms) == 0
    }

    pub fn tick(&mut self, now_ms: i64) -> TickOutcome {
        if !self.running {
            return TickOutcome::Stopped;
        }
        self.remaining_seconds = self.remaining_at(now_ms);
        if self.remaining_seconds == 0 {
            TickOutcome::Expired
        } else {
            TickOutcome::Running {
                remaining_seconds: self.remaining_seconds,
            }
        }
    }

    /// Finish the current phase and apply the auto-advance policy in the same step
    pub fn complete(&mut self, now_ms: i64, settings: &Settings) -> Completion {
        let finished = self.phase;
        let minutes = self.phase_minutes;

        self.running = false;
        self.remaining_seconds = 0;
        self.end_timestamp_ms = None;

        if finished == Phase::Focus {
            self.session_count = self.session_count.saturating_add(1);
        }

        let auto_started = match finished {
            Phase::Focus if settings.auto_start_breaks => {
                let kind = BreakKind::after_sessions(self.session_count, settings);
                self.start_break(now_ms, kind, settings.break_minutes_for(kind));
                Some(kind.phase())
            }
            Phase::Break | Phase::LongBreak if settings.auto_start_next_session => {
                self.start_focus(now_ms, settings);
                Some(Phase::Focus)
            }
            _ => None,
        };

        Completion {
            finished,
            minutes,
            session_count: self.session_count,
            auto_started,
        }
    }

    pub fn to_persisted(&self, now_ms: i64) -> PersistedTimerState {
        PersistedTimerState {
            phase: Some(self.phase),
            time_left: Some(self.remaining_at(now_ms) as i64),
            is_running: Some(self.running),
            is_break: Some(self.phase.is_break()),
            session_count: Some(i64::from(self.session_count)),
            end_time: self.end_timestamp_ms,
            phase_minutes: Some(self.phase_minutes),
            last_updated: Some(now_ms),
        }
    }

    /// Rebuild from a stored record, correcting anything malformed.
    ///
    /// A running record keeps its deadline even if it already passed; the
    /// caller decides whether that means the session completed while away.
    pub fn from_persisted(record: &PersistedTimerState, settings: &Settings, now_ms: i64) -> Self {
        let running = record.is_running.unwrap_or(false);
        let mut phase = record.phase.unwrap_or(match record.is_break {
            Some(true) => Phase::Break,
            _ if running => Phase::Focus,
            _ => Phase::Idle,
        });
        if running && phase == Phase::Idle {
            phase = Phase::Focus;
        }

        let remaining_seconds = match record.time_left {
            Some(left) if (0..=MAX_PHASE_SECONDS).contains(&left) => left as u64,
            _ => settings.work_seconds(),
        };
        let end_timestamp_ms = if running {
            Some(
                record
                    .end_time
                    .filter(|end| *end <= deadline(now_ms, MAX_PHASE_SECONDS as u64))
                    .unwrap_or_else(|| deadline(now_ms, remaining_seconds)),
            )
        } else {
            None
        };

        Self {
            phase,
            running,
            remaining_seconds,
            end_timestamp_ms,
            phase_minutes: record
                .phase_minutes
                .filter(|minutes| *minutes > 0)
                .unwrap_or_else(|| settings.minutes_for(phase)),
            session_count: record
                .session_count
                .and_then(|count| u32::try_from(count).ok())
                .unwrap_or(0),
        }
    }
}

/// Stored shape of the timer under the `timerState` key; every field optional on read
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PersistedTimerState {
    pub phase: Option<Phase>,
    pub time_left: Option<i64>,
    pub is_running: Option<bool>,
    pub is_break: Option<bool>,
    pub session_count: Option<i64>,
    pub end_time: Option<i64>,
    pub phase_minutes: Option<u32>,
    pub last_updated: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const T0: i64 = 1_700_000_000_000;

    fn pomodoro() -> Settings {
        Settings {
            work_minutes: 25,
            break_minutes: 5,
            long_break_minutes: 15,
            sessions_before_long_break: 4,
            ..Settings::default()
        }
    }

    #[test]
    fn start_focus_sets_deadline() {
        let settings = pomodoro();
        let mut timer = TimerState::new(&settings);
        timer.start_focus(T0, &settings);

        assert_eq!(timer.phase, Phase::Focus);
        assert!(timer.running);
        assert_eq!(timer.end_timestamp_ms, Some(T0 + 1_500_000));
        assert_eq!(timer.remaining_at(T0 + 10_000), 1490);
    }

    #[test]
    fn remaining_rounds_up_partial_seconds() {
        let settings = pomodoro();
        let mut timer = TimerState::new(&settings);
        timer.start_focus(T0, &settings);

        assert_eq!(timer.remaining_at(T0 + 1), 1500);
        assert_eq!(timer.remaining_at(T0 + 1_499_001), 1);
        assert_eq!(timer.remaining_at(T0 + 1_500_000), 0);
    }

    #[test]
    fn remaining_never_goes_negative() {
        let settings = pomodoro();
        let mut timer = TimerState::new(&settings);
        timer.start_focus(T0, &settings);

        for late_ms in [1_500_000, 1_500_001, 3_600_000, i64::from(u32::MAX)] {
            assert_eq!(timer.remaining_at(T0 + late_ms), 0);
        }
    }

    #[test]
    fn late_tick_expires_once() {
        let settings = Settings {
            auto_start_breaks: false,
            ..pomodoro()
        };
        let mut timer = TimerState::new(&settings);
        timer.start_focus(T0, &settings);

        // Suspended for an hour past the deadline
        let resumed = T0 + 1_500_000 + 3_600_000;
        assert_eq!(timer.tick(resumed), TickOutcome::Expired);
        let completion = timer.complete(resumed, &settings);
        assert_eq!(completion.session_count, 1);

        assert_eq!(timer.tick(resumed + 1000), TickOutcome::Stopped);
        assert_eq!(timer.session_count, 1);
        assert_eq!(timer.remaining_seconds, 0);
    }

    #[test]
    fn pause_freezes_and_resume_continues() {
        let settings = pomodoro();
        let mut timer = TimerState::new(&settings);
        timer.start_focus(T0, &settings);

        assert!(timer.pause(T0 + 60_000));
        assert!(!timer.running);
        assert_eq!(timer.remaining_at(T0 + 600_000), 1440);
        assert!(!timer.pause(T0 + 600_000));

        assert!(timer.resume(T0 + 600_000));
        assert_eq!(timer.end_timestamp_ms, Some(T0 + 600_000 + 1_440_000));
        assert!(!timer.resume(T0 + 600_000));
    }

    #[test]
    fn reset_loads_focus_and_keeps_count() {
        let settings = pomodoro();
        let mut timer = TimerState::new(&settings);
        timer.session_count = 3;
        timer.start_break(T0, BreakKind::Short, 5);

        timer.reset(&settings);
        assert_eq!(timer.phase, Phase::Focus);
        assert!(!timer.running);
        assert_eq!(timer.end_timestamp_ms, None);
        assert_eq!(timer.remaining_seconds, 1500);
        assert_eq!(timer.session_count, 3);
    }

    #[test]
    fn every_fourth_session_earns_a_long_break() {
        let settings = pomodoro();
        let kinds: Vec<_> = (1..=9)
            .map(|n| BreakKind::after_sessions(n, &settings))
            .collect();
        assert_eq!(
            kinds,
            vec![
                BreakKind::Short,
                BreakKind::Short,
                BreakKind::Short,
                BreakKind::Long,
                BreakKind::Short,
                BreakKind::Short,
                BreakKind::Short,
                BreakKind::Long,
                BreakKind::Short,
            ]
        );
        assert_eq!(BreakKind::after_sessions(0, &settings), BreakKind::Short);
    }

    #[test]
    fn break_requests_resolve_kind_and_length() {
        let settings = pomodoro();
        assert_eq!(
            BreakKind::resolve(Some(15), None, 1, &settings),
            (BreakKind::Long, 15)
        );
        assert_eq!(
            BreakKind::resolve(Some(5), None, 4, &settings),
            (BreakKind::Short, 5)
        );
        assert_eq!(
            BreakKind::resolve(Some(7), None, 0, &settings),
            (BreakKind::Short, 7)
        );
        assert_eq!(
            BreakKind::resolve(None, Some(BreakKind::Long), 0, &settings),
            (BreakKind::Long, 15)
        );
        assert_eq!(
            BreakKind::resolve(None, None, 8, &settings),
            (BreakKind::Long, 15)
        );
        assert_eq!(
            BreakKind::resolve(Some(0), None, 0, &settings),
            (BreakKind::Short, 1)
        );
    }

    #[test]
    fn focus_completion_auto_starts_matching_break() {
        let settings = pomodoro();
        let mut timer = TimerState::new(&settings);
        timer.session_count = 3;
        timer.start_focus(T0, &settings);

        let done = T0 + 1_500_000;
        let completion = timer.complete(done, &settings);
        assert_eq!(completion.finished, Phase::Focus);
        assert_eq!(completion.minutes, 25);
        assert_eq!(completion.auto_started, Some(Phase::LongBreak));
        assert_eq!(timer.phase, Phase::LongBreak);
        assert_eq!(timer.end_timestamp_ms, Some(done + 900_000));

        timer.start_focus(done, &settings);
        let completion = timer.complete(done + 1_500_000, &settings);
        assert_eq!(completion.session_count, 5);
        assert_eq!(timer.phase, Phase::Break);
    }

    #[test]
    fn break_completion_waits_unless_auto_start() {
        let settings = pomodoro();
        let mut timer = TimerState::new(&settings);
        timer.start_break(T0, BreakKind::Short, 5);

        let completion = timer.complete(T0 + 300_000, &settings);
        assert_eq!(completion.auto_started, None);
        assert_eq!(completion.session_count, 0);
        assert_eq!(timer.phase, Phase::Break);
        assert!(!timer.running);

        let eager = Settings {
            auto_start_next_session: true,
            ..settings
        };
        timer.start_break(T0, BreakKind::Short, 5);
        let completion = timer.complete(T0 + 300_000, &eager);
        assert_eq!(completion.auto_started, Some(Phase::Focus));
        assert!(timer.running);
    }

    #[test]
    fn malformed_record_is_corrected() {
        let settings = pomodoro();
        let record = PersistedTimerState {
            time_left: Some(-40),
            is_break: Some(true),
            session_count: Some(-2),
            ..PersistedTimerState::default()
        };
        let timer = TimerState::from_persisted(&record, &settings, T0);
        assert_eq!(timer.phase, Phase::Break);
        assert_eq!(timer.remaining_seconds, 1500);
        assert_eq!(timer.session_count, 0);
        assert!(!timer.running);
    }

    #[test]
    fn running_record_without_deadline_resumes_from_time_left() {
        let settings = pomodoro();
        let record = PersistedTimerState {
            time_left: Some(600),
            is_running: Some(true),
            ..PersistedTimerState::default()
        };
        let timer = TimerState::from_persisted(&record, &settings, T0);
        assert_eq!(timer.phase, Phase::Focus);
        assert_eq!(timer.end_timestamp_ms, Some(T0 + 600_000));
    }

    #[test]
    fn huge_time_left_falls_back_to_work_length() {
        let settings = pomodoro();
        let record = PersistedTimerState {
            time_left: Some(100_000_000_000_000_000),
            is_running: Some(true),
            ..PersistedTimerState::default()
        };
        let timer = TimerState::from_persisted(&record, &settings, T0);
        assert_eq!(timer.remaining_seconds, 1500);
        assert_eq!(timer.end_timestamp_ms, Some(T0 + 1_500_000));
    }

    #[test]
    fn extreme_deadlines_do_not_overflow() {
        let settings = pomodoro();
        let ancient = PersistedTimerState {
            is_running: Some(true),
            end_time: Some(i64::MIN),
            ..PersistedTimerState::default()
        };
        let timer = TimerState::from_persisted(&ancient, &settings, T0);
        assert_eq!(timer.remaining_at(T0), 0);
        assert!(timer.is_expired(T0));

        let distant = PersistedTimerState {
            is_running: Some(true),
            time_left: Some(60),
            end_time: Some(i64::MAX),
            ..PersistedTimerState::default()
        };
        let timer = TimerState::from_persisted(&distant, &settings, T0);
        assert_eq!(timer.end_timestamp_ms, Some(T0 + 60_000));

        let mut paused = TimerState::new(&settings);
        paused.phase = Phase::Focus;
        paused.remaining_seconds = u64::MAX;
        assert!(paused.resume(i64::MAX - 5));
        assert_eq!(paused.end_timestamp_ms, Some(i64::MAX));
        assert_eq!(paused.remaining_at(i64::MIN), i64::MAX as u64 / 1000 + 1);
    }

    #[test]
    fn session_count_stops_at_its_limit() {
        let settings = Settings {
            auto_start_breaks: false,
            ..pomodoro()
        };
        let mut timer = TimerState::new(&settings);
        timer.session_count = u32::MAX;
        timer.start_focus(T0, &settings);
        assert_eq!(timer.complete(T0 + 1_500_000, &settings).session_count, u32::MAX);
    }

    #[test]
    fn persisted_record_restores_the_same_run() {
        let settings = pomodoro();
        let mut timer = TimerState::new(&settings);
        timer.session_count = 2;
        timer.start_break(T0, BreakKind::Long, 15);

        let record = timer.to_persisted(T0 + 5_000);
        assert_eq!(record.time_left, Some(895));
        assert_eq!(record.is_break, Some(true));

        let restored = TimerState::from_persisted(&record, &settings, T0 + 5_000);
        assert_eq!(restored, TimerState {
            remaining_seconds: 895,
            ..timer
        });
    }
}
