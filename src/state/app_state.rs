//! The timer authority
//!
//! [`AppState`] owns the single authoritative timer, its settings and the
//! focus statistics. Every mutation happens inside one short critical section
//! so a tick can never interleave with a command; side effects (broadcast,
//! focus protection, notification, persistence) run after the lock is released
//! and are all best-effort.

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    time::{Duration, Instant},
};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::{
    sync::{broadcast, watch},
    task::JoinHandle,
};
use tracing::{debug, info, trace, warn};

use super::{
    stats::StatsRecord,
    timer_state::{BreakKind, Completion, PersistedTimerState, Phase, TickOutcome, TimerState},
    Settings,
};
use crate::{
    clock::{Clock, SystemClock},
    protocol::{Broadcast, Command, Reply, SessionSummary, TimerSnapshot},
    services::{FocusGuard, LogNotifier, NoopFocusGuard, NotificationSink},
    store::{KeyValueStore, Record, SETTINGS_KEY, STATS_KEY, TIMER_STATE_KEY},
    tasks::{spawn_countdown, spawn_focus_protection, spawn_streak_check},
};

const BROADCAST_CAPACITY: usize = 64;

/// Everything guarded by the authority lock
#[derive(Debug)]
struct Core {
    timer: TimerState,
    settings: Settings,
    stats: StatsRecord,
}

/// A phase that just finished, with the stats it produced
#[derive(Debug)]
struct Finished {
    completion: Completion,
    stats: Option<StatsRecord>,
}

/// Timer authority service
pub struct AppState {
    core: Mutex<Core>,
    store: Arc<dyn KeyValueStore>,
    notifier: Arc<dyn NotificationSink>,
    focus_guard: Arc<dyn FocusGuard>,
    clock: Arc<dyn Clock>,
    tick_interval: Duration,
    streak_interval: Duration,
    /// Broadcast channel to every listening view; usually nobody listens
    events_tx: broadcast::Sender<Broadcast>,
    /// Desired focus protection state, applied by the focus protection worker
    protection_tx: watch::Sender<bool>,
    countdown: Mutex<Option<JoinHandle<()>>>,
    live_countdowns: Arc<AtomicUsize>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    /// Serializes store writes so the freshest state is always written last
    save_lock: tokio::sync::Mutex<()>,
    start_time: Instant,
    last_action: Mutex<Option<(String, DateTime<Utc>)>>,
}

impl AppState {
    pub fn builder(store: Arc<dyn KeyValueStore>) -> AppStateBuilder {
        AppStateBuilder::new(store)
    }

    fn core(&self) -> MutexGuard<'_, Core> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn focus_guard(&self) -> &Arc<dyn FocusGuard> {
        &self.focus_guard
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// Current view of the timer, remaining time derived at this instant
    pub fn snapshot(&self) -> TimerSnapshot {
        let now = self.clock.now_ms();
        Self::snapshot_of(&self.core(), now)
    }

    fn snapshot_of(core: &Core, now_ms: i64) -> TimerSnapshot {
        TimerSnapshot {
            time_left: core.timer.remaining_at(now_ms),
            is_running: core.timer.running,
            is_break: core.timer.phase.is_break(),
            phase: core.timer.phase,
            session_count: core.timer.session_count,
            settings: core.settings.clone(),
        }
    }

    pub fn timer(&self) -> TimerState {
        self.core().timer.clone()
    }

    pub fn settings(&self) -> Settings {
        self.core().settings.clone()
    }

    pub fn stats(&self) -> StatsRecord {
        self.core().stats.clone()
    }

    /// Listen for broadcasts. Dropping the receiver is always fine.
    pub fn subscribe(&self) -> broadcast::Receiver<Broadcast> {
        self.events_tx.subscribe()
    }

    pub(crate) fn protection_receiver(&self) -> watch::Receiver<bool> {
        self.protection_tx.subscribe()
    }

    /// Number of countdown loops currently alive
    pub fn live_countdowns(&self) -> usize {
        self.live_countdowns.load(Ordering::SeqCst)
    }

    pub(crate) fn countdown_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.live_countdowns)
    }

    pub fn last_action(&self) -> Option<(String, DateTime<Utc>)> {
        self.last_action
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Calculate uptime as a formatted string
    pub fn uptime(&self) -> String {
        let duration = self.start_time.elapsed();
        let hours = duration.as_secs() / 3600;
        let minutes = (duration.as_secs() % 3600) / 60;
        let seconds = duration.as_secs() % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Dispatch a command message
    pub async fn handle(self: &Arc<Self>, command: Command) -> Reply {
        if command.is_mutation() {
            *self
                .last_action
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = Some((command.name().to_string(), Utc::now()));
        }

        match command {
            Command::StartTimer => self.start_focus().await,
            Command::StartBreak {
                break_minutes,
                kind,
            } => self.start_break(break_minutes, kind).await,
            Command::PauseTimer => self.pause().await,
            Command::ResumeTimer => self.resume().await,
            Command::ResetTimer => self.reset().await,
            Command::GetTimerState => return Reply::State(self.snapshot()),
            Command::UpdateSettings { settings } => self.update_settings(settings).await,
        }
        Reply::ok()
    }

    pub async fn start_focus(self: &Arc<Self>) {
        let now = self.clock.now_ms();
        {
            let mut slot = self.countdown_slot();
            {
                let mut core = self.core();
                let Core {
                    timer, settings, ..
                } = &mut *core;
                timer.start_focus(now, settings);
                info!("Starting focus session ({} min)", settings.work_minutes);
            }
            self.replace_countdown(&mut slot);
        }
        self.after_change(None, false).await;
    }

    /// Start a break; see [`BreakKind::resolve`] for how the request is read
    pub async fn start_break(self: &Arc<Self>, minutes: Option<u32>, kind: Option<BreakKind>) {
        let now = self.clock.now_ms();
        {
            let mut slot = self.countdown_slot();
            {
                let mut core = self.core();
                let (kind, minutes) =
                    BreakKind::resolve(minutes, kind, core.timer.session_count, &core.settings);
                core.timer.start_break(now, kind, minutes);
                info!("Starting {:?} break ({} min)", kind, minutes);
            }
            self.replace_countdown(&mut slot);
        }
        self.after_change(None, false).await;
    }

    pub async fn pause(self: &Arc<Self>) {
        let now = self.clock.now_ms();
        {
            let mut slot = self.countdown_slot();
            if !self.core().timer.pause(now) {
                debug!("Pause ignored, timer not running");
                return;
            }
            clear_countdown(&mut slot);
        }
        info!("Timer paused");
        self.after_change(None, false).await;
    }

    pub async fn resume(self: &Arc<Self>) {
        let now = self.clock.now_ms();
        {
            let mut slot = self.countdown_slot();
            if !self.core().timer.resume(now) {
                debug!("Resume ignored, timer running or finished");
                return;
            }
            self.replace_countdown(&mut slot);
        }
        info!("Timer resumed");
        self.after_change(None, false).await;
    }

    pub async fn reset(self: &Arc<Self>) {
        {
            let mut slot = self.countdown_slot();
            {
                let mut core = self.core();
                let Core {
                    timer, settings, ..
                } = &mut *core;
                timer.reset(settings);
            }
            clear_countdown(&mut slot);
        }
        info!("Timer reset");
        self.after_change(None, false).await;
    }

    /// Replace the live settings; a stopped timer is reloaded with the new lengths
    pub async fn update_settings(self: &Arc<Self>, settings: Settings) {
        let settings = settings.sanitized();
        {
            let mut core = self.core();
            core.timer.reload(&settings);
            core.settings = settings;
        }
        info!("Settings updated");
        self.after_change(None, true).await;
    }

    /// Advance the countdown from the wall clock. Returns whether it is still running.
    pub async fn tick(self: &Arc<Self>) -> bool {
        let now = self.clock.now_ms();
        let finished = {
            let mut core = self.core();
            match core.timer.tick(now) {
                TickOutcome::Stopped => return false,
                TickOutcome::Running { remaining_seconds } => {
                    trace!("Tick: {}s left", remaining_seconds);
                    None
                }
                TickOutcome::Expired => Some(self.finish_phase(&mut core, now)),
            }
        };

        self.after_change(finished, false).await;
        self.core().timer.running
    }

    /// Close out the current phase: stats, counters and auto-advance in one step
    fn finish_phase(&self, core: &mut Core, now_ms: i64) -> Finished {
        let Core {
            timer,
            settings,
            stats,
        } = core;
        let completion = timer.complete(now_ms, settings);
        let stats = (completion.finished == Phase::Focus).then(|| {
            stats.record_focus(self.clock.today(), completion.minutes);
            stats.clone()
        });
        info!(
            "{} complete after {} min, {} session(s) done",
            completion.finished.label(),
            completion.minutes,
            completion.session_count
        );
        if let Some(next) = completion.auto_started {
            info!("Auto-starting {}", next.label());
        }
        Finished { completion, stats }
    }

    /// Broadcast, update focus protection and persist after a mutation
    async fn after_change(&self, finished: Option<Finished>, settings_changed: bool) {
        if let Some(finished) = finished {
            let Completion {
                finished: phase,
                minutes,
                session_count,
                ..
            } = finished.completion;
            if phase.is_break() {
                self.notifier.notify("Break Complete!", "Break time is over!");
            } else {
                self.notifier
                    .notify("Focus Session Complete!", "Great work! Time for a break.");
            }
            self.broadcast(Broadcast::SessionComplete(SessionSummary {
                duration: minutes,
                is_break: phase.is_break(),
                session_count,
                stats: finished.stats,
            }));
        }

        self.broadcast(Broadcast::TimerUpdate(self.snapshot()));
        self.sync_protection();
        self.persist(settings_changed).await;
    }

    /// Push a message to every listener.
    ///
    /// Best-effort by contract: with no listener attached the message is
    /// dropped silently. This never fails and never touches timer state.
    pub fn broadcast(&self, message: Broadcast) {
        if self.events_tx.send(message).is_err() {
            trace!("No listeners for broadcast");
        }
    }

    fn sync_protection(&self) {
        let desired = {
            let core = self.core();
            core.timer.running
                && core.timer.phase == Phase::Focus
                && core.settings.focus_protection_enabled
        };
        self.protection_tx.send_if_modified(|current| {
            if *current == desired {
                return false;
            }
            *current = desired;
            true
        });
    }

    /// Write the current timer and stats (and settings if asked) to the store.
    /// Failures are logged; in-memory state stays the truth.
    async fn persist(&self, include_settings: bool) {
        let _guard = self.save_lock.lock().await;
        let record = {
            let now = self.clock.now_ms();
            let core = self.core();
            let mut record = Record::new();
            record.insert(
                TIMER_STATE_KEY.to_string(),
                to_value(&core.timer.to_persisted(now)),
            );
            record.insert(STATS_KEY.to_string(), to_value(&core.stats));
            if include_settings {
                record.insert(SETTINGS_KEY.to_string(), to_value(&core.settings));
            }
            record
        };

        if let Err(e) = self.store.set(record).await {
            warn!("Failed to persist timer state: {}", e);
        }
    }

    // ── Countdown control ────────────────────────────────────────────
    //
    // A command holds the countdown slot for its whole state change, so the
    // slot always matches the timer it left behind. Lock order: slot, then core.

    fn countdown_slot(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.countdown.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace any live countdown with a fresh one
    fn replace_countdown(self: &Arc<Self>, slot: &mut Option<JoinHandle<()>>) {
        clear_countdown(slot);
        *slot = Some(spawn_countdown(Arc::clone(self)));
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Load persisted state and reconcile it with the wall clock.
    ///
    /// A run whose deadline passed while the process was gone is completed
    /// exactly once (stats, notification, auto-advance) before anything else.
    /// A run still in the future resumes ticking against its old deadline.
    pub async fn restore(self: &Arc<Self>) {
        let record = match self
            .store
            .get(&[SETTINGS_KEY, TIMER_STATE_KEY, STATS_KEY])
            .await
        {
            Ok(record) => record,
            Err(e) => {
                warn!("Failed to load stored state, using defaults: {}", e);
                Record::new()
            }
        };

        let now = self.clock.now_ms();
        let today = self.clock.today();
        let stored_settings = decode::<Settings>(SETTINGS_KEY, record.get(SETTINGS_KEY));
        let stored_stats = decode::<StatsRecord>(STATS_KEY, record.get(STATS_KEY));
        let first_run = stored_settings.is_none();

        let settings = stored_settings.unwrap_or_default().sanitized();
        let timer = decode::<PersistedTimerState>(TIMER_STATE_KEY, record.get(TIMER_STATE_KEY))
            .map(|stored| TimerState::from_persisted(&stored, &settings, now))
            .unwrap_or_else(|| TimerState::new(&settings));

        let finished = {
            let mut slot = self.countdown_slot();
            let finished = {
                let mut core = self.core();
                core.stats = stored_stats.unwrap_or_else(|| StatsRecord::new(today));
                core.settings = settings;
                core.timer = timer;

                if core.timer.is_expired(now) {
                    info!("Session ended while the timer was not running, completing it now");
                    Some(self.finish_phase(&mut core, now))
                } else {
                    None
                }
            };

            let snapshot = self.snapshot();
            info!(
                "Restored timer: {} {}, {}s left, {} session(s)",
                snapshot.phase.label(),
                if snapshot.is_running { "running" } else { "stopped" },
                snapshot.time_left,
                snapshot.session_count
            );

            if snapshot.is_running {
                self.replace_countdown(&mut slot);
            } else {
                clear_countdown(&mut slot);
            }
            finished
        };
        self.after_change(finished, first_run).await;
    }

    /// Daily streak bookkeeping; a no-op after the first call of a day
    pub async fn check_streak(&self) -> bool {
        let today = self.clock.today();
        let changed = self.core().stats.roll_streak(today);
        if changed {
            info!("Streak is now {} day(s)", self.core().stats.streak_days);
            self.persist(false).await;
        }
        changed
    }

    /// Restore state and start the background workers
    pub async fn startup(self: &Arc<Self>) {
        let workers = vec![
            spawn_focus_protection(Arc::clone(self)),
            spawn_streak_check(Arc::clone(self), self.streak_interval),
        ];
        self.workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(workers);
        self.restore().await;
    }

    /// Stop all background work and flush state. A running timer stays
    /// running in the store and resumes on the next startup.
    pub async fn shutdown(&self) {
        clear_countdown(&mut self.countdown_slot());
        let workers: Vec<_> = self
            .workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for worker in workers {
            worker.abort();
        }
        self.persist(false).await;
        info!("Timer authority stopped");
    }
}

fn clear_countdown(slot: &mut Option<JoinHandle<()>>) {
    if let Some(previous) = slot.take() {
        previous.abort();
    }
}

fn to_value<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

fn decode<T: DeserializeOwned>(key: &str, value: Option<&Value>) -> Option<T> {
    let value = value?;
    match serde_json::from_value(value.clone()) {
        Ok(decoded) => Some(decoded),
        Err(e) => {
            warn!("Ignoring malformed stored '{}': {}", key, e);
            None
        }
    }
}

/// Builder for [`AppState`]; only the store is required
pub struct AppStateBuilder {
    store: Arc<dyn KeyValueStore>,
    notifier: Arc<dyn NotificationSink>,
    focus_guard: Arc<dyn FocusGuard>,
    clock: Arc<dyn Clock>,
    tick_interval: Duration,
    streak_interval: Duration,
}

impl AppStateBuilder {
    fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            notifier: Arc::new(LogNotifier),
            focus_guard: Arc::new(NoopFocusGuard),
            clock: Arc::new(SystemClock),
            tick_interval: Duration::from_secs(1),
            streak_interval: Duration::from_secs(60 * 60),
        }
    }

    pub fn notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn focus_guard(mut self, focus_guard: Arc<dyn FocusGuard>) -> Self {
        self.focus_guard = focus_guard;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    pub fn streak_interval(mut self, interval: Duration) -> Self {
        self.streak_interval = interval;
        self
    }

    pub fn build(self) -> Arc<AppState> {
        let settings = Settings::default();
        let today = self.clock.today();
        let (events_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        let (protection_tx, _) = watch::channel(false);

        Arc::new(AppState {
            core: Mutex::new(Core {
                timer: TimerState::new(&settings),
                stats: StatsRecord::new(today),
                settings,
            }),
            store: self.store,
            notifier: self.notifier,
            focus_guard: self.focus_guard,
            clock: self.clock,
            tick_interval: self.tick_interval,
            streak_interval: self.streak_interval,
            events_tx,
            protection_tx,
            countdown: Mutex::new(None),
            live_countdowns: Arc::new(AtomicUsize::new(0)),
            workers: Mutex::new(Vec::new()),
            save_lock: tokio::sync::Mutex::new(()),
            start_time: Instant::now(),
            last_action: Mutex::new(None),
        })
    }
}
