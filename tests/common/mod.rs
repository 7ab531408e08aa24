#![allow(dead_code)]

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::json;

use focus_keeper::{
    error::StoreError,
    protocol::Broadcast,
    services::{FocusGuard, NotificationSink},
    state::{AppState, Settings},
    store::{KeyValueStore, MemoryStore, Record},
    ManualClock,
};

pub fn start_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 1, 5).unwrap()
}

/// Classic 25/5/15 cadence with four sessions per long break
pub fn pomodoro(auto_start_breaks: bool, auto_start_next_session: bool) -> Settings {
    Settings {
        work_minutes: 25,
        break_minutes: 5,
        long_break_minutes: 15,
        sessions_before_long_break: 4,
        auto_start_breaks,
        auto_start_next_session,
        ..Settings::default()
    }
}

pub fn settings_record(settings: &Settings) -> Record {
    let mut record = Record::new();
    record.insert("settings".into(), json!(settings));
    record
}

#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn titles(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .map(|(title, _)| title.clone())
            .collect()
    }

    pub fn count(&self) -> usize {
        self.messages.lock().unwrap().len()
    }
}

impl NotificationSink for RecordingNotifier {
    fn notify(&self, title: &str, message: &str) {
        self.messages
            .lock()
            .unwrap()
            .push((title.to_string(), message.to_string()));
    }
}

/// Remembers every engage (true) / release (false) call
#[derive(Default)]
pub struct RecordingGuard {
    calls: Mutex<Vec<bool>>,
}

impl RecordingGuard {
    pub fn calls(&self) -> Vec<bool> {
        self.calls.lock().unwrap().clone()
    }

    pub fn engaged(&self) -> bool {
        self.calls().last().copied().unwrap_or(false)
    }
}

#[async_trait]
impl FocusGuard for RecordingGuard {
    async fn engage(&self) -> Result<(), String> {
        self.calls.lock().unwrap().push(true);
        Ok(())
    }

    async fn release(&self) -> Result<(), String> {
        self.calls.lock().unwrap().push(false);
        Ok(())
    }
}

/// Store whose every call fails
pub struct FailingStore;

#[async_trait]
impl KeyValueStore for FailingStore {
    async fn get(&self, _keys: &[&str]) -> Result<Record, StoreError> {
        Err(StoreError::Unavailable("storage quota exceeded".into()))
    }

    async fn set(&self, _record: Record) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("storage quota exceeded".into()))
    }
}

pub struct Harness {
    pub state: Arc<AppState>,
    pub clock: Arc<ManualClock>,
    pub store: Arc<MemoryStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub guard: Arc<RecordingGuard>,
}

impl Harness {
    /// Authority over an in-memory store holding `record`. The tick period is
    /// long enough that tests drive every tick themselves.
    pub fn with_record(record: Record) -> Self {
        Self::build(Arc::new(MemoryStore::with_record(record)), Arc::new(ManualClock::at_date(start_day())))
    }

    pub fn with_settings(settings: &Settings) -> Self {
        Self::with_record(settings_record(settings))
    }

    /// Second authority over the same store and clock, as after a process restart
    pub fn restarted(&self) -> Self {
        Self::build(Arc::clone(&self.store), Arc::clone(&self.clock))
    }

    fn build(store: Arc<MemoryStore>, clock: Arc<ManualClock>) -> Self {
        let notifier = Arc::new(RecordingNotifier::default());
        let guard = Arc::new(RecordingGuard::default());
        let state = AppState::builder(store.clone())
            .clock(clock.clone())
            .notifier(notifier.clone())
            .focus_guard(guard.clone())
            .tick_interval(Duration::from_secs(3600))
            .streak_interval(Duration::from_secs(24 * 3600))
            .build();
        Self {
            state,
            clock,
            store,
            notifier,
            guard,
        }
    }

    pub fn stored_timer(&self) -> serde_json::Value {
        self.store.contents()["timerState"].clone()
    }
}

/// Let spawned tasks run (and aborted ones wind down)
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
    tokio::time::sleep(Duration::from_millis(25)).await;
}

pub fn drain(rx: &mut tokio::sync::broadcast::Receiver<Broadcast>) -> Vec<Broadcast> {
    let mut messages = Vec::new();
    while let Ok(message) = rx.try_recv() {
        messages.push(message);
    }
    messages
}

pub fn completions(messages: &[Broadcast]) -> usize {
    messages
        .iter()
        .filter(|message| matches!(message, Broadcast::SessionComplete(_)))
        .count()
}
