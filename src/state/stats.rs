//! Focus statistics and streak bookkeeping

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

const DATE_KEY_FORMAT: &str = "%Y-%m-%d";

/// Day bucket key, e.g. `2026-10-19`
pub fn date_key(date: NaiveDate) -> String {
    date.format(DATE_KEY_FORMAT).to_string()
}

fn parse_date_key(key: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(key, DATE_KEY_FORMAT).ok()
}

/// Persisted statistics updated on focus completion and by the streak check
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StatsRecord {
    #[serde(rename = "focusTime")]
    pub focus_minutes_by_day: BTreeMap<String, u32>,
    pub completed_sessions: u32,
    #[serde(rename = "streak")]
    pub streak_days: u32,
    #[serde(rename = "lastActiveDate")]
    pub last_active_date_key: Option<String>,
}

impl StatsRecord {
    /// Fresh record for a first run on `today`
    pub fn new(today: NaiveDate) -> Self {
        Self {
            last_active_date_key: Some(date_key(today)),
            ..Self::default()
        }
    }

    /// Add a finished focus session to today's bucket
    pub fn record_focus(&mut self, today: NaiveDate, minutes: u32) {
        let bucket = self
            .focus_minutes_by_day
            .entry(date_key(today))
            .or_insert(0);
        *bucket = bucket.saturating_add(minutes);
        self.completed_sessions = self.completed_sessions.saturating_add(1);
    }

    pub fn minutes_on(&self, day: NaiveDate) -> u32 {
        self.focus_minutes_by_day
            .get(&date_key(day))
            .copied()
            .unwrap_or(0)
    }

    /// Advance the day streak. Returns true if the record changed.
    ///
    /// Only the first call on a new day does anything: yesterday extends the
    /// streak, anything older (or unreadable) restarts it at one.
    pub fn roll_streak(&mut self, today: NaiveDate) -> bool {
        let today_key = date_key(today);
        match self.last_active_date_key.as_deref() {
            Some(key) if key == today_key => return false,
            Some(key) => {
                let last = parse_date_key(key);
                if last.is_some() && last == today.pred_opt() {
                    self.streak_days = self.streak_days.saturating_add(1);
                } else {
                    self.streak_days = 1;
                }
            }
            None => {}
        }

        debug!("Streak rolled to {} day(s) on {}", self.streak_days, today_key);
        self.last_active_date_key = Some(today_key);
        true
    }
}
