//! Persistent key/value storage
//!
//! The timer authority keeps its durable state in a small asynchronous
//! key/value store. Every call may fail or stall; callers treat failures as
//! non-fatal and keep the in-memory state as the live truth.

pub mod file;
pub mod memory;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::StoreError;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

/// A set of keyed JSON values read from or written to the store
pub type Record = Map<String, Value>;

pub const SETTINGS_KEY: &str = "settings";
pub const TIMER_STATE_KEY: &str = "timerState";
pub const STATS_KEY: &str = "stats";

/// Asynchronous string-keyed store
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetch the requested keys; absent keys are simply missing from the result
    async fn get(&self, keys: &[&str]) -> Result<Record, StoreError>;

    /// Merge the given keys into the store
    async fn set(&self, record: Record) -> Result<(), StoreError>;
}

/// Keep only the requested keys of a full record
pub(crate) fn select(all: &Record, keys: &[&str]) -> Record {
    keys.iter()
        .filter_map(|key| all.get(*key).map(|value| (key.to_string(), value.clone())))
        .collect()
}
