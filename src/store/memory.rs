//! In-memory store

use std::sync::Mutex;

use async_trait::async_trait;

use super::{select, KeyValueStore, Record};
use crate::error::StoreError;

/// Store that lives for the process only
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: Mutex<Record>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with existing contents
    pub fn with_record(record: Record) -> Self {
        Self {
            data: Mutex::new(record),
        }
    }

    /// Copy of everything currently stored
    pub fn contents(&self) -> Record {
        self.data
            .lock()
            .map(|data| data.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, keys: &[&str]) -> Result<Record, StoreError> {
        let data = self
            .data
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(select(&data, keys))
    }

    async fn set(&self, record: Record) -> Result<(), StoreError> {
        let mut data = self
            .data
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        data.extend(record);
        Ok(())
    }
}
