//! API response structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub uptime: String,
    pub last_action: Option<String>,
    pub last_action_time: Option<DateTime<Utc>>,
}

impl HealthResponse {
    /// Create a new health response
    pub fn ok(uptime: String, last_action: Option<(String, DateTime<Utc>)>) -> Self {
        let (last_action, last_action_time) = match last_action {
            Some((action, at)) => (Some(action), Some(at)),
            None => (None, None),
        };
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime,
            last_action,
            last_action_time,
        }
    }
}
