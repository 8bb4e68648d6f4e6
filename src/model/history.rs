//! Per-sender contact history, read-only to the pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Aggregate of a sender's earlier messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SenderHistory {
    /// Messages from this sender received before the current one.
    pub prior_count: u32,
    /// When the most recent of those arrived.
    pub last_contact: Option<DateTime<Utc>>,
}

impl SenderHistory {
    pub fn new(prior_count: u32, last_contact: Option<DateTime<Utc>>) -> Self {
        Self {
            prior_count,
            last_contact,
        }
    }

    /// First contact: no earlier messages.
    pub fn first_contact() -> Self {
        Self::default()
    }

    pub fn is_repeat(&self) -> bool {
        self.prior_count > 0
    }
}
