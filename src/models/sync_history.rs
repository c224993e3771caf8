//! Append-only sync history log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome status of a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Failed,
    Success,
    Partial,
}

impl SyncStatus {
    /// Numeric status code persisted with the history entry.
    pub fn code(&self) -> i16 {
        match self {
            Self::Failed => 0,
            Self::Success => 1,
            Self::Partial => 2,
        }
    }

    pub fn from_code(code: i16) -> Self {
        match code {
            1 => Self::Success,
            2 => Self::Partial,
            _ => Self::Failed,
        }
    }
}

/// One appended history row per completed (or failed) sync run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncHistoryEntry {
    pub id: i64,
    pub interface_id: i64,
    pub tstamp: DateTime<Utc>,
    /// Source file as selected by the operator (the archive, not the
    /// extracted member).
    pub source: String,
    pub username: String,
    pub text: String,
    pub status: SyncStatus,
}

/// Data for appending a history entry.
#[derive(Debug, Clone, Serialize)]
pub struct NewSyncHistoryEntry {
    pub interface_id: i64,
    pub source: String,
    pub username: String,
    pub text: String,
    pub status: SyncStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_round_trip() {
        assert_eq!(SyncStatus::Success.code(), 1);
        assert_eq!(SyncStatus::Partial.code(), 2);
        assert_eq!(SyncStatus::Failed.code(), 0);
        assert_eq!(SyncStatus::from_code(1), SyncStatus::Success);
        assert_eq!(SyncStatus::from_code(2), SyncStatus::Partial);
        assert_eq!(SyncStatus::from_code(99), SyncStatus::Failed);
    }
}
