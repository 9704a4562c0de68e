use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Running,
    /// Stopped at the page budget with more pages upstream.
    Partial,
    Done,
    Error,
}

impl SyncStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SyncStatus::Running => "running",
            SyncStatus::Partial => "partial",
            SyncStatus::Done => "done",
            SyncStatus::Error => "error",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "running" => Some(SyncStatus::Running),
            "partial" => Some(SyncStatus::Partial),
            "done" => Some(SyncStatus::Done),
            "error" => Some(SyncStatus::Error),
            _ => None,
        }
    }

    /// Whether a later run should pick up from the stored cursor.
    #[must_use]
    pub fn is_resumable(self) -> bool {
        matches!(
            self,
            SyncStatus::Running | SyncStatus::Partial | SyncStatus::Error
        )
    }
}

/// Per-tenant pagination checkpoint, rewritten at every page boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    pub cursor: Option<String>,
    pub status: SyncStatus,
    pub last_error: Option<String>,
    /// Newest order `created_at` stored by a sync run.
    pub watermark: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl SyncState {
    #[must_use]
    pub fn new(cursor: Option<String>, status: SyncStatus) -> Self {
        Self {
            cursor,
            status,
            last_error: None,
            watermark: None,
            updated_at: None,
        }
    }

    #[must_use]
    pub fn failed(cursor: Option<String>, message: impl Into<String>) -> Self {
        Self {
            cursor,
            status: SyncStatus::Error,
            last_error: Some(message.into()),
            watermark: None,
            updated_at: None,
        }
    }

    #[must_use]
    pub fn with_watermark(mut self, watermark: Option<DateTime<Utc>>) -> Self {
        self.watermark = watermark;
        self
    }

    /// Start date for an incremental run: `lookback` before the watermark,
    /// once the previous walk finished. `None` means walk from the beginning.
    #[must_use]
    pub fn incremental_start(&self, lookback: chrono::Duration) -> Option<DateTime<Utc>> {
        if self.status != SyncStatus::Done {
            return None;
        }
        self.watermark.map(|w| w - lookback)
    }
}
