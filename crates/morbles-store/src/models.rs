//! Row and report types produced by the store.
//!
//! The domain rows themselves (`Level`, `PlayerRecord`, `StoredLevelStatus`)
//! live in `morbles-shared` so the reconciler can use them without a storage
//! dependency; they are re-exported here for convenience.

use serde::{Deserialize, Serialize};

pub use morbles_shared::types::{
    Level, LevelId, NewLevel, PlayerId, PlayerRecord, StoredLevelStatus,
};

// ---------------------------------------------------------------------------
// Progress write report
// ---------------------------------------------------------------------------

/// What happened to one submitted level status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WriteOutcome {
    /// An existing row was overwritten.
    Updated,
    /// No row existed; one was inserted.
    Inserted,
    /// The update matched nothing and the insert failed.
    Conflict(String),
    /// Written inside a transaction that was later rolled back.
    RolledBack,
}

impl WriteOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, WriteOutcome::Updated | WriteOutcome::Inserted)
    }
}

/// Outcome for a single `(player, level)` entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EntryOutcome {
    pub level_id: LevelId,
    pub outcome: WriteOutcome,
}

/// Per-entry result of a progress submission, in submission order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProgressReport {
    pub entries: Vec<EntryOutcome>,
}

impl ProgressReport {
    /// `true` when every entry was applied.
    pub fn is_complete(&self) -> bool {
        self.entries.iter().all(|e| e.outcome.is_applied())
    }

    pub fn conflicts(&self) -> impl Iterator<Item = &EntryOutcome> {
        self.entries
            .iter()
            .filter(|e| matches!(e.outcome, WriteOutcome::Conflict(_)))
    }
}

/// How a multi-entry submission is written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WriteMode {
    /// Each entry is written on its own; a submission can partially succeed.
    #[default]
    PerEntry,
    /// All entries in one transaction; any conflict rolls back everything.
    Atomic,
}
