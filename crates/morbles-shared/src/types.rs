use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Catalog-assigned level identifier.
pub type LevelId = u16;

/// Directory-assigned player identifier.
pub type PlayerId = u16;

// ---------------------------------------------------------------------------
// Level
// ---------------------------------------------------------------------------

/// A level description as stored in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Level {
    pub id: LevelId,
    pub name: String,
    pub hint: String,
    pub rows: u8,
    pub columns: u8,
    /// One character per ball slot.
    pub starting_balls: String,
    /// Same cardinality as `starting_balls`.
    pub ending_balls: String,
    /// Cell contents, row-major.
    pub map: String,
    /// Curated level as opposed to a player submission.
    pub is_official: bool,
}

impl Level {
    /// Attach a catalog id to a candidate level.
    pub fn from_new(id: LevelId, new: NewLevel) -> Self {
        Self {
            id,
            name: new.name,
            hint: new.hint,
            rows: new.rows,
            columns: new.columns,
            starting_balls: new.starting_balls,
            ending_balls: new.ending_balls,
            map: new.map,
            is_official: new.is_official,
        }
    }
}

/// A level payload without an identifier.
///
/// Used both for insertion (the catalog assigns the id) and for replacement
/// (the id comes from the request path). An `id` field present in the JSON is
/// ignored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NewLevel {
    pub name: String,
    #[serde(default)]
    pub hint: String,
    pub rows: u8,
    pub columns: u8,
    pub starting_balls: String,
    pub ending_balls: String,
    pub map: String,
    #[serde(default)]
    pub is_official: bool,
}

impl NewLevel {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::BlankField("name"));
        }
        if self.rows == 0 || self.columns == 0 {
            return Err(ValidationError::ZeroDimension {
                rows: self.rows,
                columns: self.columns,
            });
        }
        let starting = self.starting_balls.chars().count();
        let ending = self.ending_balls.chars().count();
        if starting != ending {
            return Err(ValidationError::BallCountMismatch { starting, ending });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Level status
// ---------------------------------------------------------------------------

/// A player's status on one level, as seen by clients.
///
/// `is_official` is copied from the catalog at read time and ignored on
/// write.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LevelStatus {
    pub level_id: LevelId,
    #[serde(default)]
    pub attempts: u16,
    #[serde(default)]
    pub failures: u16,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub is_official: bool,
}

impl LevelStatus {
    /// Placeholder for a level the player has never touched.
    pub fn untouched(level_id: LevelId, is_official: bool) -> Self {
        Self {
            level_id,
            attempts: 0,
            failures: 0,
            completed: false,
            is_official,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.failures > self.attempts {
            return Err(ValidationError::FailuresExceedAttempts {
                level_id: self.level_id,
                attempts: self.attempts,
                failures: self.failures,
            });
        }
        Ok(())
    }
}

/// A persisted `level_status` row, keyed by `(player_id, level_id)`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredLevelStatus {
    pub player_id: PlayerId,
    pub level_id: LevelId,
    pub attempts: u16,
    pub failures: u16,
    pub completed: bool,
}

impl StoredLevelStatus {
    pub fn from_view(player_id: PlayerId, status: &LevelStatus) -> Self {
        Self {
            player_id,
            level_id: status.level_id,
            attempts: status.attempts,
            failures: status.failures,
            completed: status.completed,
        }
    }
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// A `players` row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerRecord {
    pub id: PlayerId,
    pub name: String,
    pub admin: bool,
}

/// A player together with the reconciled status of every catalog level.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub admin: bool,
    pub level_statuses: Vec<LevelStatus>,
}

impl Player {
    pub fn new(record: PlayerRecord, level_statuses: Vec<LevelStatus>) -> Self {
        Self {
            id: record.id,
            name: record.name,
            admin: record.admin,
            level_statuses,
        }
    }
}

/// Body of a progress write: a (possibly partial) player view.
///
/// Only `level_statuses` is acted on; `name` and `admin` are never written
/// through this path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSubmission {
    #[serde(default)]
    pub id: Option<PlayerId>,
    #[serde(default)]
    pub level_statuses: Vec<LevelStatus>,
}
