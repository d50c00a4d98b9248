use thiserror::Error;

use crate::types::LevelId;

/// A payload that was rejected before any storage access.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Field '{0}' must not be blank")]
    BlankField(&'static str),

    #[error("Level dimensions must be positive (got {rows}x{columns})")]
    ZeroDimension { rows: u8, columns: u8 },

    #[error("Starting balls ({starting}) and ending balls ({ending}) differ in count")]
    BallCountMismatch { starting: usize, ending: usize },

    #[error("Level {level_id}: failures ({failures}) exceed attempts ({attempts})")]
    FailuresExceedAttempts {
        level_id: LevelId,
        attempts: u16,
        failures: u16,
    },

    #[error("Unknown level: {0}")]
    UnknownLevel(LevelId),

    #[error("Malformed identifier: {0}")]
    MalformedId(String),
}
