//! Progress reconciliation.
//!
//! A player's stored `level_status` rows only cover levels they have played.
//! Clients always receive one entry per catalog level, so the stored rows are
//! merged with the catalog here. The catalog is authoritative for which
//! levels exist and for their `is_official` flag.

use std::collections::{HashMap, HashSet};

use crate::error::ValidationError;
use crate::types::{Level, LevelId, LevelStatus, PlayerId, StoredLevelStatus};

/// Build the complete status view of `player_id` against `catalog`.
///
/// - one entry per catalog level, in catalog order;
/// - stored counts and `completed` are taken verbatim;
/// - `is_official` always comes from the catalog;
/// - levels without a stored row get an untouched placeholder;
/// - rows for levels missing from the catalog, or for other players, are
///   dropped.
pub fn reconcile(
    player_id: PlayerId,
    stored: &[StoredLevelStatus],
    catalog: &[Level],
) -> Vec<LevelStatus> {
    let by_level: HashMap<LevelId, &StoredLevelStatus> = stored
        .iter()
        .filter(|row| row.player_id == player_id)
        .map(|row| (row.level_id, row))
        .collect();

    catalog
        .iter()
        .map(|level| match by_level.get(&level.id) {
            Some(row) => LevelStatus {
                level_id: level.id,
                attempts: row.attempts,
                failures: row.failures,
                completed: row.completed,
                is_official: level.is_official,
            },
            None => LevelStatus::untouched(level.id, level.is_official),
        })
        .collect()
}

/// Check a submitted batch of statuses before it reaches storage.
///
/// Every entry must satisfy [`LevelStatus::validate`] and reference a level
/// present in `catalog`.
pub fn validate_submission(
    updates: &[LevelStatus],
    catalog: &[Level],
) -> Result<(), ValidationError> {
    let known: HashSet<LevelId> = catalog.iter().map(|level| level.id).collect();
    for update in updates {
        if !known.contains(&update.level_id) {
            return Err(ValidationError::UnknownLevel(update.level_id));
        }
        update.validate()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(id: LevelId, is_official: bool) -> Level {
        Level {
            id,
            name: format!("level {id}"),
            hint: String::new(),
            rows: 3,
            columns: 3,
            starting_balls: "r".into(),
            ending_balls: "r".into(),
            map: ".........".into(),
            is_official,
        }
    }

    fn row(
        player_id: PlayerId,
        level_id: LevelId,
        attempts: u16,
        completed: bool,
    ) -> StoredLevelStatus {
        StoredLevelStatus {
            player_id,
            level_id,
            attempts,
            failures: 0,
            completed,
        }
    }

    #[test]
    fn fills_gaps_with_untouched_entries() {
        let catalog = vec![level(1, true), level(2, true)];
        let stored = vec![row(7, 1, 3, true)];

        let view = reconcile(7, &stored, &catalog);

        assert_eq!(
            view,
            vec![
                LevelStatus {
                    level_id: 1,
                    attempts: 3,
                    failures: 0,
                    completed: true,
                    is_official: true,
                },
                LevelStatus::untouched(2, true),
            ]
        );
    }

    #[test]
    fn output_follows_catalog_order_and_cardinality() {
        let catalog = vec![level(4, false), level(1, true), level(9, false)];
        let stored = vec![row(1, 9, 2, false), row(1, 4, 1, false)];

        let view = reconcile(1, &stored, &catalog);
        let ids: Vec<LevelId> = view.iter().map(|s| s.level_id).collect();
        assert_eq!(ids, vec![4, 1, 9]);
    }

    #[test]
    fn official_flag_comes_from_catalog() {
        let catalog = vec![level(1, false), level(2, true)];
        let stored = vec![row(3, 1, 5, true), row(3, 2, 1, false)];

        let view = reconcile(3, &stored, &catalog);
        assert!(!view[0].is_official);
        assert!(view[1].is_official);
        assert_eq!(view[0].attempts, 5);
    }

    #[test]
    fn drops_rows_for_levels_not_in_catalog() {
        let catalog = vec![level(1, true)];
        let stored = vec![row(2, 1, 1, false), row(2, 42, 8, true)];

        let view = reconcile(2, &stored, &catalog);
        assert_eq!(view.len(), 1);
        assert_eq!(view[0].level_id, 1);
    }

    #[test]
    fn ignores_rows_of_other_players() {
        let catalog = vec![level(1, true)];
        let stored = vec![row(8, 1, 6, true)];

        let view = reconcile(2, &stored, &catalog);
        assert_eq!(view, vec![LevelStatus::untouched(1, true)]);
    }

    #[test]
    fn duplicate_rows_last_one_wins() {
        let catalog = vec![level(1, true)];
        let stored = vec![row(2, 1, 1, false), row(2, 1, 4, true)];

        let view = reconcile(2, &stored, &catalog);
        assert_eq!(view[0].attempts, 4);
        assert!(view[0].completed);
    }

    #[test]
    fn empty_catalog_yields_empty_view() {
        let stored = vec![row(2, 1, 1, false)];
        assert!(reconcile(2, &stored, &[]).is_empty());
    }

    #[test]
    fn submission_must_reference_known_levels() {
        let catalog = vec![level(1, true), level(2, true)];
        let ok = vec![LevelStatus::untouched(2, false)];
        assert!(validate_submission(&ok, &catalog).is_ok());

        let unknown = vec![LevelStatus::untouched(3, false)];
        assert_eq!(
            validate_submission(&unknown, &catalog),
            Err(ValidationError::UnknownLevel(3))
        );
    }

    #[test]
    fn submission_rejects_failures_over_attempts() {
        let catalog = vec![level(1, true)];
        let bad = vec![LevelStatus {
            level_id: 1,
            attempts: 1,
            failures: 2,
            completed: false,
            is_official: false,
        }];
        assert!(matches!(
            validate_submission(&bad, &catalog),
            Err(ValidationError::FailuresExceedAttempts { level_id: 1, .. })
        ));
    }
}
