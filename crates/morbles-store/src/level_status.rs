//! Per-player level status: reads and the progress writer.
//!
//! Writes are update-then-insert per `(player_id, level_id)` key:
//!
//! 1. `UPDATE` the exact composite key;
//! 2. if no row matched, `INSERT` it;
//! 3. if the insert fails too, the entry is reported as a conflict.
//!
//! In [`WriteMode::PerEntry`] every entry stands alone, so a submission can
//! partially succeed. [`WriteMode::Atomic`] runs the same loop inside one
//! transaction and rolls everything back on the first conflict.

use morbles_shared::types::LevelStatus;
use rusqlite::{params, Connection};

use crate::database::Database;
use crate::error::Result;
use crate::models::{
    EntryOutcome, PlayerId, ProgressReport, StoredLevelStatus, WriteMode, WriteOutcome,
};

impl Database {
    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// All stored rows of one player, ordered by level id.
    pub fn list_level_statuses(&self, player_id: PlayerId) -> Result<Vec<StoredLevelStatus>> {
        let mut stmt = self.conn().prepare(
            "SELECT player_id, level_id, attempts, failures, completed
             FROM level_status
             WHERE player_id = ?1
             ORDER BY level_id ASC",
        )?;

        let rows = stmt.query_map(params![player_id], row_to_status)?;

        let mut statuses = Vec::new();
        for row in rows {
            statuses.push(row?);
        }
        Ok(statuses)
    }

    // ------------------------------------------------------------------
    // Write
    // ------------------------------------------------------------------

    /// Write `updates` for `player_id` using the given mode.
    pub fn apply_progress_with(
        &self,
        mode: WriteMode,
        player_id: PlayerId,
        updates: &[LevelStatus],
    ) -> Result<ProgressReport> {
        match mode {
            WriteMode::PerEntry => self.apply_progress(player_id, updates),
            WriteMode::Atomic => self.apply_progress_atomic(player_id, updates),
        }
    }

    /// Write each entry independently.
    ///
    /// A failing `UPDATE` means storage itself is unusable: the remaining
    /// entries are abandoned and the error is returned. Entries written
    /// before that point stay written.
    pub fn apply_progress(
        &self,
        player_id: PlayerId,
        updates: &[LevelStatus],
    ) -> Result<ProgressReport> {
        let mut report = ProgressReport::default();
        for update in updates {
            let row = StoredLevelStatus::from_view(player_id, update);
            let outcome = write_entry(self.conn(), &row)?;
            report.entries.push(EntryOutcome {
                level_id: row.level_id,
                outcome,
            });
        }

        log_report(player_id, &report);
        Ok(report)
    }

    /// Write all entries in one transaction.
    ///
    /// On the first conflict the transaction is rolled back; the conflicting
    /// entry keeps its reason and every other entry is reported as
    /// [`WriteOutcome::RolledBack`].
    pub fn apply_progress_atomic(
        &self,
        player_id: PlayerId,
        updates: &[LevelStatus],
    ) -> Result<ProgressReport> {
        let tx = self.conn().unchecked_transaction()?;
        let mut report = ProgressReport::default();
        let mut failed = false;

        for update in updates {
            let row = StoredLevelStatus::from_view(player_id, update);
            let outcome = if failed {
                WriteOutcome::RolledBack
            } else {
                write_entry(&tx, &row)?
            };
            failed |= matches!(outcome, WriteOutcome::Conflict(_));
            report.entries.push(EntryOutcome {
                level_id: row.level_id,
                outcome,
            });
        }

        if failed {
            tx.rollback()?;
            for entry in &mut report.entries {
                if entry.outcome.is_applied() {
                    entry.outcome = WriteOutcome::RolledBack;
                }
            }
        } else {
            tx.commit()?;
        }

        log_report(player_id, &report);
        Ok(report)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn write_entry(conn: &Connection, row: &StoredLevelStatus) -> Result<WriteOutcome> {
    let updated = conn.execute(
        "UPDATE level_status
         SET attempts = ?1, failures = ?2, completed = ?3
         WHERE player_id = ?4 AND level_id = ?5",
        params![row.attempts, row.failures, row.completed, row.player_id, row.level_id],
    )?;
    if updated > 0 {
        return Ok(WriteOutcome::Updated);
    }

    let inserted = conn.execute(
        "INSERT INTO level_status (player_id, level_id, attempts, failures, completed)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![row.player_id, row.level_id, row.attempts, row.failures, row.completed],
    );
    match inserted {
        Ok(_) => Ok(WriteOutcome::Inserted),
        Err(e) => {
            tracing::warn!(
                player_id = row.player_id,
                level_id = row.level_id,
                error = %e,
                "level status insert failed after empty update"
            );
            Ok(WriteOutcome::Conflict(e.to_string()))
        }
    }
}

fn log_report(player_id: PlayerId, report: &ProgressReport) {
    let conflicts = report.conflicts().count();
    if conflicts == 0 {
        tracing::debug!(player_id, entries = report.entries.len(), "progress written");
    } else {
        tracing::warn!(
            player_id,
            entries = report.entries.len(),
            conflicts,
            "progress written with conflicts"
        );
    }
}

/// Map a `rusqlite::Row` to a [`StoredLevelStatus`].
fn row_to_status(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredLevelStatus> {
    Ok(StoredLevelStatus {
        player_id: row.get(0)?,
        level_id: row.get(1)?,
        attempts: row.get(2)?,
        failures: row.get(3)?,
        completed: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::models::{Level, LevelId};

    fn seeded() -> (Database, PlayerId) {
        let db = Database::open_in_memory().unwrap();
        for id in [1, 2] {
            db.insert_level(&Level {
                id,
                name: format!("Level {id}"),
                hint: String::new(),
                rows: 1,
                columns: 1,
                starting_balls: "r".into(),
                ending_balls: "r".into(),
                map: ".".into(),
                is_official: true,
            })
            .unwrap();
        }
        let player = db.resolve_player("seven").unwrap();
        (db, player.id)
    }

    fn status(level_id: LevelId, attempts: u16, failures: u16, completed: bool) -> LevelStatus {
        LevelStatus {
            level_id,
            attempts,
            failures,
            completed,
            is_official: false,
        }
    }

    fn stored(db: &Database, player_id: PlayerId, level_id: LevelId) -> Option<StoredLevelStatus> {
        db.list_level_statuses(player_id)
            .unwrap()
            .into_iter()
            .find(|row| row.level_id == level_id)
    }

    /// Make every UPDATE of the `(player, 2)` row fail, as if storage went away.
    fn break_updates_of_level_two(db: &Database) {
        db.conn()
            .execute_batch(
                "CREATE TRIGGER fail_level_two BEFORE UPDATE ON level_status
                 WHEN NEW.level_id = 2
                 BEGIN SELECT RAISE(ABORT, 'storage unavailable'); END;",
            )
            .unwrap();
    }

    #[test]
    fn first_write_inserts_then_updates() {
        let (db, player) = seeded();

        let report = db.apply_progress(player, &[status(2, 1, 0, false)]).unwrap();
        assert_eq!(report.entries[0].outcome, WriteOutcome::Inserted);

        let report = db.apply_progress(player, &[status(2, 2, 1, true)]).unwrap();
        assert_eq!(report.entries[0].outcome, WriteOutcome::Updated);

        let row = stored(&db, player, 2).unwrap();
        assert_eq!((row.attempts, row.failures, row.completed), (2, 1, true));
    }

    #[test]
    fn applying_twice_is_idempotent() {
        let (db, player) = seeded();
        let update = [status(1, 3, 1, true)];

        db.apply_progress(player, &update).unwrap();
        let once = db.list_level_statuses(player).unwrap();
        db.apply_progress(player, &update).unwrap();
        let twice = db.list_level_statuses(player).unwrap();

        assert_eq!(once, twice);
        assert_eq!(twice.len(), 1);
    }

    #[test]
    fn untouched_levels_are_not_clobbered() {
        let (db, player) = seeded();
        db.apply_progress(player, &[status(1, 5, 2, true)]).unwrap();

        db.apply_progress(player, &[status(2, 1, 0, false)]).unwrap();

        let level_one = stored(&db, player, 1).unwrap();
        assert_eq!(level_one.attempts, 5);
        assert!(level_one.completed);
    }

    #[test]
    fn unknown_level_is_a_conflict_and_others_still_apply() {
        let (db, player) = seeded();

        let report = db
            .apply_progress(player, &[status(1, 1, 0, false), status(9, 1, 0, false)])
            .unwrap();

        assert!(!report.is_complete());
        assert_eq!(report.entries[0].outcome, WriteOutcome::Inserted);
        assert!(matches!(report.entries[1].outcome, WriteOutcome::Conflict(_)));
        assert_eq!(report.conflicts().count(), 1);
        assert!(stored(&db, player, 1).is_some());
    }

    #[test]
    fn atomic_mode_rolls_back_everything_on_conflict() {
        let (db, player) = seeded();

        let report = db
            .apply_progress_atomic(
                player,
                &[status(1, 1, 0, false), status(9, 1, 0, false), status(2, 1, 0, false)],
            )
            .unwrap();

        assert_eq!(report.entries[0].outcome, WriteOutcome::RolledBack);
        assert!(matches!(report.entries[1].outcome, WriteOutcome::Conflict(_)));
        assert_eq!(report.entries[2].outcome, WriteOutcome::RolledBack);
        assert!(db.list_level_statuses(player).unwrap().is_empty());
    }

    #[test]
    fn atomic_mode_commits_clean_submission() {
        let (db, player) = seeded();

        let report = db
            .apply_progress_with(
                WriteMode::Atomic,
                player,
                &[status(1, 1, 0, false), status(2, 4, 2, true)],
            )
            .unwrap();

        assert!(report.is_complete());
        assert_eq!(db.list_level_statuses(player).unwrap().len(), 2);
    }

    #[test]
    fn rows_of_other_players_are_separate() {
        let (db, seven) = seeded();
        let other = db.resolve_player("eight").unwrap().id;

        db.apply_progress(seven, &[status(1, 1, 0, false)]).unwrap();
        db.apply_progress(other, &[status(1, 9, 9, true)]).unwrap();

        assert_eq!(stored(&db, seven, 1).unwrap().attempts, 1);
        assert_eq!(stored(&db, other, 1).unwrap().attempts, 9);
    }

    #[test]
    fn update_failure_aborts_rest_and_keeps_earlier_entries() {
        let (db, player) = seeded();
        db.apply_progress(player, &[status(2, 1, 0, false)]).unwrap();
        break_updates_of_level_two(&db);

        let result = db.apply_progress(
            player,
            &[status(1, 1, 0, false), status(2, 5, 0, true), status(1, 7, 0, false)],
        );

        assert!(matches!(result, Err(StoreError::Sqlite(_))));
        assert_eq!(stored(&db, player, 1).unwrap().attempts, 1);
        assert_eq!(stored(&db, player, 2).unwrap().attempts, 1);
    }

    #[test]
    fn atomic_update_failure_commits_nothing() {
        let (db, player) = seeded();
        db.apply_progress(player, &[status(2, 1, 0, false)]).unwrap();
        break_updates_of_level_two(&db);

        let result = db.apply_progress_with(
            WriteMode::Atomic,
            player,
            &[status(1, 1, 0, false), status(2, 5, 0, true)],
        );

        assert!(matches!(result, Err(StoreError::Sqlite(_))));
        assert!(stored(&db, player, 1).is_none());
        assert_eq!(stored(&db, player, 2).unwrap().attempts, 1);
    }
}
