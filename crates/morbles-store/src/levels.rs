//! Persistence for the level catalog.

use rusqlite::params;

use crate::database::Database;
use crate::error::Result;
use crate::models::{Level, LevelId};

const LEVEL_COLUMNS: &str =
    "id, name, hint, \"rows\", columns, starting_balls, ending_balls, map, is_official";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a level with an already-assigned id.
    ///
    /// The catalog owns id assignment; a duplicate id surfaces as a
    /// constraint error.
    pub fn insert_level(&self, level: &Level) -> Result<()> {
        self.conn().execute(
            "INSERT INTO levels
                 (id, name, hint, \"rows\", columns, starting_balls, ending_balls, map, is_official)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                level.id,
                level.name,
                level.hint,
                level.rows,
                level.columns,
                level.starting_balls,
                level.ending_balls,
                level.map,
                level.is_official,
            ],
        )?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// List every level, ordered by ascending id.
    pub fn list_levels(&self) -> Result<Vec<Level>> {
        let mut stmt = self
            .conn()
            .prepare(&format!("SELECT {LEVEL_COLUMNS} FROM levels ORDER BY id ASC"))?;

        let rows = stmt.query_map([], row_to_level)?;

        let mut levels = Vec::new();
        for row in rows {
            levels.push(row?);
        }
        Ok(levels)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Replace every mutable field of `level.id`. Returns `true` if a row
    /// matched.
    pub fn update_level(&self, level: &Level) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE levels
             SET name = ?2, hint = ?3, \"rows\" = ?4, columns = ?5,
                 starting_balls = ?6, ending_balls = ?7, map = ?8, is_official = ?9
             WHERE id = ?1",
            params![
                level.id,
                level.name,
                level.hint,
                level.rows,
                level.columns,
                level.starting_balls,
                level.ending_balls,
                level.map,
                level.is_official,
            ],
        )?;
        Ok(affected > 0)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a `rusqlite::Row` to a [`Level`].
fn row_to_level(row: &rusqlite::Row<'_>) -> rusqlite::Result<Level> {
    Ok(Level {
        id: row.get(0)?,
        name: row.get(1)?,
        hint: row.get(2)?,
        rows: row.get(3)?,
        columns: row.get(4)?,
        starting_balls: row.get(5)?,
        ending_balls: row.get(6)?,
        map: row.get(7)?,
        is_official: row.get(8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;

    fn level(id: LevelId) -> Level {
        Level {
            id,
            name: format!("Level {id}"),
            hint: "hint".into(),
            rows: 2,
            columns: 3,
            starting_balls: "rg".into(),
            ending_balls: "gr".into(),
            map: "......".into(),
            is_official: id % 2 == 0,
        }
    }

    #[test]
    fn insert_round_trips_every_column() {
        let db = Database::open_in_memory().unwrap();
        db.insert_level(&level(2)).unwrap();

        assert_eq!(db.list_levels().unwrap(), vec![level(2)]);
    }

    #[test]
    fn list_is_ordered_by_id() {
        let db = Database::open_in_memory().unwrap();
        for id in [4, 1, 2] {
            db.insert_level(&level(id)).unwrap();
        }

        let ids: Vec<LevelId> = db.list_levels().unwrap().iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![1, 2, 4]);
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        db.insert_level(&level(1)).unwrap();
        assert!(matches!(db.insert_level(&level(1)), Err(StoreError::Sqlite(_))));
    }

    #[test]
    fn update_replaces_fields() {
        let db = Database::open_in_memory().unwrap();
        db.insert_level(&level(1)).unwrap();

        let mut changed = level(1);
        changed.name = "Renamed".into();
        changed.is_official = true;
        assert!(db.update_level(&changed).unwrap());
        assert_eq!(db.list_levels().unwrap(), vec![changed]);

        assert!(!db.update_level(&level(9)).unwrap());
    }
}
