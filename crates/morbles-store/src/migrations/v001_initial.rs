//! v001 -- Initial schema creation.
//!
//! Creates the three core tables: `levels`, `players` and `level_status`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Levels (catalog)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS levels (
    id             INTEGER PRIMARY KEY NOT NULL,  -- catalog-assigned, max + 1
    name           TEXT NOT NULL,
    hint           TEXT NOT NULL DEFAULT '',
    "rows"         INTEGER NOT NULL,
    columns        INTEGER NOT NULL,
    starting_balls TEXT NOT NULL,
    ending_balls   TEXT NOT NULL,
    map            TEXT NOT NULL,
    is_official    INTEGER NOT NULL DEFAULT 0     -- boolean 0/1
);

-- ----------------------------------------------------------------
-- Players
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS players (
    id    INTEGER PRIMARY KEY NOT NULL,           -- directory-assigned, max + 1
    name  TEXT NOT NULL UNIQUE,
    admin INTEGER NOT NULL DEFAULT 0              -- boolean 0/1
);

-- ----------------------------------------------------------------
-- Level status (one row per player and level, written on demand)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS level_status (
    player_id INTEGER NOT NULL,                   -- FK -> players(id)
    level_id  INTEGER NOT NULL,                   -- FK -> levels(id)
    attempts  INTEGER NOT NULL DEFAULT 0,
    failures  INTEGER NOT NULL DEFAULT 0,
    completed INTEGER NOT NULL DEFAULT 0,         -- boolean 0/1

    PRIMARY KEY (player_id, level_id),
    FOREIGN KEY (player_id) REFERENCES players(id),
    FOREIGN KEY (level_id) REFERENCES levels(id)
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
