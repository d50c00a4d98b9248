use rusqlite::Connection;

const UP_SQL: &str = r#"
-- Salted password digests, one per player
CREATE TABLE IF NOT EXISTS player_credentials (
    player_id INTEGER PRIMARY KEY NOT NULL,  -- FK -> players(id)
    salt      TEXT NOT NULL,                 -- hex, 16 bytes
    hash      TEXT NOT NULL,                 -- hex, BLAKE3 digest

    FOREIGN KEY (player_id) REFERENCES players(id)
);
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
