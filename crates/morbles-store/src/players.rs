//! Player directory persistence: player rows and their credentials.

use morbles_shared::credentials::Credential;
use rusqlite::{params, Connection, OptionalExtension};

use crate::database::Database;
use crate::error::{not_found, Result, StoreError};
use crate::models::{PlayerId, PlayerRecord};

impl Database {
    /// Fetch a player by id.
    pub fn get_player(&self, id: PlayerId) -> Result<PlayerRecord> {
        self.conn()
            .query_row(
                "SELECT id, name, admin FROM players WHERE id = ?1",
                params![id],
                row_to_player,
            )
            .map_err(not_found)
    }

    /// Fetch a player by login name.
    pub fn find_player_by_name(&self, name: &str) -> Result<Option<PlayerRecord>> {
        find_by_name(self.conn(), name)
    }

    /// Return the player called `name`, creating it if needed.
    ///
    /// New players get `max(id) + 1` (1 for an empty table), computed inside
    /// the same transaction as the insert, and `admin = false`.
    pub fn resolve_player(&self, name: &str) -> Result<PlayerRecord> {
        let tx = self.conn().unchecked_transaction()?;
        let player = match find_by_name(&tx, name)? {
            Some(existing) => existing,
            None => insert_next_player(&tx, name)?,
        };
        tx.commit()?;
        Ok(player)
    }

    /// Create `name` together with its credential in one transaction.
    ///
    /// Fails with a constraint error if the name is already taken.
    pub fn create_player_with_credential(
        &self,
        name: &str,
        credential: &Credential,
    ) -> Result<PlayerRecord> {
        let tx = self.conn().unchecked_transaction()?;
        let player = insert_next_player(&tx, name)?;
        upsert_credential(&tx, player.id, credential)?;
        tx.commit()?;
        Ok(player)
    }

    /// Grant or revoke admin rights. Returns `true` if the player exists.
    pub fn set_player_admin(&self, id: PlayerId, admin: bool) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE players SET admin = ?1 WHERE id = ?2",
            params![admin, id],
        )?;
        Ok(affected > 0)
    }

    // ------------------------------------------------------------------
    // Credentials
    // ------------------------------------------------------------------

    pub fn get_credential(&self, player_id: PlayerId) -> Result<Option<Credential>> {
        let row: Option<(String, String)> = self
            .conn()
            .query_row(
                "SELECT salt, hash FROM player_credentials WHERE player_id = ?1",
                params![player_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        row.map(|(salt, hash)| {
            Credential::from_hex(&salt, &hash).map_err(|_| StoreError::CorruptCredential(player_id))
        })
        .transpose()
    }

    pub fn set_credential(&self, player_id: PlayerId, credential: &Credential) -> Result<()> {
        upsert_credential(self.conn(), player_id, credential)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn find_by_name(conn: &Connection, name: &str) -> Result<Option<PlayerRecord>> {
    let player = conn
        .query_row(
            "SELECT id, name, admin FROM players WHERE name = ?1",
            params![name],
            row_to_player,
        )
        .optional()?;
    Ok(player)
}

fn insert_next_player(conn: &Connection, name: &str) -> Result<PlayerRecord> {
    let max: Option<PlayerId> =
        conn.query_row("SELECT MAX(id) FROM players", [], |row| row.get(0))?;
    let id = max
        .unwrap_or(0)
        .checked_add(1)
        .ok_or(StoreError::IdSpaceExhausted("players"))?;

    conn.execute(
        "INSERT INTO players (id, name, admin) VALUES (?1, ?2, 0)",
        params![id, name],
    )?;

    tracing::info!(player_id = id, name, "created player");

    Ok(PlayerRecord {
        id,
        name: name.to_string(),
        admin: false,
    })
}

fn upsert_credential(
    conn: &Connection,
    player_id: PlayerId,
    credential: &Credential,
) -> Result<()> {
    conn.execute(
        "INSERT INTO player_credentials (player_id, salt, hash) VALUES (?1, ?2, ?3)
         ON CONFLICT(player_id) DO UPDATE SET salt = excluded.salt, hash = excluded.hash",
        params![player_id, credential.salt_hex(), credential.hash_hex()],
    )?;
    Ok(())
}

/// Map a `rusqlite::Row` to a [`PlayerRecord`].
fn row_to_player(row: &rusqlite::Row<'_>) -> rusqlite::Result<PlayerRecord> {
    Ok(PlayerRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        admin: row.get(2)?,
    })
}
