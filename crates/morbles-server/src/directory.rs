//! Player directory: resolve-or-create identities by name, check
//! credentials, and assemble reconciled player views.

use std::sync::Arc;

use morbles_shared::credentials::Credential;
use morbles_shared::progress::reconcile;
use morbles_shared::types::{Player, PlayerId, PlayerRecord};
use morbles_store::Database;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::catalog::Catalog;
use crate::error::ServerError;

pub struct PlayerDirectory {
    db: Arc<Mutex<Database>>,
    registration_open: bool,
}

impl PlayerDirectory {
    pub fn new(db: Arc<Mutex<Database>>, registration_open: bool) -> Self {
        Self {
            db,
            registration_open,
        }
    }

    /// Return the player called `name`, creating it (not admin) if unseen.
    pub async fn resolve(&self, name: &str) -> Result<PlayerRecord, ServerError> {
        Ok(self.db.lock().await.resolve_player(name)?)
    }

    pub async fn get(&self, id: PlayerId) -> Result<Option<PlayerRecord>, ServerError> {
        match self.db.lock().await.get_player(id) {
            Ok(player) => Ok(Some(player)),
            Err(morbles_store::StoreError::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn set_admin(&self, id: PlayerId, admin: bool) -> Result<bool, ServerError> {
        let found = self.db.lock().await.set_player_admin(id, admin)?;
        if found {
            info!(player_id = id, admin, "Admin flag changed");
        }
        Ok(found)
    }

    /// Authenticate `name` with `password`.
    ///
    /// - unknown name: registered on the spot when registration is open;
    /// - known name with a credential: the password must match;
    /// - known name without a credential: the first login sets it.
    pub async fn login(&self, name: &str, password: &str) -> Result<PlayerRecord, ServerError> {
        let name = name.trim();
        if name.is_empty() || password.trim().is_empty() {
            return Err(ServerError::BadRequest("Parameters can't be empty".into()));
        }

        let db = self.db.lock().await;
        let Some(player) = db.find_player_by_name(name)? else {
            if !self.registration_open {
                warn!(name, "Login for unknown player while registration is closed");
                return Err(ServerError::Unauthorized("Authentication failed".into()));
            }
            let player = db.create_player_with_credential(name, &Credential::new(password))?;
            info!(player_id = player.id, "Registered new player");
            return Ok(player);
        };

        match db.get_credential(player.id)? {
            Some(credential) if credential.verify(password) => {
                debug!(player_id = player.id, "Player authenticated");
                Ok(player)
            }
            Some(_) => {
                warn!(player_id = player.id, "Wrong password");
                Err(ServerError::Unauthorized("Authentication failed".into()))
            }
            None => {
                db.set_credential(player.id, &Credential::new(password))?;
                info!(player_id = player.id, "Credential set for existing player");
                Ok(player)
            }
        }
    }

    /// Build the full player view: one status per catalog level.
    pub async fn view(
        &self,
        player: PlayerRecord,
        catalog: &Catalog,
    ) -> Result<Player, ServerError> {
        let levels = catalog.list().await;
        let stored = self.db.lock().await.list_level_statuses(player.id)?;
        let statuses = reconcile(player.id, &stored, &levels);
        Ok(Player::new(player, statuses))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use morbles_shared::types::{Level, LevelStatus};

    fn shared_db() -> Arc<Mutex<Database>> {
        Arc::new(Mutex::new(Database::open_in_memory().unwrap()))
    }

    #[tokio::test]
    async fn test_first_logins_assign_increasing_ids() {
        let directory = PlayerDirectory::new(shared_db(), true);

        let ann = directory.login("ann", "pw").await.unwrap();
        let bob = directory.login("bob", "pw").await.unwrap();
        assert_eq!((ann.id, bob.id), (1, 2));
        assert!(!ann.admin);
    }

    #[tokio::test]
    async fn test_wrong_password_rejected() {
        let directory = PlayerDirectory::new(shared_db(), true);
        directory.login("ann", "right").await.unwrap();

        assert!(matches!(
            directory.login("ann", "wrong").await,
            Err(ServerError::Unauthorized(_))
        ));
        assert_eq!(directory.login("ann", "right").await.unwrap().id, 1);
    }

    #[tokio::test]
    async fn test_blank_parameters_rejected() {
        let directory = PlayerDirectory::new(shared_db(), true);
        assert!(matches!(
            directory.login("  ", "pw").await,
            Err(ServerError::BadRequest(_))
        ));
        assert!(matches!(
            directory.login("ann", " ").await,
            Err(ServerError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_closed_registration() {
        let db = shared_db();
        let directory = PlayerDirectory::new(db.clone(), false);
        assert!(matches!(
            directory.login("ann", "pw").await,
            Err(ServerError::Unauthorized(_))
        ));

        // Players created by other means can still claim their name.
        db.lock().await.resolve_player("ann").unwrap();
        assert_eq!(directory.login("ann", "pw").await.unwrap().name, "ann");
        assert!(directory.login("ann", "other").await.is_err());
    }

    #[tokio::test]
    async fn test_resolve_and_get() {
        let directory = PlayerDirectory::new(shared_db(), true);
        let ann = directory.resolve("ann").await.unwrap();
        assert_eq!(directory.resolve("ann").await.unwrap(), ann);
        assert_eq!(directory.get(ann.id).await.unwrap(), Some(ann));
        assert_eq!(directory.get(9).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_admin() {
        let directory = PlayerDirectory::new(shared_db(), true);
        let ann = directory.resolve("ann").await.unwrap();
        assert!(directory.set_admin(ann.id, true).await.unwrap());
        assert!(directory.get(ann.id).await.unwrap().unwrap().admin);
        assert!(!directory.set_admin(40, true).await.unwrap());
    }

    #[tokio::test]
    async fn test_view_reconciles_against_catalog() {
        let db = shared_db();
        {
            let guard = db.lock().await;
            for id in [1, 2] {
                guard
                    .insert_level(&Level {
                        id,
                        name: format!("L{id}"),
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
        }
        let catalog = Catalog::load(db.clone()).await.unwrap();
        let directory = PlayerDirectory::new(db.clone(), true);
        let ann = directory.resolve("ann").await.unwrap();
        db.lock()
            .await
            .apply_progress(
                ann.id,
                &[LevelStatus {
                    level_id: 1,
                    attempts: 3,
                    failures: 0,
                    completed: true,
                    is_official: false,
                }],
            )
            .unwrap();

        let player = directory.view(ann, &catalog).await.unwrap();
        assert_eq!(player.level_statuses.len(), 2);
        assert_eq!(player.level_statuses[0].attempts, 3);
        assert!(player.level_statuses[0].is_official);
        assert_eq!(player.level_statuses[1], LevelStatus::untouched(2, true));
    }
}
