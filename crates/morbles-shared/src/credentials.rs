use rand::RngCore;
use subtle::ConstantTimeEq;

use crate::constants::{
    KDF_CONTEXT_PASSWORD, PASSWORD_HASH_ROUNDS, SALT_SIZE, SESSION_TOKEN_SIZE,
};

pub type PasswordHash = [u8; 32];

/// Salted password digest as persisted in `player_credentials`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub salt: [u8; SALT_SIZE],
    pub hash: PasswordHash,
}

impl Credential {
    /// Hash `password` under a fresh random salt.
    pub fn new(password: &str) -> Self {
        let mut salt = [0u8; SALT_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut salt);
        let hash = hash_password(password, &salt);
        Self { salt, hash }
    }

    pub fn verify(&self, password: &str) -> bool {
        let candidate = hash_password(password, &self.salt);
        candidate[..].ct_eq(&self.hash[..]).into()
    }

    pub fn salt_hex(&self) -> String {
        hex::encode(self.salt)
    }

    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }

    pub fn from_hex(salt_hex: &str, hash_hex: &str) -> Result<Self, hex::FromHexError> {
        let mut salt = [0u8; SALT_SIZE];
        hex::decode_to_slice(salt_hex, &mut salt)?;
        let mut hash = [0u8; 32];
        hex::decode_to_slice(hash_hex, &mut hash)?;
        Ok(Self { salt, hash })
    }
}

// BLAKE3 KDF with domain separation, then iterated to slow down guessing
pub fn hash_password(password: &str, salt: &[u8]) -> PasswordHash {
    let mut hasher = blake3::Hasher::new_derive_key(KDF_CONTEXT_PASSWORD);
    hasher.update(salt);
    hasher.update(password.as_bytes());
    let mut digest = *hasher.finalize().as_bytes();

    for _ in 0..PASSWORD_HASH_ROUNDS {
        let mut round = blake3::Hasher::new_keyed(&digest);
        round.update(salt);
        digest = *round.finalize().as_bytes();
    }
    digest
}

/// Random hex token used as a session identifier.
pub fn generate_session_token() -> String {
    let mut token = [0u8; SESSION_TOKEN_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut token);
    hex::encode(token)
}
