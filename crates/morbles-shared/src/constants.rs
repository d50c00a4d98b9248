/// Name of the session cookie issued on login
pub const SESSION_COOKIE: &str = "morbles_session";

/// Session token size in bytes (hex-encoded on the wire)
pub const SESSION_TOKEN_SIZE: usize = 32;

/// Credential salt size in bytes
pub const SALT_SIZE: usize = 16;

/// BLAKE3 derive-key context for password hashing
pub const KDF_CONTEXT_PASSWORD: &str = "morbles 2024-01-01 player password v1";

/// Number of BLAKE3 rounds applied on top of the derived key
pub const PASSWORD_HASH_ROUNDS: u32 = 10_000;
