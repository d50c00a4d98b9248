//! # morbles-shared
//!
//! Domain types and pure logic shared by the Morbles store and server:
//! levels, per-player level status, progress reconciliation, payload
//! validation and credential hashing.

pub mod constants;
pub mod credentials;
pub mod error;
pub mod progress;
pub mod types;

pub use error::ValidationError;
pub use progress::reconcile;
pub use types::*;
