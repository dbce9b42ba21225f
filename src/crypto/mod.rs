//! Cryptographic primitives for repositories.
//!
//! Provides random salts and identifiers, password-based key derivation,
//! the authenticated AES-CFB cipher, and the ciphertext record layout.

pub mod cipher;
pub mod kdf;
pub mod random;
pub mod record;

pub use cipher::{AesCfbEngine, CipherEngine};
pub use kdf::{KdfHash, KdfParams, PasswordDeriver, Pbkdf2Deriver, derive};
pub use random::{IdSource, OsSaltSource, SaltSource, UuidSource};
pub use record::CipherRecord;

/// Length of a per-user salt (32 bytes).
pub const SALT_LEN: usize = 32;
/// Length of a repository key (32 bytes / AES-256).
pub const KEY_LEN: usize = 32;
/// Length of the initialization vector (one AES block).
pub const IV_LEN: usize = 16;
/// Length of the HMAC-SHA-256 authentication tag.
pub const TAG_LEN: usize = 32;
