use crate::error::{CofferError, Result};
use getrandom::fill;
use uuid::Uuid;

/// Source of cryptographically secure random bytes (salts, keys, IVs).
pub trait SaltSource: Send + Sync {
    fn generate(&self, size: usize) -> Result<Vec<u8>>;
}

/// Source of unique opaque identifiers for users and repositories.
pub trait IdSource: Send + Sync {
    fn generate(&self) -> String;
}

/// Salt source backed by the operating system RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsSaltSource;

impl SaltSource for OsSaltSource {
    fn generate(&self, size: usize) -> Result<Vec<u8>> {
        let mut salt = vec![0u8; size];
        secure_random(&mut salt)?;
        Ok(salt)
    }
}

/// Random (v4) UUIDs in hyphenated form.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidSource;

impl IdSource for UuidSource {
    fn generate(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Fill buffer with cryptographically secure random bytes
fn secure_random(buf: &mut [u8]) -> Result<()> {
    fill(buf).map_err(|_| CofferError::Entropy)
}
