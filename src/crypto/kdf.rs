use std::fmt;
use std::str::FromStr;

use pbkdf2::pbkdf2_hmac;
use sha2::{Sha256, Sha512};

use super::KEY_LEN;
use crate::erase::SecretBytes;
use crate::error::{CofferError, Result};

/// Hash function driving the PBKDF2 HMAC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KdfHash {
    #[default]
    Sha256,
    Sha512,
}

impl fmt::Display for KdfHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KdfHash::Sha256 => f.write_str("sha256"),
            KdfHash::Sha512 => f.write_str("sha512"),
        }
    }
}

impl FromStr for KdfHash {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sha256" | "sha-256" => Ok(KdfHash::Sha256),
            "sha512" | "sha-512" => Ok(KdfHash::Sha512),
            other => Err(format!("unsupported hash '{other}' (expected sha256 or sha512)")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    hash: KdfHash,
    iterations: u32,
    key_len: usize,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            hash: KdfHash::Sha256,
            iterations: 10_000,
            // AES-256 key
            key_len: KEY_LEN,
        }
    }
}

impl KdfParams {
    pub fn new(hash: KdfHash, iterations: u32, key_len: usize) -> Result<Self> {
        let params = Self {
            hash,
            iterations,
            key_len,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn hash(&self) -> KdfHash {
        self.hash
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn key_len(&self) -> usize {
        self.key_len
    }

    pub fn validate(&self) -> Result<()> {
        if self.iterations < 1 {
            return Err(CofferError::InvalidKdfParams(
                "pbkdf2 iterations must be >= 1".into(),
            ));
        }
        if !matches!(self.key_len, 16 | 24 | 32) {
            return Err(CofferError::InvalidKdfParams(format!(
                "output length {} is not an AES key size (16, 24 or 32)",
                self.key_len
            )));
        }
        Ok(())
    }
}

/// Stretches `password` and `salt` into `params.key_len()` bytes with PBKDF2.
pub fn derive(password: &[u8], salt: &[u8], params: KdfParams) -> Result<SecretBytes> {
    params.validate()?;

    let mut key = SecretBytes::from(vec![0u8; params.key_len]);
    match params.hash {
        KdfHash::Sha256 => pbkdf2_hmac::<Sha256>(password, salt, params.iterations, &mut key),
        KdfHash::Sha512 => pbkdf2_hmac::<Sha512>(password, salt, params.iterations, &mut key),
    }
    Ok(key)
}

/// Turns a password and a user salt into a key-encryption key.
pub trait PasswordDeriver: Send + Sync {
    fn derive(&self, password: &[u8], salt: &[u8]) -> Result<SecretBytes>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Pbkdf2Deriver {
    params: KdfParams,
}

impl Pbkdf2Deriver {
    pub fn new(params: KdfParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> KdfParams {
        self.params
    }
}

impl PasswordDeriver for Pbkdf2Deriver {
    fn derive(&self, password: &[u8], salt: &[u8]) -> Result<SecretBytes> {
        derive(password, salt, self.params)
    }
}
