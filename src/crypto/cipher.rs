//! Authenticated AES-CFB cipher.
//!
//! Encrypt-then-MAC: AES in full-block CFB mode, followed by HMAC-SHA-256
//! over `IV || BODY`. The same key drives both the cipher and the HMAC, which
//! keeps records compatible with data already at rest.

use aes::{Aes128, Aes192, Aes256};
use cfb_mode::cipher::{AsyncStreamCipher, KeyIvInit};
use cfb_mode::{Decryptor, Encryptor};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::IV_LEN;
use super::record::{CipherRecord, RecordBuf};
use crate::erase::SecretBytes;
use crate::error::{CofferError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Symmetric authenticated encryption over byte payloads.
pub trait CipherEngine: Send + Sync {
    /// Encrypts `plaintext` into a `TAG | IV | BODY` record.
    fn encrypt(&self, plaintext: &[u8], key: &[u8], iv: &[u8]) -> Result<Vec<u8>>;

    /// Verifies and decrypts a record produced by [`CipherEngine::encrypt`].
    fn decrypt(&self, record: &[u8], key: &[u8]) -> Result<SecretBytes>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AesCfbEngine;

impl CipherEngine for AesCfbEngine {
    fn encrypt(&self, plaintext: &[u8], key: &[u8], iv: &[u8]) -> Result<Vec<u8>> {
        check_key_len(key)?;
        if iv.len() != IV_LEN {
            return Err(CofferError::InvalidIv {
                expected: IV_LEN,
                actual: iv.len(),
            });
        }

        let mut record = RecordBuf::with_body(iv, plaintext);
        cfb_encrypt(key, iv, record.body_mut())?;

        let mut mac = hmac_for(key)?;
        mac.update(record.authenticated());
        let tag = mac.finalize().into_bytes();

        Ok(record.seal(&tag))
    }

    fn decrypt(&self, record: &[u8], key: &[u8]) -> Result<SecretBytes> {
        let record = CipherRecord::parse(record)?;

        // verify before touching the body
        let mut mac = hmac_for(key)?;
        mac.update(record.authenticated());
        mac.verify_slice(record.tag())
            .map_err(|_| CofferError::Integrity)?;

        check_key_len(key)?;
        let mut plaintext = SecretBytes::from(record.body().to_vec());
        cfb_decrypt(key, record.iv(), &mut plaintext)?;
        Ok(plaintext)
    }
}

fn check_key_len(key: &[u8]) -> Result<()> {
    match key.len() {
        16 | 24 | 32 => Ok(()),
        n => Err(CofferError::InvalidKeyLength(n)),
    }
}

fn hmac_for(key: &[u8]) -> Result<HmacSha256> {
    HmacSha256::new_from_slice(key).map_err(|_| CofferError::InvalidKeyLength(key.len()))
}

fn cfb_encrypt(key: &[u8], iv: &[u8], buf: &mut [u8]) -> Result<()> {
    let invalid = |_| CofferError::InvalidKeyLength(key.len());
    match key.len() {
        16 => Encryptor::<Aes128>::new_from_slices(key, iv)
            .map_err(invalid)?
            .encrypt(buf),
        24 => Encryptor::<Aes192>::new_from_slices(key, iv)
            .map_err(invalid)?
            .encrypt(buf),
        32 => Encryptor::<Aes256>::new_from_slices(key, iv)
            .map_err(invalid)?
            .encrypt(buf),
        n => return Err(CofferError::InvalidKeyLength(n)),
    }
    Ok(())
}

fn cfb_decrypt(key: &[u8], iv: &[u8], buf: &mut [u8]) -> Result<()> {
    let invalid = |_| CofferError::InvalidKeyLength(key.len());
    match key.len() {
        16 => Decryptor::<Aes128>::new_from_slices(key, iv)
            .map_err(invalid)?
            .decrypt(buf),
        24 => Decryptor::<Aes192>::new_from_slices(key, iv)
            .map_err(invalid)?
            .decrypt(buf),
        32 => Decryptor::<Aes256>::new_from_slices(key, iv)
            .map_err(invalid)?
            .decrypt(buf),
        n => return Err(CofferError::InvalidKeyLength(n)),
    }
    Ok(())
}
