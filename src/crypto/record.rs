//! Ciphertext record layout.
//!
//! ```text
//! TAG (32) | IV (16) | BODY (len(plaintext))
//! ```
//!
//! The tag is HMAC-SHA-256 over `IV || BODY`. There are no separators or
//! length prefixes; the body length is the record length minus 48.

use super::{IV_LEN, TAG_LEN};
use crate::error::{CofferError, Result};

/// Length of the fixed part of a record.
pub const HEADER_LEN: usize = TAG_LEN + IV_LEN;

/// A parsed, borrowed view over a ciphertext record.
#[derive(Debug, Clone, Copy)]
pub struct CipherRecord<'a> {
    data: &'a [u8],
}

impl<'a> CipherRecord<'a> {
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        if data.len() < HEADER_LEN {
            return Err(CofferError::TruncatedRecord(data.len()));
        }
        Ok(Self { data })
    }

    pub fn tag(&self) -> &'a [u8] {
        &self.data[..TAG_LEN]
    }

    pub fn iv(&self) -> &'a [u8] {
        &self.data[TAG_LEN..HEADER_LEN]
    }

    pub fn body(&self) -> &'a [u8] {
        &self.data[HEADER_LEN..]
    }

    /// The bytes covered by the tag (`IV || BODY`).
    pub fn authenticated(&self) -> &'a [u8] {
        &self.data[TAG_LEN..]
    }
}

/// A record under construction: the body is filled in, encrypted in place,
/// and then sealed with its tag.
pub(crate) struct RecordBuf {
    buf: Vec<u8>,
}

impl RecordBuf {
    pub fn with_body(iv: &[u8], body: &[u8]) -> Self {
        let mut buf = Vec::with_capacity(HEADER_LEN + body.len());
        buf.extend_from_slice(&[0u8; TAG_LEN]);
        buf.extend_from_slice(iv);
        buf.extend_from_slice(body);
        Self { buf }
    }

    pub fn body_mut(&mut self) -> &mut [u8] {
        &mut self.buf[HEADER_LEN..]
    }

    pub fn authenticated(&self) -> &[u8] {
        &self.buf[TAG_LEN..]
    }

    pub fn seal(mut self, tag: &[u8]) -> Vec<u8> {
        self.buf[..TAG_LEN].copy_from_slice(tag);
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_fields_split_at_fixed_offsets() {
        let mut data = vec![1u8; TAG_LEN];
        data.extend_from_slice(&[2u8; IV_LEN]);
        data.extend_from_slice(b"body");

        let record = CipherRecord::parse(&data).unwrap();
        assert_eq!(record.tag(), &[1u8; TAG_LEN]);
        assert_eq!(record.iv(), &[2u8; IV_LEN]);
        assert_eq!(record.body(), b"body");
        assert_eq!(record.authenticated().len(), IV_LEN + 4);
    }

    #[test]
    fn empty_body_is_valid() {
        let data = vec![0u8; HEADER_LEN];
        let record = CipherRecord::parse(&data).unwrap();
        assert!(record.body().is_empty());
    }

    #[test]
    fn record_too_short_fails() {
        let data = vec![0u8; HEADER_LEN - 1];
        match CipherRecord::parse(&data) {
            Err(CofferError::TruncatedRecord(n)) => assert_eq!(n, HEADER_LEN - 1),
            other => panic!("expected TruncatedRecord, got: {other:?}"),
        }
    }

    #[test]
    fn builder_places_tag_iv_and_body() {
        let mut record = RecordBuf::with_body(&[9u8; IV_LEN], b"abc");
        record.body_mut().copy_from_slice(b"xyz");
        assert_eq!(&record.authenticated()[IV_LEN..], b"xyz");

        let bytes = record.seal(&[3u8; TAG_LEN]);
        let parsed = CipherRecord::parse(&bytes).unwrap();
        assert_eq!(parsed.tag(), &[3u8; TAG_LEN]);
        assert_eq!(parsed.iv(), &[9u8; IV_LEN]);
        assert_eq!(parsed.body(), b"xyz");
    }
}
