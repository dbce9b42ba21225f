//! Secure erasure of sensitive buffers.
//!
//! Every password-derived key, repository key and decrypted plaintext lives
//! in a [`Wiped`] buffer, which is overwritten when it goes out of scope on
//! any exit path (return, `?`, or unwinding).

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::ptr;
use std::sync::atomic::{Ordering, compiler_fence};
use zeroize::Zeroize;

/// Number of overwrite cycles performed by [`wipe`].
pub const WIPE_CYCLES: usize = 1000;

/// Overwrites `buf` with alternating 0xFF / 0x00 passes.
///
/// The last pass is always zero, so the final content is deterministic.
pub fn wipe(buf: &mut [u8]) {
    if buf.is_empty() {
        return;
    }
    for _ in 0..WIPE_CYCLES {
        for byte in buf.iter_mut() {
            // SAFETY: `byte` is a valid, aligned and exclusive reference.
            unsafe { ptr::write_volatile(byte, 0xFF) };
        }
        compiler_fence(Ordering::SeqCst);
        buf.zeroize();
    }
}

/// Owns (or borrows) a byte buffer and wipes it on drop.
pub struct Wiped<B: AsMut<[u8]>> {
    inner: B,
}

/// Heap buffer holding key material or decrypted plaintext.
pub type SecretBytes = Wiped<Vec<u8>>;

impl<B: AsMut<[u8]>> Wiped<B> {
    pub fn new(inner: B) -> Self {
        Self { inner }
    }

    /// Wipes the buffer now. Dropping wipes it again.
    pub fn wipe(&mut self) {
        wipe(self.inner.as_mut());
    }
}

impl<B: AsMut<[u8]>> Drop for Wiped<B> {
    fn drop(&mut self) {
        wipe(self.inner.as_mut());
        #[cfg(test)]
        trace::dropped(self.inner.as_mut());
    }
}

impl<B: AsMut<[u8]> + AsRef<[u8]>> Deref for Wiped<B> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.inner.as_ref()
    }
}

impl<B: AsMut<[u8]> + AsRef<[u8]>> DerefMut for Wiped<B> {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.inner.as_mut()
    }
}

impl<B: AsMut<[u8]> + AsRef<[u8]>> fmt::Debug for Wiped<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Wiped([REDACTED; {}])", self.inner.as_ref().len())
    }
}

impl From<Vec<u8>> for SecretBytes {
    fn from(bytes: Vec<u8>) -> Self {
        Wiped::new(bytes)
    }
}
