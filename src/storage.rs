//! Persistent storage for salts, wrapped repository keys and encrypted
//! repositories.

use crate::error::{CofferError, Result};
use getrandom::fill;
use std::collections::HashMap;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// The three independent key spaces of a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// user id -> random salt
    UserSalt,
    /// user id -> repository key encrypted under the user's password key
    WrappedRepoKey,
    /// repository id -> serialized repository encrypted under the repository key
    CipherRepository,
}

impl Namespace {
    pub fn name(&self) -> &'static str {
        match self {
            Namespace::UserSalt => "user-salt",
            Namespace::WrappedRepoKey => "wrapped-repo-key",
            Namespace::CipherRepository => "cipher-repository",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Namespaced key -> bytes storage.
///
/// Implementations must make single-key reads and writes atomic; nothing
/// more is required (last writer wins).
pub trait Store: Send + Sync {
    /// Returns `None` when `key` is absent from `namespace`.
    fn get(&self, namespace: Namespace, key: &str) -> Result<Option<Vec<u8>>>;

    fn put(&self, namespace: Namespace, key: &str, value: &[u8]) -> Result<()>;

    /// Releases underlying resources.
    fn close(&self) -> Result<()> {
        Ok(())
    }
}

impl<S: Store + ?Sized> Store for Arc<S> {
    fn get(&self, namespace: Namespace, key: &str) -> Result<Option<Vec<u8>>> {
        (**self).get(namespace, key)
    }

    fn put(&self, namespace: Namespace, key: &str, value: &[u8]) -> Result<()> {
        (**self).put(namespace, key, value)
    }

    fn close(&self) -> Result<()> {
        (**self).close()
    }
}

/// A store keeping one file per record under `<root>/<namespace>/<key>`.
#[derive(Clone, Debug)]
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    /// Creates a new DirStore rooted at the given directory.
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Returns the root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns `true` if the root directory exists.
    pub fn exists(&self) -> bool {
        self.root.is_dir()
    }

    fn record_path(&self, namespace: Namespace, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(namespace.name()).join(key))
    }

    /// Writes `data` to `path` atomically.
    ///
    /// The data goes to a randomly named temporary file in the same
    /// directory, which is synced and then renamed over the target. The
    /// parent directory is synced afterwards so the rename survives a crash.
    /// Either the old or the new content is present, never a partial write.
    fn write_atomic(&self, path: &Path, key: &str, data: &[u8]) -> Result<()> {
        let parent = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(parent)?;

        let tmp_path = random_tmp_path(parent, key)?;

        // securely create temp file (fail if exists)
        let mut tmp_file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp_path)?;

        tmp_file.write_all(data)?;
        tmp_file.sync_all()?;
        drop(tmp_file);

        if let Err(e) = atomic_replace(&tmp_path, path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }

        let dir = File::open(parent)?;
        dir.sync_all()?;

        Ok(())
    }
}

impl Store for DirStore {
    fn get(&self, namespace: Namespace, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.record_path(namespace, key)?;
        match fs::read(&path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, namespace: Namespace, key: &str, value: &[u8]) -> Result<()> {
        let path = self.record_path(namespace, key)?;
        self.write_atomic(&path, key, value)?;
        debug!(%namespace, bytes = value.len(), "record written");
        Ok(())
    }
}

/// Keys become file names, so only `[A-Za-z0-9_-]` is accepted.
fn validate_key(key: &str) -> Result<()> {
    let valid = !key.is_empty()
        && key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
    if valid {
        Ok(())
    } else {
        Err(CofferError::InvalidStoreKey(key.to_string()))
    }
}

/// Generates a unique temporary file path in `dir`.
///
/// Format: `<key>.tmp.<randomhex>`
fn random_tmp_path(dir: &Path, key: &str) -> Result<PathBuf> {
    let mut buf = [0u8; 8]; // 64 bit entropy
    fill(&mut buf).map_err(|_| CofferError::Entropy)?;

    let rand_string = buf.iter().map(|b| format!("{:02x}", b)).collect::<String>();

    Ok(dir.join(format!("{key}.tmp.{rand_string}")))
}

/// Atomically replaces `target` with `tmp_path`.
///
/// Uses Windows `ReplaceFileW` with `REPLACEFILE_WRITE_THROUGH` when the
/// target exists; a plain rename otherwise.
#[cfg(target_os = "windows")]
fn atomic_replace(tmp_path: &Path, target: &Path) -> io::Result<()> {
    use std::ffi::OsStr;
    use std::os::windows::ffi::OsStrExt;
    use windows_sys::Win32::Storage::FileSystem::{REPLACEFILE_WRITE_THROUGH, ReplaceFileW};

    if !target.exists() {
        return fs::rename(tmp_path, target);
    }

    fn to_wide(s: &OsStr) -> Vec<u16> {
        s.encode_wide().chain(std::iter::once(0)).collect()
    }

    let target_w = to_wide(target.as_os_str());
    let tmp_w = to_wide(tmp_path.as_os_str());

    // SAFETY:
    // - Strings are valid UTF-16 and null-terminated
    // - Pointers remain valid during the call
    // - Windows does not retain the pointers after return
    let result = unsafe {
        ReplaceFileW(
            target_w.as_ptr(),
            tmp_w.as_ptr(),
            std::ptr::null(),
            REPLACEFILE_WRITE_THROUGH,
            std::ptr::null(),
            std::ptr::null(),
        )
    };

    if result == 0 {
        return Err(io::Error::last_os_error());
    }

    Ok(())
}

/// On Unix, `rename()` is atomic when both paths are on the same filesystem.
#[cfg(not(target_os = "windows"))]
fn atomic_replace(tmp_path: &Path, target: &Path) -> io::Result<()> {
    fs::rename(tmp_path, target)
}

/// In-process store. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<(Namespace, String), Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Store for MemoryStore {
    fn get(&self, namespace: Namespace, key: &str) -> Result<Option<Vec<u8>>> {
        let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(records.get(&(namespace, key.to_string())).cloned())
    }

    fn put(&self, namespace: Namespace, key: &str, value: &[u8]) -> Result<()> {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        records.insert((namespace, key.to_string()), value.to_vec());
        Ok(())
    }
}
