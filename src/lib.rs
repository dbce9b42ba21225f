pub mod crypto;
pub mod erase;
mod error;
pub mod repository;
pub mod storage;

pub use crate::crypto::{KdfHash, KdfParams};
pub use crate::erase::SecretBytes;
pub use crate::error::{CofferError, ErrorKind, Result};
pub use crate::repository::{Repository, RepositoryInfo, Right, UserAccount};
pub use crate::storage::{DirStore, MemoryStore, Namespace, Store};

use crate::crypto::{
    AesCfbEngine, CipherEngine, IV_LEN, IdSource, KEY_LEN, OsSaltSource, PasswordDeriver,
    Pbkdf2Deriver, SALT_LEN, SaltSource, UuidSource,
};
use anyhow::Context;
use directories::ProjectDirs;
use std::io;
use tracing::{debug, info, instrument, warn};

/// Name of the secret every new repository is seeded with.
pub const DEFAULT_SECRET_NAME: &str = "hello";
/// Value of the seeded secret.
pub const DEFAULT_SECRET_VALUE: &[u8] = b"Hello World !";

/// Envelope-encryption engine over a [`Store`].
///
/// Every operation is one self-contained transaction: the user's password
/// key is derived, the repository key unwrapped, the repository decrypted,
/// used, and (for writes) re-encrypted. Nothing decrypted is kept between
/// calls, and all key material is wiped before the call returns.
pub struct Coffer {
    salts: Box<dyn SaltSource>,
    ids: Box<dyn IdSource>,
    deriver: Box<dyn PasswordDeriver>,
    cipher: Box<dyn CipherEngine>,
    store: Box<dyn Store>,
}

impl Coffer {
    pub fn new(store: impl Store + 'static) -> Self {
        Self::with_kdf(store, KdfParams::default())
    }

    pub fn with_kdf(store: impl Store + 'static, kdf: KdfParams) -> Self {
        Self::with_parts(
            OsSaltSource,
            UuidSource,
            Pbkdf2Deriver::new(kdf),
            AesCfbEngine,
            store,
        )
    }

    pub fn with_parts(
        salts: impl SaltSource + 'static,
        ids: impl IdSource + 'static,
        deriver: impl PasswordDeriver + 'static,
        cipher: impl CipherEngine + 'static,
        store: impl Store + 'static,
    ) -> Self {
        Self {
            salts: Box::new(salts),
            ids: Box::new(ids),
            deriver: Box::new(deriver),
            cipher: Box::new(cipher),
            store: Box::new(store),
        }
    }

    /// Creates a repository administered by a new user account.
    ///
    /// Returns `(repository id, administrator user id)`.
    #[instrument(skip_all, fields(repo_label = %repo_label))]
    pub fn create_repository(
        &self,
        repo_label: &str,
        user_label: &str,
        password: &str,
    ) -> Result<(String, String)> {
        let salt = self.salts.generate(SALT_LEN)?;
        let admin = UserAccount::administrator(self.ids.generate(), user_label.to_string());
        let admin_id = admin.id().to_string();

        let mut repo = Repository::new(self.ids.generate(), repo_label.to_string(), admin);
        repo.write_secret(&admin_id, DEFAULT_SECRET_NAME, DEFAULT_SECRET_VALUE)?;

        let repo_key = SecretBytes::from(self.salts.generate(KEY_LEN)?);
        let wrapped = {
            let kek = self.deriver.derive(password.as_bytes(), &salt)?;
            let iv = self.salts.generate(IV_LEN)?;
            self.cipher.encrypt(&repo_key, &kek, &iv)?
        };
        let record = self.seal_repository(&repo, &repo_key)?;

        // nothing is persisted until every record has been produced
        self.store.put(Namespace::UserSalt, &admin_id, &salt)?;
        self.store.put(Namespace::WrappedRepoKey, &admin_id, &wrapped)?;
        self.store
            .put(Namespace::CipherRepository, repo.id(), &record)?;

        let repo_id = repo.id().to_string();
        info!(repo = %repo_id, user = %admin_id, "repository created");
        Ok((repo_id, admin_id))
    }

    #[instrument(skip_all, fields(repo = %repo_id, user = %user_id))]
    pub fn read_secret(
        &self,
        repo_id: &str,
        user_id: &str,
        password: &str,
        name: &str,
    ) -> Result<SecretBytes> {
        let repo_key = self.unlock(user_id, password)?;
        let repo = self.load_repository(repo_id, &repo_key)?;

        let secret = repo.read_secret(user_id, name)?;
        Ok(SecretBytes::from(secret.to_vec()))
    }

    /// Inserts or overwrites a secret and persists the repository.
    ///
    /// The stored repository is only replaced once the write was accepted.
    #[instrument(skip_all, fields(repo = %repo_id, user = %user_id))]
    pub fn write_secret(
        &self,
        repo_id: &str,
        user_id: &str,
        password: &str,
        name: &str,
        value: &[u8],
    ) -> Result<()> {
        let repo_key = self.unlock(user_id, password)?;
        let mut repo = self.load_repository(repo_id, &repo_key)?;

        repo.write_secret(user_id, name, value)?;
        self.save_repository(&repo, &repo_key)?;

        info!("secret written");
        Ok(())
    }

    #[instrument(skip_all, fields(repo = %repo_id, user = %user_id))]
    pub fn list_secret_names(
        &self,
        repo_id: &str,
        user_id: &str,
        password: &str,
    ) -> Result<Vec<String>> {
        let repo_key = self.unlock(user_id, password)?;
        let repo = self.load_repository(repo_id, &repo_key)?;

        repo.list_secret_names(user_id)
    }

    #[instrument(skip_all, fields(repo = %repo_id, user = %user_id))]
    pub fn describe(&self, repo_id: &str, user_id: &str, password: &str) -> Result<RepositoryInfo> {
        let repo_key = self.unlock(user_id, password)?;
        let repo = self.load_repository(repo_id, &repo_key)?;

        repo.info(user_id)
    }

    /// Releases the underlying store.
    pub fn close(self) -> Result<()> {
        self.store.close()
    }

    /// Recovers the repository key wrapped for `user_id`.
    ///
    /// A wrong password and a damaged record both surface as `Integrity`.
    fn unlock(&self, user_id: &str, password: &str) -> Result<SecretBytes> {
        let salt = self.fetch(Namespace::UserSalt, user_id)?;
        let wrapped = self.fetch(Namespace::WrappedRepoKey, user_id)?;

        let kek = self.deriver.derive(password.as_bytes(), &salt)?;
        self.cipher
            .decrypt(&wrapped, &kek)
            .map_err(|e| match e {
                CofferError::Integrity | CofferError::TruncatedRecord(_) => {
                    warn!(user = %user_id, "repository key unwrap failed");
                    CofferError::Integrity
                }
                other => other,
            })
    }

    fn load_repository(&self, repo_id: &str, repo_key: &[u8]) -> Result<Repository> {
        let record = self.fetch(Namespace::CipherRepository, repo_id)?;
        let encoded = self.cipher.decrypt(&record, repo_key)?;

        let repo: Repository = serde_json::from_slice(&encoded)?;
        debug!(bytes = encoded.len(), "repository decoded");
        Ok(repo)
    }

    /// Encrypts the repository under `repo_key` with a fresh IV.
    fn seal_repository(&self, repo: &Repository, repo_key: &[u8]) -> Result<Vec<u8>> {
        let encoded = encode_repository(repo)?;
        let iv = self.salts.generate(IV_LEN)?;
        self.cipher.encrypt(&encoded, repo_key, &iv)
    }

    fn save_repository(&self, repo: &Repository, repo_key: &[u8]) -> Result<()> {
        let record = self.seal_repository(repo, repo_key)?;
        self.store
            .put(Namespace::CipherRepository, repo.id(), &record)
    }

    fn fetch(&self, namespace: Namespace, key: &str) -> Result<Vec<u8>> {
        self.store
            .get(namespace, key)?
            .ok_or_else(|| CofferError::NotFound {
                namespace,
                key: key.to_string(),
            })
    }
}

/// Serializes `repo` into a buffer allocated once at its final size.
///
/// A growing `Vec` would leave freed copies of the plaintext behind on
/// every reallocation.
fn encode_repository(repo: &Repository) -> Result<SecretBytes> {
    let mut encoded = Vec::with_capacity(encoded_len(repo)?);
    serde_json::to_writer(&mut encoded, repo)?;
    Ok(SecretBytes::from(encoded))
}

fn encoded_len(repo: &Repository) -> Result<usize> {
    let mut counter = ByteCounter(0);
    serde_json::to_writer(&mut counter, repo)?;
    Ok(counter.0)
}

/// `io::Write` sink that only counts bytes.
struct ByteCounter(usize);

impl io::Write for ByteCounter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0 += buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// The store under the platform data directory.
pub fn default_store() -> anyhow::Result<DirStore> {
    let project_dirs =
        ProjectDirs::from("", "", "coffer").context("could not determine platform directories")?;

    let path = project_dirs.data_dir().join("store");

    Ok(DirStore::new(path))
}
