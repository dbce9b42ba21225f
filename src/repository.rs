use crate::error::{CofferError, Result};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::mem;
use std::str::FromStr;
use zeroize::Zeroize;

/// A named capability a user account may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Right {
    ReadSecret,
    WriteSecret,
    AdminUserAccounts,
}

impl Right {
    pub const ALL: [Right; 3] = [Right::ReadSecret, Right::WriteSecret, Right::AdminUserAccounts];

    pub fn name(&self) -> &'static str {
        match self {
            Right::ReadSecret => "ReadSecret",
            Right::WriteSecret => "WriteSecret",
            Right::AdminUserAccounts => "AdminUserAccounts",
        }
    }
}

impl fmt::Display for Right {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Right {
    type Err = CofferError;

    fn from_str(s: &str) -> Result<Self> {
        Right::ALL
            .into_iter()
            .find(|right| right.name() == s)
            .ok_or_else(|| CofferError::UnknownRight(s.to_string()))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct UserAccount {
    id: String,
    label: String,
    can_read_secret: bool,
    can_write_secret: bool,
    can_admin_user_accounts: bool,
}

impl UserAccount {
    pub fn with_rights(id: String, label: String, rights: &[Right]) -> Self {
        Self {
            id,
            label,
            can_read_secret: rights.contains(&Right::ReadSecret),
            can_write_secret: rights.contains(&Right::WriteSecret),
            can_admin_user_accounts: rights.contains(&Right::AdminUserAccounts),
        }
    }

    /// The account that creates a repository holds every right.
    pub fn administrator(id: String, label: String) -> Self {
        Self::with_rights(id, label, &Right::ALL)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn has_right(&self, right: Right) -> bool {
        match right {
            Right::ReadSecret => self.can_read_secret,
            Right::WriteSecret => self.can_write_secret,
            Right::AdminUserAccounts => self.can_admin_user_accounts,
        }
    }
}

impl Zeroize for UserAccount {
    fn zeroize(&mut self) {
        self.id.zeroize();
        self.label.zeroize();
        self.can_read_secret = false;
        self.can_write_secret = false;
        self.can_admin_user_accounts = false;
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct RepositoryInfo {
    pub id: String,
    pub label: String,
    pub created: String,
    pub accounts: usize,
    pub secrets: usize,
}

impl fmt::Display for RepositoryInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Repository: {} ({})", self.label, self.id)?;
        writeln!(f, "Created:    {}", self.created)?;
        writeln!(f, "Accounts:   {}", self.accounts)?;
        write!(f, "Secrets:    {}", self.secrets)
    }
}

/// The decrypted aggregate: accounts, their rights, and named secrets.
///
/// Cleared on drop, so a decoded repository never outlives the operation
/// that unlocked it with its contents intact.
#[derive(Serialize, Deserialize, Default)]
pub struct Repository {
    id: String,
    label: String,
    created: String,
    user_accounts: BTreeMap<String, UserAccount>,
    secrets: BTreeMap<String, Vec<u8>>,
}

impl Repository {
    pub fn new(id: String, label: String, admin: UserAccount) -> Self {
        let mut user_accounts = BTreeMap::new();
        user_accounts.insert(admin.id().to_string(), admin);
        Repository {
            id,
            label,
            created: Local::now().to_rfc3339(),
            user_accounts,
            secrets: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn created(&self) -> &str {
        &self.created
    }

    pub fn account_count(&self) -> usize {
        self.user_accounts.len()
    }

    pub fn secret_count(&self) -> usize {
        self.secrets.len()
    }

    pub fn find_account(&self, user_id: &str) -> Result<&UserAccount> {
        self.user_accounts
            .get(user_id)
            .ok_or_else(|| CofferError::UnknownAccount(user_id.to_string()))
    }

    /// Checks a right given by name.
    ///
    /// An unrecognised name is `UnknownRight`; a recognised right the account
    /// lacks is `Forbidden`.
    pub fn check_right(&self, account: &UserAccount, right_name: &str) -> Result<()> {
        let right = right_name.parse::<Right>()?;
        require(account, right)
    }

    pub fn read_secret(&self, user_id: &str, name: &str) -> Result<&[u8]> {
        let account = self.find_account(user_id)?;
        require(account, Right::ReadSecret)?;

        self.secrets
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| CofferError::UnknownSecret(name.to_string()))
    }

    /// Inserts or overwrites a secret. There is no versioning.
    pub fn write_secret(&mut self, user_id: &str, name: &str, value: &[u8]) -> Result<()> {
        let account = self.find_account(user_id)?;
        require(account, Right::WriteSecret)?;

        // copied only once the write is allowed
        if let Some(mut previous) = self.secrets.insert(name.to_string(), value.to_vec()) {
            previous.zeroize();
        }
        Ok(())
    }

    pub fn list_secret_names(&self, user_id: &str) -> Result<Vec<String>> {
        let account = self.find_account(user_id)?;
        require(account, Right::ReadSecret)?;

        Ok(self.secrets.keys().cloned().collect())
    }

    /// Summary of the repository, visible to accounts that may read secrets.
    pub fn info(&self, user_id: &str) -> Result<RepositoryInfo> {
        let account = self.find_account(user_id)?;
        require(account, Right::ReadSecret)?;

        Ok(RepositoryInfo {
            id: self.id.clone(),
            label: self.label.clone(),
            created: self.created.clone(),
            accounts: self.user_accounts.len(),
            secrets: self.secrets.len(),
        })
    }

    #[cfg(test)]
    pub(crate) fn insert_account(&mut self, account: UserAccount) {
        self.user_accounts.insert(account.id().to_string(), account);
    }
}

fn require(account: &UserAccount, right: Right) -> Result<()> {
    if account.has_right(right) {
        Ok(())
    } else {
        Err(CofferError::Forbidden {
            user: account.id().to_string(),
            right,
        })
    }
}

impl Zeroize for Repository {
    fn zeroize(&mut self) {
        self.id.zeroize();
        self.label.zeroize();
        self.created.zeroize();
        for (mut id, mut account) in mem::take(&mut self.user_accounts) {
            id.zeroize();
            account.zeroize();
        }
        for (mut name, mut value) in mem::take(&mut self.secrets) {
            name.zeroize();
            value.zeroize();
        }
    }
}

impl Drop for Repository {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl fmt::Debug for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("created", &self.created)
            .field("user_accounts", &self.user_accounts.len())
            .field("secrets", &self.secrets.len())
            .finish()
    }
}
