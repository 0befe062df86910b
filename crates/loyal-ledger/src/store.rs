//! Keyed account storage for one venue

use loyal_core::{Address, ProgramId};
use std::collections::BTreeMap;

/// A stored account: owning program plus encoded record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAccount {
    /// Program allowed to write this account
    pub owner: ProgramId,
    /// Discriminator-prefixed record bytes
    pub data: Vec<u8>,
}

impl StoredAccount {
    /// Create a stored account
    pub fn new(owner: ProgramId, data: Vec<u8>) -> Self {
        Self { owner, data }
    }
}

/// Accounts held by one venue
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountStore {
    accounts: BTreeMap<Address, StoredAccount>,
}

impl AccountStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an account
    pub fn get(&self, address: &Address) -> Option<&StoredAccount> {
        self.accounts.get(address)
    }

    /// Whether an account exists
    pub fn contains(&self, address: &Address) -> bool {
        self.accounts.contains_key(address)
    }

    /// Insert or overwrite an account
    pub fn insert(&mut self, address: Address, account: StoredAccount) {
        self.accounts.insert(address, account);
    }

    /// Remove an account
    pub fn remove(&mut self, address: &Address) -> Option<StoredAccount> {
        self.accounts.remove(address)
    }

    /// Number of accounts
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Iterate over all accounts in address order
    pub fn iter(&self) -> impl Iterator<Item = (&Address, &StoredAccount)> {
        self.accounts.iter()
    }
}
