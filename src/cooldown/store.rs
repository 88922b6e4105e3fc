//! Durable storage of per-category next-allowed timestamps.
//!
//! The broker's rate-limit correctness depends on these timestamps surviving
//! a process restart, so the default store is backed by redb. Timestamps are
//! epoch milliseconds; an absent record means the category has never been
//! called ("cold start").

use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

use redb::{Database, ReadableTable, TableDefinition};
use thiserror::Error;

use crate::category::Category;

const COOLDOWNS: TableDefinition<&str, i64> = TableDefinition::new("api_cooldowns");

/// Errors surfaced by cool-down store implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open cool-down database: {0}")]
    Open(#[from] redb::DatabaseError),
    #[error("cool-down transaction failed: {0}")]
    Transaction(#[from] redb::TransactionError),
    #[error("cool-down table unavailable: {0}")]
    Table(#[from] redb::TableError),
    #[error("cool-down storage failure: {0}")]
    Storage(#[from] redb::StorageError),
    #[error("cool-down commit failed: {0}")]
    Commit(#[from] redb::CommitError),
    #[error("cool-down store lock poisoned")]
    Poisoned,
}

/// Keyed store of the earliest epoch-millisecond at which each category may
/// issue its next call.
///
/// Single-writer discipline: only the broker worker calls
/// [`set_next_allowed`](CooldownStore::set_next_allowed); any number of
/// readers may call [`next_allowed`](CooldownStore::next_allowed).
pub trait CooldownStore: Send + Sync {
    /// Earliest allowed call time for `category`, or `None` for a cold start.
    fn next_allowed(&self, category: Category) -> Result<Option<i64>, StoreError>;

    /// Upserts the earliest allowed call time for `category`.
    fn set_next_allowed(&self, category: Category, epoch_ms: i64) -> Result<(), StoreError>;
}

/// redb-backed store, durable across process restarts.
pub struct RedbCooldownStore {
    db: Database,
}

impl RedbCooldownStore {
    /// Opens (or creates) the database at `path` and ensures the cool-down
    /// table exists so later reads never observe a missing table.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = Database::create(path)?;
        let txn = db.begin_write()?;
        txn.open_table(COOLDOWNS)?;
        txn.commit()?;
        Ok(Self { db })
    }
}

impl CooldownStore for RedbCooldownStore {
    fn next_allowed(&self, category: Category) -> Result<Option<i64>, StoreError> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(COOLDOWNS)?;
        Ok(table.get(category.key())?.map(|guard| guard.value()))
    }

    fn set_next_allowed(&self, category: Category, epoch_ms: i64) -> Result<(), StoreError> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(COOLDOWNS)?;
            table.insert(category.key(), epoch_ms)?;
        }
        txn.commit()?;
        Ok(())
    }
}

/// In-memory store for tests and callers that accept losing cool-downs on
/// restart.
#[derive(Debug, Default)]
pub struct MemoryCooldownStore {
    inner: RwLock<HashMap<Category, i64>>,
}

impl MemoryCooldownStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CooldownStore for MemoryCooldownStore {
    fn next_allowed(&self, category: Category) -> Result<Option<i64>, StoreError> {
        let guard = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        Ok(guard.get(&category).copied())
    }

    fn set_next_allowed(&self, category: Category, epoch_ms: i64) -> Result<(), StoreError> {
        let mut guard = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        guard.insert(category, epoch_ms);
        Ok(())
    }
}
