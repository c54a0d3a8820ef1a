// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Account and Role Storage
//!
//! The authorization core talks to persistence only through the
//! [`AccountStore`] and [`RoleStore`] traits. Two backends ship with the
//! service:
//!
//! - [`MemoryStore`] - process-local maps behind one async `RwLock`
//! - [`RedbStore`] - embedded ACID database (redb), used when `DATA_DIR` is set
//!
//! ## Atomicity
//!
//! [`AccountStore::assign_role`] writes an account's role id and permission
//! set in a single write (one lock guard / one redb write transaction). A
//! concurrent reader sees either the old pair or the new pair, never a mix.
//! Concurrent assignments to the same account are last-writer-wins.

pub mod account_db;
pub mod memory;

use async_trait::async_trait;

use crate::models::{Account, AccountUpdate, Partition, PermissionSet, Role};

pub use account_db::RedbStore;
pub use memory::MemoryStore;

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),
}

pub type StoreResult<T> = Result<T, StoreError>;

// =============================================================================
// Store traits
// =============================================================================

/// Persistence for accounts across all partitions.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Look up an account by email inside one partition.
    async fn find_by_email(&self, partition: Partition, email: &str)
        -> StoreResult<Option<Account>>;

    /// Look up an account by phone number inside one partition.
    async fn find_by_phone(
        &self,
        partition: Partition,
        phone_number: &str,
    ) -> StoreResult<Option<Account>>;

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Account>>;

    /// Insert a new account. Fails with `AlreadyExists` when the id, or the
    /// email / phone number within the account's partition, is taken.
    async fn insert_account(&self, account: Account) -> StoreResult<Account>;

    /// Apply a partial update to mutable fields.
    async fn update_account(&self, id: &str, update: AccountUpdate) -> StoreResult<Account>;

    /// Atomically replace an account's role id and permission set.
    async fn assign_role(
        &self,
        id: &str,
        role_id: &str,
        permissions: &PermissionSet,
    ) -> StoreResult<Account>;

    /// Cheap reachability probe used by the readiness endpoint.
    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// Persistence for roles.
#[async_trait]
pub trait RoleStore: Send + Sync {
    async fn find_role_by_id(&self, id: &str) -> StoreResult<Option<Role>>;

    async fn find_role_by_name(&self, name: &str) -> StoreResult<Option<Role>>;

    /// Persist a new role. Role names are unique.
    async fn create_role(&self, name: &str, permissions: &PermissionSet) -> StoreResult<Role>;

    /// Replace a role's full permission set.
    async fn update_role(&self, id: &str, permissions: &PermissionSet) -> StoreResult<Role>;

    async fn list_roles(&self) -> StoreResult<Vec<Role>>;
}
