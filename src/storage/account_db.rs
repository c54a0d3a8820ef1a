// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded account and role database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `accounts`: account id → serialized [`Account`]
//! - `account_email_index`: `partition|email` → account id
//! - `account_phone_index`: `partition|phone` → account id
//! - `roles`: role id → serialized [`Role`]
//! - `role_names`: role name → role id
//!
//! [`AccountDb`] is synchronous. [`RedbStore`] wraps it for the async store
//! traits and runs every call on the blocking pool.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};

use super::{AccountStore, RoleStore, StoreError, StoreResult};
use crate::models::{Account, AccountUpdate, Partition, PermissionSet, Role};

// =============================================================================
// Table Definitions
// =============================================================================

const ACCOUNTS: TableDefinition<&str, &[u8]> = TableDefinition::new("accounts");

const EMAIL_INDEX: TableDefinition<&str, &str> = TableDefinition::new("account_email_index");

const PHONE_INDEX: TableDefinition<&str, &str> = TableDefinition::new("account_phone_index");

const ROLES: TableDefinition<&str, &[u8]> = TableDefinition::new("roles");

const ROLE_NAMES: TableDefinition<&str, &str> = TableDefinition::new("role_names");

// =============================================================================
// Index Key Helpers
// =============================================================================

fn index_key(partition: Partition, value: &str) -> String {
    format!("{}|{}", partition.as_str(), value)
}

// =============================================================================
// AccountDb
// =============================================================================

pub struct AccountDb {
    db: Database,
}

impl AccountDb {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Backend(format!("cannot create {}: {e}", parent.display()))
            })?;
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(ACCOUNTS)?;
            let _ = write_txn.open_table(EMAIL_INDEX)?;
            let _ = write_txn.open_table(PHONE_INDEX)?;
            let _ = write_txn.open_table(ROLES)?;
            let _ = write_txn.open_table(ROLE_NAMES)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    // =========================================================================
    // Accounts
    // =========================================================================

    pub fn get_account(&self, id: &str) -> StoreResult<Option<Account>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ACCOUNTS)?;
        match table.get(id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    fn find_indexed(
        &self,
        index: TableDefinition<&str, &str>,
        partition: Partition,
        value: &str,
    ) -> StoreResult<Option<Account>> {
        let read_txn = self.db.begin_read()?;
        let idx = read_txn.open_table(index)?;
        let id = match idx.get(index_key(partition, value).as_str())? {
            Some(id) => id.value().to_string(),
            None => return Ok(None),
        };
        let accounts = read_txn.open_table(ACCOUNTS)?;
        match accounts.get(id.as_str())? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    pub fn find_by_email(&self, partition: Partition, email: &str) -> StoreResult<Option<Account>> {
        self.find_indexed(EMAIL_INDEX, partition, email)
    }

    pub fn find_by_phone(&self, partition: Partition, phone: &str) -> StoreResult<Option<Account>> {
        self.find_indexed(PHONE_INDEX, partition, phone)
    }

    /// Insert an account together with its email/phone index entries.
    pub fn insert_account(&self, account: &Account) -> StoreResult<()> {
        let json = serde_json::to_vec(account)?;
        let partition = account.partition();

        let write_txn = self.db.begin_write()?;
        {
            let mut accounts = write_txn.open_table(ACCOUNTS)?;
            if accounts.get(account.id())?.is_some() {
                return Err(StoreError::AlreadyExists(format!("Account {}", account.id())));
            }

            let mut emails = write_txn.open_table(EMAIL_INDEX)?;
            if let Some(email) = account.email() {
                for peer in partition.email_peers() {
                    if emails.get(index_key(*peer, email).as_str())?.is_some() {
                        return Err(StoreError::AlreadyExists(
                            "Account with this email".to_string(),
                        ));
                    }
                }
                emails.insert(index_key(partition, email).as_str(), account.id())?;
            }

            let mut phones = write_txn.open_table(PHONE_INDEX)?;
            if let Some(phone) = account.phone_number() {
                let key = index_key(partition, phone);
                if phones.get(key.as_str())?.is_some() {
                    return Err(StoreError::AlreadyExists(
                        "Account with this phone number".to_string(),
                    ));
                }
                phones.insert(key.as_str(), account.id())?;
            }

            accounts.insert(account.id(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Read-modify-write an account inside one write transaction.
    fn modify_account<F>(&self, id: &str, apply: F) -> StoreResult<Account>
    where
        F: FnOnce(&mut Account),
    {
        let write_txn = self.db.begin_write()?;
        let account = {
            let mut accounts = write_txn.open_table(ACCOUNTS)?;
            let mut account: Account = match accounts.get(id)? {
                Some(value) => serde_json::from_slice(value.value())?,
                None => return Err(StoreError::NotFound(format!("Account {id}"))),
            };
            apply(&mut account);
            let json = serde_json::to_vec(&account)?;
            accounts.insert(id, json.as_slice())?;
            account
        };
        write_txn.commit()?;
        Ok(account)
    }

    pub fn update_account(&self, id: &str, update: &AccountUpdate) -> StoreResult<Account> {
        self.modify_account(id, |account| account.apply_update(update, Utc::now()))
    }

    pub fn assign_role(
        &self,
        id: &str,
        role_id: &str,
        permissions: &PermissionSet,
    ) -> StoreResult<Account> {
        self.modify_account(id, |account| {
            account.apply_role(role_id, permissions, Utc::now())
        })
    }

    pub fn count_accounts(&self) -> StoreResult<u64> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ACCOUNTS)?;
        Ok(table.len()?)
    }

    // =========================================================================
    // Roles
    // =========================================================================

    pub fn get_role(&self, id: &str) -> StoreResult<Option<Role>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ROLES)?;
        match table.get(id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    pub fn find_role_by_name(&self, name: &str) -> StoreResult<Option<Role>> {
        let read_txn = self.db.begin_read()?;
        let names = read_txn.open_table(ROLE_NAMES)?;
        let id = match names.get(name)? {
            Some(id) => id.value().to_string(),
            None => return Ok(None),
        };
        let roles = read_txn.open_table(ROLES)?;
        match roles.get(id.as_str())? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    pub fn create_role(&self, role: &Role) -> StoreResult<()> {
        let json = serde_json::to_vec(role)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut names = write_txn.open_table(ROLE_NAMES)?;
            if names.get(role.name.as_str())?.is_some() {
                return Err(StoreError::AlreadyExists(format!("Role named {}", role.name)));
            }
            names.insert(role.name.as_str(), role.id.as_str())?;

            let mut roles = write_txn.open_table(ROLES)?;
            roles.insert(role.id.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn update_role(&self, id: &str, permissions: &PermissionSet) -> StoreResult<Role> {
        let write_txn = self.db.begin_write()?;
        let role = {
            let mut roles = write_txn.open_table(ROLES)?;
            let mut role: Role = match roles.get(id)? {
                Some(value) => serde_json::from_slice(value.value())?,
                None => return Err(StoreError::NotFound(format!("Role {id}"))),
            };
            role.permissions = permissions.clone();
            role.updated_at = Utc::now();
            let json = serde_json::to_vec(&role)?;
            roles.insert(id, json.as_slice())?;
            role
        };
        write_txn.commit()?;
        Ok(role)
    }

    pub fn list_roles(&self) -> StoreResult<Vec<Role>> {
        let read_txn = self.db.begin_read()?;
        let names = read_txn.open_table(ROLE_NAMES)?;
        let roles = read_txn.open_table(ROLES)?;

        // role_names iterates in name order
        let mut out = Vec::new();
        for entry in names.iter()? {
            let (_, id) = entry?;
            if let Some(value) = roles.get(id.value())? {
                out.push(serde_json::from_slice(value.value())?);
            }
        }
        Ok(out)
    }
}

// =============================================================================
// RedbStore
// =============================================================================

/// Async store over [`AccountDb`].
#[derive(Clone)]
pub struct RedbStore {
    db: Arc<AccountDb>,
}

impl RedbStore {
    pub fn open(path: &Path) -> StoreResult<Self> {
        Ok(Self {
            db: Arc::new(AccountDb::open(path)?),
        })
    }

    async fn blocking<T, F>(&self, f: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&AccountDb) -> StoreResult<T> + Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| StoreError::Backend(format!("blocking task failed: {e}")))?
    }
}

#[async_trait]
impl AccountStore for RedbStore {
    async fn find_by_email(
        &self,
        partition: Partition,
        email: &str,
    ) -> StoreResult<Option<Account>> {
        let email = email.to_string();
        self.blocking(move |db| db.find_by_email(partition, &email))
            .await
    }

    async fn find_by_phone(
        &self,
        partition: Partition,
        phone_number: &str,
    ) -> StoreResult<Option<Account>> {
        let phone = phone_number.to_string();
        self.blocking(move |db| db.find_by_phone(partition, &phone))
            .await
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Account>> {
        let id = id.to_string();
        self.blocking(move |db| db.get_account(&id)).await
    }

    async fn insert_account(&self, account: Account) -> StoreResult<Account> {
        self.blocking(move |db| {
            db.insert_account(&account)?;
            Ok(account)
        })
        .await
    }

    async fn update_account(&self, id: &str, update: AccountUpdate) -> StoreResult<Account> {
        let id = id.to_string();
        self.blocking(move |db| db.update_account(&id, &update))
            .await
    }

    async fn assign_role(
        &self,
        id: &str,
        role_id: &str,
        permissions: &PermissionSet,
    ) -> StoreResult<Account> {
        let id = id.to_string();
        let role_id = role_id.to_string();
        let permissions = permissions.clone();
        self.blocking(move |db| db.assign_role(&id, &role_id, &permissions))
            .await
    }

    async fn health_check(&self) -> StoreResult<()> {
        self.blocking(|db| db.count_accounts().map(|_| ())).await
    }
}

#[async_trait]
impl RoleStore for RedbStore {
    async fn find_role_by_id(&self, id: &str) -> StoreResult<Option<Role>> {
        let id = id.to_string();
        self.blocking(move |db| db.get_role(&id)).await
    }

    async fn find_role_by_name(&self, name: &str) -> StoreResult<Option<Role>> {
        let name = name.to_string();
        self.blocking(move |db| db.find_role_by_name(&name)).await
    }

    async fn create_role(&self, name: &str, permissions: &PermissionSet) -> StoreResult<Role> {
        let role = Role::new(name, permissions.clone());
        self.blocking(move |db| {
            db.create_role(&role)?;
            Ok(role)
        })
        .await
    }

    async fn update_role(&self, id: &str, permissions: &PermissionSet) -> StoreResult<Role> {
        let id = id.to_string();
        let permissions = permissions.clone();
        self.blocking(move |db| db.update_role(&id, &permissions))
            .await
    }

    async fn list_roles(&self) -> StoreResult<Vec<Role>> {
        self.blocking(|db| db.list_roles()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AccountStatus, PasswordHash, StandardUser, SuperAdmin};
    use tempfile::TempDir;

    fn open_temp() -> (AccountDb, TempDir) {
        let dir = TempDir::new().unwrap();
        let db = AccountDb::open(&dir.path().join("accounts.redb")).unwrap();
        (db, dir)
    }

    fn user(email: &str) -> Account {
        Account::Standard(StandardUser::new(
            Some(email.to_string()),
            Some("+15550001".to_string()),
            PasswordHash("hash".to_string()),
            None,
        ))
    }

    fn perms(items: &[&str]) -> PermissionSet {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn insert_and_lookup_by_indexes() {
        let (db, _dir) = open_temp();
        let account = user("a@b.com");
        db.insert_account(&account).unwrap();

        let found = db.find_by_email(Partition::Standard, "a@b.com").unwrap();
        assert_eq!(found, Some(account.clone()));

        let found = db.find_by_phone(Partition::Standard, "+15550001").unwrap();
        assert_eq!(found.map(|a| a.id().to_string()), Some(account.id().to_string()));

        assert!(db
            .find_by_email(Partition::SuperAdmin, "a@b.com")
            .unwrap()
            .is_none());
        assert_eq!(db.count_accounts().unwrap(), 1);
    }

    #[test]
    fn duplicate_email_in_partition_is_rejected() {
        let (db, _dir) = open_temp();
        db.insert_account(&user("a@b.com")).unwrap();

        let mut other = StandardUser::new(
            Some("a@b.com".to_string()),
            None,
            PasswordHash("hash".to_string()),
            None,
        );
        other.phone_number = None;
        let result = db.insert_account(&Account::Standard(other));
        assert!(matches!(result, Err(StoreError::AlreadyExists(_))));
        assert_eq!(db.count_accounts().unwrap(), 1);
    }

    #[test]
    fn super_admin_email_cannot_be_reused_by_standard_user() {
        let (db, _dir) = open_temp();
        let admin = Account::SuperAdmin(SuperAdmin::new(
            "Root",
            "root@b.com",
            PasswordHash("h".to_string()),
            PermissionSet::new(),
        ));
        db.insert_account(&admin).unwrap();

        let result = db.insert_account(&user("root@b.com"));
        assert!(matches!(result, Err(StoreError::AlreadyExists(_))));

        // The other direction is refused too
        db.insert_account(&user("a@b.com")).unwrap();
        let admin = Account::SuperAdmin(SuperAdmin::new(
            "Other",
            "a@b.com",
            PasswordHash("h".to_string()),
            PermissionSet::new(),
        ));
        assert!(matches!(
            db.insert_account(&admin),
            Err(StoreError::AlreadyExists(_))
        ));
        assert_eq!(db.count_accounts().unwrap(), 2);
        let found = db.find_by_email(Partition::SuperAdmin, "root@b.com").unwrap();
        assert!(found.is_some_and(|a| a.is_super_admin()));
    }

    #[test]
    fn open_reports_unusable_parent_directory() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"").unwrap();

        let result = AccountDb::open(&blocker.join("accounts.redb"));
        assert!(matches!(result, Err(StoreError::Backend(_))));
    }

    #[test]
    fn assign_role_persists_role_and_permissions() {
        let (db, _dir) = open_temp();
        let account = user("a@b.com");
        db.insert_account(&account).unwrap();

        db.assign_role(account.id(), "role-1", &perms(&["read_blog", "create_blog"]))
            .unwrap();

        let stored = db.get_account(account.id()).unwrap().unwrap();
        assert_eq!(stored.role_id(), Some("role-1"));
        assert_eq!(stored.permissions(), &perms(&["create_blog", "read_blog"]));
    }

    #[test]
    fn update_account_changes_status() {
        let (db, _dir) = open_temp();
        let account = user("a@b.com");
        db.insert_account(&account).unwrap();

        let update = AccountUpdate {
            status: Some(AccountStatus::Suspended),
            address: None,
        };
        let updated = db.update_account(account.id(), &update).unwrap();
        assert_eq!(updated.status(), AccountStatus::Suspended);

        let missing = db.update_account("nope", &update);
        assert!(matches!(missing, Err(StoreError::NotFound(_))));
    }

    #[test]
    fn roles_are_listed_by_name_and_names_are_unique() {
        let (db, _dir) = open_temp();
        db.create_role(&Role::new("zeta", perms(&["read_blog"]))).unwrap();
        db.create_role(&Role::new("alpha", perms(&[]))).unwrap();

        let dup = db.create_role(&Role::new("alpha", perms(&[])));
        assert!(matches!(dup, Err(StoreError::AlreadyExists(_))));

        let names: Vec<String> = db.list_roles().unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[test]
    fn update_role_replaces_set() {
        let (db, _dir) = open_temp();
        let role = Role::new("editor", perms(&["read_blog", "update_blog"]));
        db.create_role(&role).unwrap();

        db.update_role(&role.id, &perms(&["delete_blog"])).unwrap();
        let stored = db.find_role_by_name("editor").unwrap().unwrap();
        assert_eq!(stored.permissions, perms(&["delete_blog"]));
    }

    #[test]
    fn data_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("accounts.redb");
        let account = user("a@b.com");
        {
            let db = AccountDb::open(&path).unwrap();
            db.insert_account(&account).unwrap();
        }
        let db = AccountDb::open(&path).unwrap();
        assert!(db.get_account(account.id()).unwrap().is_some());
    }

    #[tokio::test]
    async fn async_store_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = RedbStore::open(&dir.path().join("accounts.redb")).unwrap();

        let account = store.insert_account(user("a@b.com")).await.unwrap();
        let role = store.create_role("editor", &perms(&["read_blog"])).await.unwrap();
        let updated = store
            .assign_role(account.id(), &role.id, &role.permissions)
            .await
            .unwrap();
        assert_eq!(updated.role_id(), Some(role.id.as_str()));

        let by_email = store
            .find_by_email(Partition::Standard, "a@b.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_email.permissions(), &perms(&["read_blog"]));
        assert!(store.health_check().await.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_assignments_never_expose_mixed_pairs() {
        let dir = TempDir::new().unwrap();
        let store = RedbStore::open(&dir.path().join("accounts.redb")).unwrap();
        let account = store.insert_account(user("a@b.com")).await.unwrap();
        let a = store.create_role("a", &perms(&["read_blog"])).await.unwrap();
        let b = store
            .create_role("b", &perms(&["create_blog", "update_blog"]))
            .await
            .unwrap();

        let mut writers = Vec::new();
        for i in 0..40 {
            let store = store.clone();
            let id = account.id().to_string();
            let role = if i % 2 == 0 { a.clone() } else { b.clone() };
            writers.push(tokio::spawn(async move {
                store.assign_role(&id, &role.id, &role.permissions).await.unwrap();
            }));
        }

        let reader_store = store.clone();
        let id = account.id().to_string();
        let (a2, b2) = (a.clone(), b.clone());
        let reader = tokio::spawn(async move {
            for _ in 0..200 {
                let seen = reader_store.find_by_id(&id).await.unwrap().unwrap();
                match seen.role_id() {
                    None => assert!(seen.permissions().is_empty()),
                    Some(r) if r == a2.id => assert_eq!(seen.permissions(), &a2.permissions),
                    Some(r) if r == b2.id => assert_eq!(seen.permissions(), &b2.permissions),
                    Some(other) => panic!("unexpected role {other}"),
                }
            }
        });

        for w in writers {
            w.await.unwrap();
        }
        reader.await.unwrap();
    }
}
