// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory account and role store.
//!
//! Used for development (no `DATA_DIR`) and throughout the test suite.
//! All state sits behind a single `RwLock`, so every mutation is atomic with
//! respect to readers.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{AccountStore, RoleStore, StoreError, StoreResult};
use crate::models::{Account, AccountUpdate, Partition, PermissionSet, Role};

#[derive(Default)]
struct Inner {
    accounts: HashMap<String, Account>,
    roles: HashMap<String, Role>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn account_count(&self) -> usize {
        self.inner.read().await.accounts.len()
    }

    pub async fn role_count(&self) -> usize {
        self.inner.read().await.roles.len()
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn find_by_email(
        &self,
        partition: Partition,
        email: &str,
    ) -> StoreResult<Option<Account>> {
        let inner = self.inner.read().await;
        Ok(inner
            .accounts
            .values()
            .find(|a| a.partition() == partition && a.email() == Some(email))
            .cloned())
    }

    async fn find_by_phone(
        &self,
        partition: Partition,
        phone_number: &str,
    ) -> StoreResult<Option<Account>> {
        let inner = self.inner.read().await;
        Ok(inner
            .accounts
            .values()
            .find(|a| a.partition() == partition && a.phone_number() == Some(phone_number))
            .cloned())
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Account>> {
        Ok(self.inner.read().await.accounts.get(id).cloned())
    }

    async fn insert_account(&self, account: Account) -> StoreResult<Account> {
        let mut inner = self.inner.write().await;

        if inner.accounts.contains_key(account.id()) {
            return Err(StoreError::AlreadyExists(format!("Account {}", account.id())));
        }

        let partition = account.partition();
        let email_peers = partition.email_peers();
        for existing in inner.accounts.values() {
            if account.email().is_some()
                && existing.email() == account.email()
                && email_peers.contains(&existing.partition())
            {
                return Err(StoreError::AlreadyExists("Account with this email".to_string()));
            }
            if account.phone_number().is_some()
                && existing.phone_number() == account.phone_number()
                && existing.partition() == partition
            {
                return Err(StoreError::AlreadyExists(
                    "Account with this phone number".to_string(),
                ));
            }
        }

        inner
            .accounts
            .insert(account.id().to_string(), account.clone());
        Ok(account)
    }

    async fn update_account(&self, id: &str, update: AccountUpdate) -> StoreResult<Account> {
        let mut inner = self.inner.write().await;
        let account = inner
            .accounts
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("Account {id}")))?;
        account.apply_update(&update, Utc::now());
        Ok(account.clone())
    }

    async fn assign_role(
        &self,
        id: &str,
        role_id: &str,
        permissions: &PermissionSet,
    ) -> StoreResult<Account> {
        let mut inner = self.inner.write().await;
        let account = inner
            .accounts
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("Account {id}")))?;
        account.apply_role(role_id, permissions, Utc::now());
        Ok(account.clone())
    }
}

#[async_trait]
impl RoleStore for MemoryStore {
    async fn find_role_by_id(&self, id: &str) -> StoreResult<Option<Role>> {
        Ok(self.inner.read().await.roles.get(id).cloned())
    }

    async fn find_role_by_name(&self, name: &str) -> StoreResult<Option<Role>> {
        let inner = self.inner.read().await;
        Ok(inner.roles.values().find(|r| r.name == name).cloned())
    }

    async fn create_role(&self, name: &str, permissions: &PermissionSet) -> StoreResult<Role> {
        let mut inner = self.inner.write().await;
        if inner.roles.values().any(|r| r.name == name) {
            return Err(StoreError::AlreadyExists(format!("Role named {name}")));
        }
        let role = Role::new(name, permissions.clone());
        inner.roles.insert(role.id.clone(), role.clone());
        Ok(role)
    }

    async fn update_role(&self, id: &str, permissions: &PermissionSet) -> StoreResult<Role> {
        let mut inner = self.inner.write().await;
        let role = inner
            .roles
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("Role {id}")))?;
        role.permissions = permissions.clone();
        role.updated_at = Utc::now();
        Ok(role.clone())
    }

    async fn list_roles(&self) -> StoreResult<Vec<Role>> {
        let inner = self.inner.read().await;
        let mut roles: Vec<Role> = inner.roles.values().cloned().collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }
}
