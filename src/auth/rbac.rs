// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # RBAC Engine
//!
//! Role management and role assignment.
//!
//! Every permission set is checked against the [`PermissionRegistry`] before
//! anything is written; an unknown permission rejects the whole operation.
//! Role assignment writes the account's role id and permission set together
//! through [`AccountStore::assign_role`].
//!
//! Super-admins hold the full permission set from creation and are never
//! re-assigned a role or suspended through this engine.

use std::sync::Arc;

use super::password::hash_password_blocking;
use super::permissions::PermissionRegistry;
use super::AuthError;
use crate::config::BootstrapAdmin;
use crate::models::{
    Account, AccountStatus, AccountUpdate, Partition, PermissionSet, Role, SuperAdmin,
};
use crate::storage::{AccountStore, RoleStore, StoreError};
use crate::telemetry::AUDIT_TARGET;

#[derive(Clone)]
pub struct RbacEngine {
    registry: Arc<PermissionRegistry>,
    roles: Arc<dyn RoleStore>,
    accounts: Arc<dyn AccountStore>,
}

impl RbacEngine {
    pub fn new(
        registry: Arc<PermissionRegistry>,
        roles: Arc<dyn RoleStore>,
        accounts: Arc<dyn AccountStore>,
    ) -> Self {
        Self {
            registry,
            roles,
            accounts,
        }
    }

    pub fn registry(&self) -> &PermissionRegistry {
        &self.registry
    }

    /// Check every permission against the registry, failing on the first
    /// unknown one.
    pub fn validate_permission_set<I, S>(&self, permissions: I) -> Result<PermissionSet, AuthError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = PermissionSet::new();
        for permission in permissions {
            let permission = permission.as_ref();
            if !self.registry.is_valid_permission(permission) {
                return Err(AuthError::InvalidPermissionsName {
                    name: permission.to_string(),
                });
            }
            set.insert(permission.to_string());
        }
        Ok(set)
    }

    pub async fn create_role(&self, name: &str, permissions: &[String]) -> Result<Role, AuthError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AuthError::InvalidRequest("Role Name Is Required"));
        }
        let set = self.validate_permission_set(permissions)?;
        let role = self.roles.create_role(name, &set).await?;

        tracing::info!(
            target: AUDIT_TARGET,
            role_id = %role.id,
            role = %role.name,
            permissions = role.permissions.len(),
            "role created"
        );
        Ok(role)
    }

    /// Replace a role's permission set (not a merge).
    pub async fn update_role(
        &self,
        role_id: &str,
        permissions: &[String],
    ) -> Result<Role, AuthError> {
        let set = self.validate_permission_set(permissions)?;
        let role = self
            .roles
            .update_role(role_id, &set)
            .await
            .map_err(|e| match e {
                StoreError::NotFound(_) => AuthError::RoleNotFound {
                    role_id: role_id.to_string(),
                },
                other => other.into(),
            })?;

        tracing::info!(
            target: AUDIT_TARGET,
            role_id,
            permissions = role.permissions.len(),
            "role updated"
        );
        Ok(role)
    }

    /// Give an account a role's permissions.
    ///
    /// The role's set is re-validated in case it no longer matches the
    /// registry. Role id and permissions are written in one store operation.
    pub async fn assign_role(&self, account_id: &str, role_id: &str) -> Result<Account, AuthError> {
        let role = self
            .roles
            .find_role_by_id(role_id)
            .await?
            .ok_or_else(|| AuthError::RoleNotFound {
                role_id: role_id.to_string(),
            })?;
        let permissions = self.validate_permission_set(&role.permissions)?;

        let account = self.find_mutable_account(account_id).await?;

        let updated = self
            .accounts
            .assign_role(account.id(), &role.id, &permissions)
            .await
            .map_err(|e| not_found_as_account(e, account_id))?;

        tracing::info!(
            target: AUDIT_TARGET,
            account_id,
            role_id = %role.id,
            "role assigned"
        );
        Ok(updated)
    }

    pub async fn set_account_status(
        &self,
        account_id: &str,
        status: AccountStatus,
    ) -> Result<Account, AuthError> {
        let account = self.find_mutable_account(account_id).await?;
        let update = AccountUpdate {
            status: Some(status),
            address: None,
        };
        let updated = self
            .accounts
            .update_account(account.id(), update)
            .await
            .map_err(|e| not_found_as_account(e, account_id))?;

        tracing::info!(
            target: AUDIT_TARGET,
            account_id,
            status = %status,
            "account status changed"
        );
        Ok(updated)
    }

    pub async fn list_roles(&self) -> Result<Vec<Role>, AuthError> {
        Ok(self.roles.list_roles().await?)
    }

    /// Create the configured super-admin unless one with that email exists.
    ///
    /// Fails with [`AuthError::Conflict`] when a standard user already holds
    /// the email, since email login would resolve to that user instead.
    pub async fn ensure_super_admin(&self, admin: &BootstrapAdmin) -> Result<Account, AuthError> {
        if let Some(existing) = self
            .accounts
            .find_by_email(Partition::SuperAdmin, &admin.email)
            .await?
        {
            tracing::info!(account_id = %existing.id(), "super-admin already present");
            return Ok(existing);
        }

        if let Some(holder) = self
            .accounts
            .find_by_email(Partition::Standard, &admin.email)
            .await?
        {
            tracing::warn!(
                target: AUDIT_TARGET,
                account_id = %holder.id(),
                "super-admin email is held by a standard user"
            );
            return Err(AuthError::Conflict(
                "Super-admin email is held by another account".to_string(),
            ));
        }

        let hash = hash_password_blocking(admin.password.clone()).await?;
        let account = Account::SuperAdmin(SuperAdmin::new(
            admin.name.clone(),
            admin.email.clone(),
            hash,
            self.registry.all(),
        ));
        let created = self.accounts.insert_account(account).await?;
        tracing::info!(target: AUDIT_TARGET, account_id = %created.id(), "super-admin created");
        Ok(created)
    }

    async fn find_mutable_account(&self, account_id: &str) -> Result<Account, AuthError> {
        let account = self
            .accounts
            .find_by_id(account_id)
            .await?
            .ok_or_else(|| AuthError::AccountNotFound {
                identifier: account_id.to_string(),
            })?;
        if account.is_super_admin() {
            return Err(AuthError::PermissionDenied {
                reason: "super-admin accounts are fixed",
            });
        }
        Ok(account)
    }
}

fn not_found_as_account(err: StoreError, account_id: &str) -> AuthError {
    match err {
        StoreError::NotFound(_) => AuthError::AccountNotFound {
            identifier: account_id.to_string(),
        },
        other => other.into(),
    }
}
