// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Account and Role Models
//!
//! Authenticatable principals live in three partitions:
//!
//! - **Standard users** - password login, category, phone, account status
//! - **Passwordless users** - phone-based, no password
//! - **Super-admins** - email-based, always hold every registered permission
//!
//! [`Account`] is the tagged union over those partitions. Everything above the
//! storage layer works with `Account` and never needs to know which table a
//! principal came from.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A set of permission strings, ordered for stable serialization.
pub type PermissionSet = BTreeSet<String>;

// =============================================================================
// Category
// =============================================================================

/// Coarse classification of an account, embedded in session claims.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    /// Regular shopper account
    #[default]
    User,
    /// Dropship vendor
    Vendor,
    /// Back-office staff
    Admin,
    /// Platform owner
    SuperAdmin,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::User => "USER",
            Category::Vendor => "VENDOR",
            Category::Admin => "ADMIN",
            Category::SuperAdmin => "SUPER_ADMIN",
        }
    }

    /// Parse a category (case-insensitive).
    pub fn parse(s: &str) -> Option<Category> {
        match s.to_ascii_uppercase().as_str() {
            "USER" => Some(Category::User),
            "VENDOR" => Some(Category::Vendor),
            "ADMIN" => Some(Category::Admin),
            "SUPER_ADMIN" => Some(Category::SuperAdmin),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Account status
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountStatus {
    #[default]
    Active,
    Suspended,
    Banned,
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountStatus::Active => f.write_str("ACTIVE"),
            AccountStatus::Suspended => f.write_str("SUSPENDED"),
            AccountStatus::Banned => f.write_str("BANNED"),
        }
    }
}

// =============================================================================
// Partitions
// =============================================================================

/// Storage partition an account belongs to.
///
/// Phone numbers are unique within a partition. Emails are unique across
/// every partition email login searches (see [`Partition::email_peers`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Partition {
    Standard,
    Passwordless,
    SuperAdmin,
}

impl Partition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Partition::Standard => "standard",
            Partition::Passwordless => "passwordless",
            Partition::SuperAdmin => "super_admin",
        }
    }

    /// Partitions that share one email namespace with `self`.
    ///
    /// Email login searches standard users before super-admins, so an email
    /// held in either partition is taken in both.
    pub fn email_peers(&self) -> &'static [Partition] {
        match self {
            Partition::Standard | Partition::SuperAdmin => {
                &[Partition::Standard, Partition::SuperAdmin]
            }
            Partition::Passwordless => &[Partition::Passwordless],
        }
    }
}

// =============================================================================
// Password hash
// =============================================================================

/// PHC-formatted password hash. Never printed by `Debug`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PasswordHash(pub String);

impl PasswordHash {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordHash(<redacted>)")
    }
}

// =============================================================================
// Account variants
// =============================================================================

/// Password-based account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandardUser {
    pub id: String,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub password_hash: PasswordHash,
    pub category: Category,
    pub status: AccountStatus,
    /// Wallet or shipping address carried into session claims
    pub address: Option<String>,
    pub role_id: Option<String>,
    pub permissions: PermissionSet,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StandardUser {
    pub fn new(
        email: Option<String>,
        phone_number: Option<String>,
        password_hash: PasswordHash,
        address: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            email,
            phone_number,
            password_hash,
            category: Category::User,
            status: AccountStatus::Active,
            address,
            role_id: None,
            permissions: PermissionSet::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Phone-based account without a password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordlessUser {
    pub id: String,
    pub email: Option<String>,
    pub phone_number: String,
    pub category: Category,
    pub status: AccountStatus,
    pub role_id: Option<String>,
    pub permissions: PermissionSet,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PasswordlessUser {
    pub fn new(phone_number: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            email: None,
            phone_number: phone_number.into(),
            category: Category::User,
            status: AccountStatus::Active,
            role_id: None,
            permissions: PermissionSet::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Platform owner account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuperAdmin {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: PasswordHash,
    pub permissions: PermissionSet,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SuperAdmin {
    /// Create a super-admin. Callers pass the registry's complete permission set.
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        password_hash: PasswordHash,
        permissions: PermissionSet,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            email: email.into(),
            password_hash,
            permissions,
            created_at: now,
            updated_at: now,
        }
    }
}

// =============================================================================
// Account
// =============================================================================

/// Any authenticatable principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Account {
    Standard(StandardUser),
    Passwordless(PasswordlessUser),
    SuperAdmin(SuperAdmin),
}

impl Account {
    pub fn id(&self) -> &str {
        match self {
            Account::Standard(u) => &u.id,
            Account::Passwordless(u) => &u.id,
            Account::SuperAdmin(a) => &a.id,
        }
    }

    pub fn email(&self) -> Option<&str> {
        match self {
            Account::Standard(u) => u.email.as_deref(),
            Account::Passwordless(u) => u.email.as_deref(),
            Account::SuperAdmin(a) => Some(&a.email),
        }
    }

    pub fn phone_number(&self) -> Option<&str> {
        match self {
            Account::Standard(u) => u.phone_number.as_deref(),
            Account::Passwordless(u) => Some(&u.phone_number),
            Account::SuperAdmin(_) => None,
        }
    }

    pub fn category(&self) -> Category {
        match self {
            Account::Standard(u) => u.category,
            Account::Passwordless(u) => u.category,
            Account::SuperAdmin(_) => Category::SuperAdmin,
        }
    }

    pub fn status(&self) -> AccountStatus {
        match self {
            Account::Standard(u) => u.status,
            Account::Passwordless(u) => u.status,
            Account::SuperAdmin(_) => AccountStatus::Active,
        }
    }

    pub fn permissions(&self) -> &PermissionSet {
        match self {
            Account::Standard(u) => &u.permissions,
            Account::Passwordless(u) => &u.permissions,
            Account::SuperAdmin(a) => &a.permissions,
        }
    }

    pub fn role_id(&self) -> Option<&str> {
        match self {
            Account::Standard(u) => u.role_id.as_deref(),
            Account::Passwordless(u) => u.role_id.as_deref(),
            Account::SuperAdmin(_) => None,
        }
    }

    pub fn password_hash(&self) -> Option<&PasswordHash> {
        match self {
            Account::Standard(u) => Some(&u.password_hash),
            Account::Passwordless(_) => None,
            Account::SuperAdmin(a) => Some(&a.password_hash),
        }
    }

    pub fn partition(&self) -> Partition {
        match self {
            Account::Standard(_) => Partition::Standard,
            Account::Passwordless(_) => Partition::Passwordless,
            Account::SuperAdmin(_) => Partition::SuperAdmin,
        }
    }

    pub fn is_super_admin(&self) -> bool {
        matches!(self, Account::SuperAdmin(_))
    }

    /// Replace role id and permissions together.
    ///
    /// Super-admins have no role; their permission set is left untouched.
    pub fn apply_role(&mut self, role_id: &str, permissions: &PermissionSet, now: DateTime<Utc>) {
        match self {
            Account::Standard(u) => {
                u.role_id = Some(role_id.to_string());
                u.permissions = permissions.clone();
                u.updated_at = now;
            }
            Account::Passwordless(u) => {
                u.role_id = Some(role_id.to_string());
                u.permissions = permissions.clone();
                u.updated_at = now;
            }
            Account::SuperAdmin(_) => {}
        }
    }

    /// Apply a partial update. Fields that do not exist on the variant are ignored.
    pub fn apply_update(&mut self, update: &AccountUpdate, now: DateTime<Utc>) {
        match self {
            Account::Standard(u) => {
                if let Some(status) = update.status {
                    u.status = status;
                }
                if let Some(address) = &update.address {
                    u.address = Some(address.clone());
                }
                u.updated_at = now;
            }
            Account::Passwordless(u) => {
                if let Some(status) = update.status {
                    u.status = status;
                }
                u.updated_at = now;
            }
            Account::SuperAdmin(a) => {
                a.updated_at = now;
            }
        }
    }
}

/// Partial update of mutable account fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountUpdate {
    pub status: Option<AccountStatus>,
    pub address: Option<String>,
}

// =============================================================================
// Role
// =============================================================================

/// Named, mutable bundle of permissions assignable to an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub id: String,
    pub name: String,
    pub permissions: PermissionSet,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Role {
    pub fn new(name: impl Into<String>, permissions: PermissionSet) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            permissions,
            created_at: now,
            updated_at: now,
        }
    }
}

// =============================================================================
// Public account view
// =============================================================================

/// Account representation returned by the API. Carries no credential material.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AccountView {
    pub id: String,
    pub kind: Partition,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    pub category: Category,
    pub status: AccountStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role_id: Option<String>,
    pub permissions: PermissionSet,
}

impl From<&Account> for AccountView {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id().to_string(),
            kind: account.partition(),
            email: account.email().map(str::to_string),
            phone_number: account.phone_number().map(str::to_string),
            category: account.category(),
            status: account.status(),
            role_id: account.role_id().map(str::to_string),
            permissions: account.permissions().clone(),
        }
    }
}
