// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Permission Registry
//!
//! Static catalog of every permission string the service recognizes,
//! partitioned into create / read / update / delete.
//!
//! The registry is built once at startup ([`PermissionRegistry::standard`])
//! and shared read-only through `AppState`. Route declarations reference the
//! string constants below directly; renaming one is a breaking change for
//! every route gated on it.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::config::ConfigError;
use crate::models::PermissionSet;

// =============================================================================
// Permission constants
// =============================================================================

pub const CREATE_BLOG: &str = "create_blog";
pub const CREATE_DROPSHIP: &str = "create_dropship";
pub const CREATE_PRODUCT: &str = "create_product";
pub const CREATE_ROLE: &str = "create_role";
pub const CREATE_USER: &str = "create_user";
pub const CREATE_PAYMENT: &str = "create_payment";
pub const CREATE_SOCIAL_POST: &str = "create_social_post";

pub const READ_BLOG: &str = "read_blog";
pub const READ_DROPSHIP: &str = "read_dropship";
pub const READ_PRODUCT: &str = "read_product";
pub const READ_ROLES: &str = "read_roles";
pub const READ_USERS: &str = "read_users";
pub const READ_PAYMENTS: &str = "read_payments";
pub const READ_PERMISSIONS: &str = "read_permissions";

pub const UPDATE_BLOG: &str = "update_blog";
pub const UPDATE_DROPSHIP: &str = "update_dropship";
pub const UPDATE_PRODUCT: &str = "update_product";
pub const UPDATE_ROLE: &str = "update_role";
pub const ASSIGN_ROLE: &str = "assign_role";
pub const UPDATE_USER_STATUS: &str = "update_user_status";

pub const DELETE_BLOG: &str = "delete_blog";
pub const DELETE_DROPSHIP: &str = "delete_dropship";
pub const DELETE_PRODUCT: &str = "delete_product";
pub const DELETE_ROLE: &str = "delete_role";
pub const DELETE_USER: &str = "delete_user";

const CREATE: &[(&str, &str)] = &[
    ("CREATE_BLOG", CREATE_BLOG),
    ("CREATE_DROPSHIP", CREATE_DROPSHIP),
    ("CREATE_PRODUCT", CREATE_PRODUCT),
    ("CREATE_ROLE", CREATE_ROLE),
    ("CREATE_USER", CREATE_USER),
    ("CREATE_PAYMENT", CREATE_PAYMENT),
    ("CREATE_SOCIAL_POST", CREATE_SOCIAL_POST),
];

const READ: &[(&str, &str)] = &[
    ("READ_BLOG", READ_BLOG),
    ("READ_DROPSHIP", READ_DROPSHIP),
    ("READ_PRODUCT", READ_PRODUCT),
    ("READ_ROLES", READ_ROLES),
    ("READ_USERS", READ_USERS),
    ("READ_PAYMENTS", READ_PAYMENTS),
    ("READ_PERMISSIONS", READ_PERMISSIONS),
];

const UPDATE: &[(&str, &str)] = &[
    ("UPDATE_BLOG", UPDATE_BLOG),
    ("UPDATE_DROPSHIP", UPDATE_DROPSHIP),
    ("UPDATE_PRODUCT", UPDATE_PRODUCT),
    ("UPDATE_ROLE", UPDATE_ROLE),
    ("ASSIGN_ROLE", ASSIGN_ROLE),
    ("UPDATE_USER_STATUS", UPDATE_USER_STATUS),
];

const DELETE: &[(&str, &str)] = &[
    ("DELETE_BLOG", DELETE_BLOG),
    ("DELETE_DROPSHIP", DELETE_DROPSHIP),
    ("DELETE_PRODUCT", DELETE_PRODUCT),
    ("DELETE_ROLE", DELETE_ROLE),
    ("DELETE_USER", DELETE_USER),
];

// =============================================================================
// Catalog
// =============================================================================

/// CRUD category a permission belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionKind {
    Create,
    Read,
    Update,
    Delete,
}

/// The four permission maps, as returned by `GET /v1/permissions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionCatalog {
    pub create_permissions: BTreeMap<String, String>,
    pub read_permissions: BTreeMap<String, String>,
    pub update_permissions: BTreeMap<String, String>,
    pub delete_permissions: BTreeMap<String, String>,
}

// =============================================================================
// Registry
// =============================================================================

/// Immutable permission registry.
#[derive(Debug, Clone)]
pub struct PermissionRegistry {
    catalog: PermissionCatalog,
    known: HashSet<String>,
}

impl PermissionRegistry {
    /// Registry holding the service's built-in permissions.
    pub fn standard() -> Self {
        // The built-in tables are disjoint (see `built_in_tables_are_disjoint`).
        let (registry, _) = Self::collect(CREATE, READ, UPDATE, DELETE);
        registry
    }

    /// Build a registry from four `(key, value)` tables.
    ///
    /// A permission value may belong to exactly one category.
    pub fn from_tables(
        create: &[(&str, &str)],
        read: &[(&str, &str)],
        update: &[(&str, &str)],
        delete: &[(&str, &str)],
    ) -> Result<Self, ConfigError> {
        match Self::collect(create, read, update, delete) {
            (registry, None) => Ok(registry),
            (_, Some(duplicate)) => Err(ConfigError::DuplicatePermission(duplicate)),
        }
    }

    /// Returns the registry and the first value seen in more than one table.
    fn collect(
        create: &[(&str, &str)],
        read: &[(&str, &str)],
        update: &[(&str, &str)],
        delete: &[(&str, &str)],
    ) -> (Self, Option<String>) {
        let mut known = HashSet::new();
        let mut duplicate = None;
        let mut to_map = |table: &[(&str, &str)]| {
            let mut map = BTreeMap::new();
            for (key, value) in table {
                if !known.insert(value.to_string()) && duplicate.is_none() {
                    duplicate = Some(value.to_string());
                }
                map.insert(key.to_string(), value.to_string());
            }
            map
        };

        let catalog = PermissionCatalog {
            create_permissions: to_map(create),
            read_permissions: to_map(read),
            update_permissions: to_map(update),
            delete_permissions: to_map(delete),
        };

        (Self { catalog, known }, duplicate)
    }

    /// The four category maps.
    pub fn list_permissions(&self) -> &PermissionCatalog {
        &self.catalog
    }

    /// True iff `name` appears in any category.
    pub fn is_valid_permission(&self, name: &str) -> bool {
        self.known.contains(name)
    }

    /// Category of a registered permission.
    pub fn kind_of(&self, name: &str) -> Option<PermissionKind> {
        let contains = |map: &BTreeMap<String, String>| map.values().any(|v| v == name);
        if contains(&self.catalog.create_permissions) {
            Some(PermissionKind::Create)
        } else if contains(&self.catalog.read_permissions) {
            Some(PermissionKind::Read)
        } else if contains(&self.catalog.update_permissions) {
            Some(PermissionKind::Update)
        } else if contains(&self.catalog.delete_permissions) {
            Some(PermissionKind::Delete)
        } else {
            None
        }
    }

    /// Every registered permission. Granted to super-admins at creation.
    pub fn all(&self) -> PermissionSet {
        self.known.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }
}

impl Default for PermissionRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
