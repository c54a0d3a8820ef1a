// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-request authentication context.
//!
//! A [`RequestContext`] is created when a guard chain starts, filled in by
//! successive stages, inserted into the request extensions for the handler,
//! and dropped with the request. Stages only ever add to it: a value that has
//! been attached is never replaced.

use crate::models::{Account, Category, PermissionSet};

use super::claims::SessionClaims;

/// Kind of identifier a route resolves accounts by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentifierKind {
    Email,
    PhoneNumber,
}

impl IdentifierKind {
    /// Field name in query strings and JSON bodies.
    pub fn field(&self) -> &'static str {
        match self {
            IdentifierKind::Email => "email",
            IdentifierKind::PhoneNumber => "phoneNumber",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identifier {
    pub kind: IdentifierKind,
    pub value: String,
}

/// The user a permission gate evaluates: decoded claims when a token has been
/// verified, otherwise the resolved account.
#[derive(Debug, Clone, Copy)]
pub enum EffectiveUser<'a> {
    Claims(&'a SessionClaims),
    Account(&'a Account),
}

impl EffectiveUser<'_> {
    pub fn category(&self) -> Category {
        match self {
            EffectiveUser::Claims(c) => c.category,
            EffectiveUser::Account(a) => a.category(),
        }
    }

    pub fn permissions(&self) -> Option<&PermissionSet> {
        match self {
            EffectiveUser::Claims(c) => c.permissions.as_ref(),
            EffectiveUser::Account(a) => Some(a.permissions()),
        }
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions().is_some_and(|set| set.contains(permission))
    }

    pub fn id(&self) -> &str {
        match self {
            EffectiveUser::Claims(c) => &c.sub,
            EffectiveUser::Account(a) => a.id(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    identifier: Option<Identifier>,
    account: Option<Account>,
    claims: Option<SessionClaims>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn identifier(&self) -> Option<&Identifier> {
        self.identifier.as_ref()
    }

    pub fn account(&self) -> Option<&Account> {
        self.account.as_ref()
    }

    pub fn claims(&self) -> Option<&SessionClaims> {
        self.claims.as_ref()
    }

    /// Attach the identifier unless one is already present.
    pub fn attach_identifier(&mut self, identifier: Identifier) -> &Identifier {
        self.identifier.get_or_insert(identifier)
    }

    /// Attach the resolved account unless one is already present.
    pub fn attach_account(&mut self, account: Account) -> &Account {
        self.account.get_or_insert(account)
    }

    /// Attach verified claims unless some are already present.
    pub fn attach_claims(&mut self, claims: SessionClaims) -> &SessionClaims {
        self.claims.get_or_insert(claims)
    }

    pub fn effective_user(&self) -> Option<EffectiveUser<'_>> {
        match (&self.claims, &self.account) {
            (Some(claims), _) => Some(EffectiveUser::Claims(claims)),
            (None, Some(account)) => Some(EffectiveUser::Account(account)),
            (None, None) => None,
        }
    }
}
