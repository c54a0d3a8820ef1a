// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session claims and token pair types.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::{Category, PermissionSet};

/// Which half of a token pair a token is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenUse {
    Access,
    Refresh,
}

/// Payload of a signed session token.
///
/// Only trusted after [`super::tokens::TokenService`] has verified the
/// signature, issuer and expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionClaims {
    /// Account id
    pub sub: String,

    /// Present for standard users
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Present for super-admins
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    pub category: Category,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<PermissionSet>,

    pub token_use: TokenUse,

    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

impl SessionClaims {
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions
            .as_ref()
            .is_some_and(|set| set.contains(permission))
    }

    /// Identity-bearing fields, for comparing claims across re-issues.
    pub fn identity(&self) -> ClaimsIdentity<'_> {
        ClaimsIdentity {
            sub: &self.sub,
            user_id: self.user_id.as_deref(),
            name: self.name.as_deref(),
            email: self.email.as_deref(),
            address: self.address.as_deref(),
            category: self.category,
            permissions: self.permissions.as_ref(),
        }
    }
}

/// Claims minus timing and token-use fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimsIdentity<'a> {
    pub sub: &'a str,
    pub user_id: Option<&'a str>,
    pub name: Option<&'a str>,
    pub email: Option<&'a str>,
    pub address: Option<&'a str>,
    pub category: Category,
    pub permissions: Option<&'a PermissionSet>,
}

// =============================================================================
// Issued tokens
// =============================================================================

/// Freshly issued access + refresh tokens.
#[derive(Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub expires_in: u64,
    /// Refresh token lifetime in seconds
    pub refresh_expires_in: u64,
    pub category: Category,
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_in", &self.expires_in)
            .field("refresh_expires_in", &self.refresh_expires_in)
            .field("category", &self.category)
            .finish()
    }
}

/// Result of exchanging a refresh token.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshedToken {
    pub token: String,
    pub expires_in: u64,
}

impl fmt::Debug for RefreshedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshedToken")
            .field("token", &"<redacted>")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}
