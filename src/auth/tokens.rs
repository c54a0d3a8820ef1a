// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Token Service
//!
//! Issues and verifies HS256 session tokens signed with a single shared
//! secret.
//!
//! ## Lifetimes
//!
//! | Token | Lifetime |
//! |-------|----------|
//! | Access, super-admin | 24h |
//! | Access, standard user | 30h |
//! | Refresh | `REFRESH_TOKEN_TTL_SECS` |
//!
//! The asymmetric access lifetimes are kept as observed in production.
//!
//! Neither the secret nor any token is ever logged.

use std::fmt;

use chrono::Utc;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};

use super::claims::{RefreshedToken, SessionClaims, TokenPair, TokenUse};
use super::AuthError;
use crate::config::TokenConfig;
use crate::models::{Account, Category};
use crate::telemetry::AUDIT_TARGET;

/// Access token lifetime for super-admins.
pub const SUPER_ADMIN_ACCESS_TTL_SECS: u64 = 24 * 60 * 60;

/// Access token lifetime for standard users.
pub const STANDARD_ACCESS_TTL_SECS: u64 = 30 * 60 * 60;

fn expires_at(now: i64, ttl_secs: u64) -> i64 {
    now.saturating_add(i64::try_from(ttl_secs).unwrap_or(i64::MAX))
}

fn access_ttl_for(category: Category) -> u64 {
    match category {
        Category::SuperAdmin => SUPER_ADMIN_ACCESS_TTL_SECS,
        _ => STANDARD_ACCESS_TTL_SECS,
    }
}

#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    refresh_ttl_secs: u64,
    leeway_secs: u64,
}

impl fmt::Debug for TokenService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenService")
            .field("issuer", &self.issuer)
            .field("refresh_ttl_secs", &self.refresh_ttl_secs)
            .field("leeway_secs", &self.leeway_secs)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(config: &TokenConfig) -> Self {
        let secret = config.secret.as_bytes();
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            issuer: config.issuer.clone(),
            refresh_ttl_secs: config.refresh_ttl.as_secs(),
            leeway_secs: config.leeway.as_secs(),
        }
    }

    pub fn refresh_ttl_secs(&self) -> u64 {
        self.refresh_ttl_secs
    }

    // =========================================================================
    // Issue
    // =========================================================================

    /// Issue an access + refresh pair for a resolved account.
    pub fn issue_tokens(&self, account: &Account) -> Result<TokenPair, AuthError> {
        self.issue_tokens_at(account, Utc::now().timestamp())
    }

    pub(crate) fn issue_tokens_at(
        &self,
        account: &Account,
        now: i64,
    ) -> Result<TokenPair, AuthError> {
        let base = self.base_claims(account, now)?;
        let access_ttl = access_ttl_for(base.category);

        let access = SessionClaims {
            exp: expires_at(now, access_ttl),
            ..base.clone()
        };
        let refresh = SessionClaims {
            token_use: TokenUse::Refresh,
            exp: expires_at(now, self.refresh_ttl_secs),
            ..base
        };

        let pair = TokenPair {
            access_token: self.sign(&access)?,
            refresh_token: self.sign(&refresh)?,
            expires_in: access_ttl,
            refresh_expires_in: self.refresh_ttl_secs,
            category: access.category,
        };

        tracing::debug!(
            target: AUDIT_TARGET,
            account_id = %account.id(),
            category = %pair.category,
            "issued session tokens"
        );
        Ok(pair)
    }

    /// Claims by account variant. Timing fields are filled by the caller.
    fn base_claims(&self, account: &Account, now: i64) -> Result<SessionClaims, AuthError> {
        let claims = match account {
            Account::SuperAdmin(admin) => SessionClaims {
                sub: admin.id.clone(),
                user_id: None,
                name: Some(admin.name.clone()),
                email: Some(admin.email.clone()),
                address: None,
                category: Category::SuperAdmin,
                permissions: Some(admin.permissions.clone()),
                token_use: TokenUse::Access,
                iss: self.issuer.clone(),
                iat: now,
                exp: now,
            },
            Account::Standard(user) => SessionClaims {
                sub: user.id.clone(),
                user_id: Some(user.id.clone()),
                name: None,
                email: user.email.clone(),
                address: user.address.clone(),
                category: user.category,
                permissions: Some(user.permissions.clone()),
                token_use: TokenUse::Access,
                iss: self.issuer.clone(),
                iat: now,
                exp: now,
            },
            Account::Passwordless(_) => {
                return Err(AuthError::Configuration(
                    "no session claims defined for passwordless accounts".to_string(),
                ))
            }
        };
        Ok(claims)
    }

    fn sign(&self, claims: &SessionClaims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| AuthError::Configuration(format!("token signing failed: {e}")))
    }

    // =========================================================================
    // Verify
    // =========================================================================

    /// Verify an access token.
    pub fn verify_token(&self, token: &str) -> Result<SessionClaims, AuthError> {
        self.verify_as(token, TokenUse::Access)
    }

    /// Verify a refresh token.
    pub fn verify_refresh_token(&self, token: &str) -> Result<SessionClaims, AuthError> {
        self.verify_as(token, TokenUse::Refresh)
    }

    fn verify_as(&self, token: &str, expected: TokenUse) -> Result<SessionClaims, AuthError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = self.leeway_secs;
        validation.set_issuer(&[&self.issuer]);
        validation.validate_aud = false;

        let claims = decode::<SessionClaims>(token, &self.decoding, &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
                ErrorKind::InvalidSignature => AuthError::InvalidToken { reason: "signature" },
                ErrorKind::InvalidIssuer => AuthError::InvalidToken { reason: "issuer" },
                ErrorKind::InvalidAlgorithm => AuthError::InvalidToken { reason: "algorithm" },
                _ => AuthError::InvalidToken { reason: "malformed" },
            })?
            .claims;

        if claims.token_use != expected {
            return Err(AuthError::InvalidToken { reason: "token use" });
        }
        Ok(claims)
    }

    // =========================================================================
    // Refresh
    // =========================================================================

    /// Mint a new access token for the subject of a verified refresh token.
    ///
    /// Claims are rebuilt from `account` as currently stored, so role,
    /// permission and profile changes since login take effect. The account
    /// must be the refresh token's subject.
    pub fn refresh_access_token(
        &self,
        refresh: &SessionClaims,
        account: &Account,
    ) -> Result<RefreshedToken, AuthError> {
        self.refresh_access_token_at(refresh, account, Utc::now().timestamp())
    }

    pub(crate) fn refresh_access_token_at(
        &self,
        refresh: &SessionClaims,
        account: &Account,
        now: i64,
    ) -> Result<RefreshedToken, AuthError> {
        if refresh.token_use != TokenUse::Refresh {
            return Err(AuthError::InvalidToken { reason: "token use" });
        }
        if refresh.sub != account.id() {
            return Err(AuthError::InvalidToken { reason: "subject" });
        }

        let base = self.base_claims(account, now)?;
        let ttl = access_ttl_for(base.category);
        let access = SessionClaims {
            exp: expires_at(now, ttl),
            ..base
        };

        tracing::debug!(target: AUDIT_TARGET, account_id = %access.sub, "refreshed access token");
        Ok(RefreshedToken {
            token: self.sign(&access)?,
            expires_in: ttl,
        })
    }
}
