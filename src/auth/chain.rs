// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Auth Guard Chain
//!
//! A route declares an ordered list of [`Stage`]s. [`AuthChain::run`] executes
//! them strictly in order against a fresh [`RequestContext`]; the first
//! failure short-circuits and later stages never run.
//!
//! | Stage | Reads | Adds | Fails with |
//! |-------|-------|------|------------|
//! | `RequireIdentifier` | query/body | identifier | `MissingEmail` / `MissingPhone` |
//! | `UserExists` | identifier | account | `AccountNotFound` |
//! | `CategoryGate` | effective user | - | `UnauthorizedCategory` |
//! | `VerifyToken` | `Authorization` | claims | `MissingAuthHeader` / `MissingToken` / `InvalidToken` / `ExpiredToken` |
//! | `RequirePermission` | effective user | - | `UnknownUser` / `InsufficientPermission` |
//! | `SuperAdminGate` | `Authorization`, store | claims | token errors, `PermissionDenied` |
//!
//! The effective user is the verified claims when present, otherwise the
//! resolved account.

use std::sync::Arc;

use super::context::{IdentifierKind, RequestContext};
use super::permissions::PermissionRegistry;
use super::resolver::{extract_identifier, IdentityResolver, RequestInput};
use super::tokens::TokenService;
use super::AuthError;
use crate::config::ConfigError;
use crate::models::{Category, Partition};
use crate::storage::AccountStore;
use crate::telemetry::AUDIT_TARGET;

// =============================================================================
// Services
// =============================================================================

/// Collaborators the stages consult.
#[derive(Clone)]
pub struct AuthServices {
    pub tokens: Arc<TokenService>,
    pub resolver: IdentityResolver,
    pub accounts: Arc<dyn AccountStore>,
}

impl AuthServices {
    pub fn new(tokens: Arc<TokenService>, accounts: Arc<dyn AccountStore>) -> Self {
        Self {
            tokens,
            resolver: IdentityResolver::new(accounts.clone()),
            accounts,
        }
    }
}

// =============================================================================
// Bearer header
// =============================================================================

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn parse_bearer(header: Option<&str>) -> Result<&str, AuthError> {
    let header = header.ok_or(AuthError::MissingAuthHeader)?;
    let mut parts = header.split_whitespace();

    let scheme = parts.next().ok_or(AuthError::MissingToken)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::InvalidToken {
            reason: "header format",
        });
    }
    let token = parts.next().ok_or(AuthError::MissingToken)?;
    if parts.next().is_some() {
        return Err(AuthError::InvalidToken {
            reason: "header format",
        });
    }
    Ok(token)
}

// =============================================================================
// Stages
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    RequireIdentifier(IdentifierKind),
    UserExists(IdentifierKind),
    /// Allowed categories. Empty admits any category, but still needs a user.
    CategoryGate(Vec<Category>),
    VerifyToken,
    RequirePermission(String),
    SuperAdminGate,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::RequireIdentifier(_) => "require_identifier",
            Stage::UserExists(_) => "user_exists",
            Stage::CategoryGate(_) => "category_gate",
            Stage::VerifyToken => "verify_token",
            Stage::RequirePermission(_) => "require_permission",
            Stage::SuperAdminGate => "super_admin_gate",
        }
    }

    async fn apply(
        &self,
        ctx: &mut RequestContext,
        services: &AuthServices,
        input: &RequestInput,
    ) -> Result<(), AuthError> {
        match self {
            Stage::RequireIdentifier(kind) => {
                let identifier = extract_identifier(*kind, input)?;
                ctx.attach_identifier(identifier);
                Ok(())
            }

            Stage::UserExists(kind) => {
                let identifier = match ctx.identifier() {
                    Some(existing) if existing.kind == *kind => existing.clone(),
                    _ => extract_identifier(*kind, input)?,
                };
                let account = services.resolver.resolve(&identifier).await?;
                ctx.attach_identifier(identifier);
                ctx.attach_account(account);
                Ok(())
            }

            Stage::CategoryGate(allowed) => {
                let category = ctx.effective_user().map(|user| user.category());
                match category {
                    Some(c) if allowed.is_empty() || allowed.contains(&c) => Ok(()),
                    _ => Err(AuthError::UnauthorizedCategory { category }),
                }
            }

            Stage::VerifyToken => {
                let token = parse_bearer(input.authorization.as_deref())?;
                let claims = services.tokens.verify_token(token)?;
                ctx.attach_claims(claims);
                Ok(())
            }

            Stage::RequirePermission(permission) => {
                let user = ctx.effective_user().ok_or(AuthError::UnknownUser)?;
                if user.has_permission(permission) {
                    Ok(())
                } else {
                    Err(AuthError::InsufficientPermission)
                }
            }

            Stage::SuperAdminGate => {
                let token = parse_bearer(input.authorization.as_deref())?;
                let claims = services.tokens.verify_token(token)?;

                if claims.category != Category::SuperAdmin {
                    return Err(AuthError::PermissionDenied {
                        reason: "not a super-admin",
                    });
                }
                let email = claims.email.as_deref().ok_or(AuthError::PermissionDenied {
                    reason: "super-admin token without email",
                })?;

                // Token may outlive the admin record
                let record = services
                    .accounts
                    .find_by_email(Partition::SuperAdmin, email)
                    .await?;
                match record {
                    Some(admin) if admin.id() == claims.sub => {
                        ctx.attach_account(admin);
                        ctx.attach_claims(claims);
                        Ok(())
                    }
                    _ => Err(AuthError::PermissionDenied {
                        reason: "super-admin record not found",
                    }),
                }
            }
        }
    }
}

// =============================================================================
// Chain
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthChain {
    stages: Vec<Stage>,
}

impl AuthChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn require_identifier(self, kind: IdentifierKind) -> Self {
        self.stage(Stage::RequireIdentifier(kind))
    }

    pub fn user_exists(self, kind: IdentifierKind) -> Self {
        self.stage(Stage::UserExists(kind))
    }

    pub fn category(self, allowed: impl IntoIterator<Item = Category>) -> Self {
        self.stage(Stage::CategoryGate(allowed.into_iter().collect()))
    }

    pub fn verify_token(self) -> Self {
        self.stage(Stage::VerifyToken)
    }

    pub fn require_permission(self, permission: impl Into<String>) -> Self {
        self.stage(Stage::RequirePermission(permission.into()))
    }

    pub fn super_admin(self) -> Self {
        self.stage(Stage::SuperAdminGate)
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Reject chains gated on permissions the registry does not know.
    pub fn validate(self, registry: &PermissionRegistry) -> Result<Self, ConfigError> {
        for stage in &self.stages {
            if let Stage::RequirePermission(permission) = stage {
                if !registry.is_valid_permission(permission) {
                    return Err(ConfigError::UnknownPermission(permission.clone()));
                }
            }
        }
        Ok(self)
    }

    /// Run every stage in order.
    pub async fn run(
        &self,
        services: &AuthServices,
        input: &RequestInput,
    ) -> Result<RequestContext, AuthError> {
        let mut ctx = RequestContext::new();
        for stage in &self.stages {
            if let Err(err) = stage.apply(&mut ctx, services, input).await {
                if err.status_code().is_server_error() {
                    tracing::error!(
                        target: AUDIT_TARGET,
                        stage = stage.name(),
                        error_code = err.code(),
                        error = %err,
                        "auth stage failed"
                    );
                } else {
                    tracing::warn!(
                        target: AUDIT_TARGET,
                        stage = stage.name(),
                        error_code = err.code(),
                        method = %input.method,
                        "request rejected"
                    );
                }
                return Err(err);
            }
        }
        Ok(ctx)
    }
}
