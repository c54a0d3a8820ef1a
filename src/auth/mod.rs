// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Session tokens, identity resolution and role-based access control for the
//! marketplace API.
//!
//! ## Auth Flow
//!
//! 1. Client logs in with email + password (`POST /v1/auth/login`)
//! 2. Server resolves the account, verifies the password and issues an HS256
//!    access token plus a refresh token (HTTP-only cookie)
//! 3. Client sends `Authorization: Bearer <access token>`
//! 4. Each route runs its [`AuthChain`] through the [`enforce`] middleware:
//!    - identifier check / user-exists (email or phone, by HTTP method)
//!    - category allow-list
//!    - token verification (signature, expiry, issuer)
//!    - permission gate or super-admin gate
//! 5. Handlers read the typed [`RequestContext`] via [`Ctx`] or [`Session`]
//!
//! ## Security
//!
//! - One shared signing secret; missing secret fails startup
//! - Expired and forged tokens are distinct error kinds in the audit log
//! - Clock skew tolerance is 60 seconds by default
//! - Role permission sets are validated against the [`PermissionRegistry`]
//!   before they are stored or assigned

pub mod chain;
pub mod claims;
pub mod context;
pub mod error;
pub mod extractor;
pub mod middleware;
pub mod otp;
pub mod password;
pub mod permissions;
pub mod rbac;
pub mod resolver;
pub mod tokens;

pub use chain::{AuthChain, AuthServices, Stage};
pub use claims::{RefreshedToken, SessionClaims, TokenPair, TokenUse};
pub use context::{Identifier, IdentifierKind, RequestContext};
pub use error::AuthError;
pub use extractor::{Ctx, Session};
pub use middleware::{enforce, Guard};
pub use otp::{OtpSender, OtpService};
pub use permissions::PermissionRegistry;
pub use rbac::RbacEngine;
pub use resolver::IdentityResolver;
pub use tokens::TokenService;
