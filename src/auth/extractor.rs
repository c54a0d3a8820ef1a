// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for guarded handlers.
//!
//! Both read the [`RequestContext`] left in the request extensions by the
//! [`enforce`](super::middleware::enforce) middleware:
//!
//! ```rust,ignore
//! async fn me(Session(claims): Session) -> Json<SessionClaims> {
//!     Json(claims)
//! }
//! ```

use axum::{extract::FromRequestParts, http::request::Parts};

use super::{AuthError, RequestContext, SessionClaims};

/// The full request context built by the route's guard.
pub struct Ctx(pub RequestContext);

impl<S> FromRequestParts<S> for Ctx
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .map(Ctx)
            .ok_or(AuthError::UnknownUser)
    }
}

/// Verified session claims. Requires a guard with a token stage.
pub struct Session(pub SessionClaims);

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestContext>()
            .and_then(|ctx| ctx.claims().cloned())
            .map(Session)
            .ok_or(AuthError::UnknownUser)
    }
}
