// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum middleware running an [`AuthChain`] in front of a handler.
//!
//! ```rust,ignore
//! let chain = AuthChain::new().verify_token().require_permission(READ_ROLES);
//! let guard = state.guard(chain)?;
//!
//! let app = Router::new()
//!     .route("/v1/roles", get(list_roles))
//!     .route_layer(axum::middleware::from_fn_with_state(guard, enforce));
//! ```
//!
//! The request body is buffered (up to [`MAX_GUARD_BODY_BYTES`]) so body
//! identifiers can be read, then handed to the handler unchanged. On success
//! the [`RequestContext`](super::RequestContext) is inserted into the request
//! extensions, where the [`Ctx`](super::Ctx) extractor picks it up.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    extract::{Query, Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::chain::{AuthChain, AuthServices};
use super::resolver::RequestInput;
use crate::error::ApiError;

/// Upper bound on request bodies inspected by a guard.
pub const MAX_GUARD_BODY_BYTES: usize = 1024 * 1024;

/// A validated chain plus the services it runs against.
#[derive(Clone)]
pub struct Guard {
    chain: Arc<AuthChain>,
    services: AuthServices,
}

impl Guard {
    /// Build a guard. The chain should already be validated against the
    /// permission registry (see `AppState::guard`).
    pub fn new(chain: AuthChain, services: AuthServices) -> Self {
        Self {
            chain: Arc::new(chain),
            services,
        }
    }

    pub fn chain(&self) -> &AuthChain {
        &self.chain
    }
}

/// Middleware function: run the guard's chain, then the handler.
pub async fn enforce(State(guard): State<Guard>, request: Request, next: Next) -> Response {
    let (mut parts, body) = request.into_parts();

    let bytes = match to_bytes(body, MAX_GUARD_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(_) => {
            return ApiError::new(StatusCode::PAYLOAD_TOO_LARGE, "Invalid Request.")
                .with_details("Request Body Too Large")
                .into_response()
        }
    };

    let input = RequestInput {
        method: parts.method.clone(),
        query: Query::<HashMap<String, String>>::try_from_uri(&parts.uri)
            .map(|Query(q)| q)
            .unwrap_or_default(),
        // Malformed JSON is left for the handler's extractor to reject
        body: if bytes.is_empty() {
            None
        } else {
            serde_json::from_slice(&bytes).ok()
        },
        authorization: parts
            .headers
            .get(AUTHORIZATION)
            .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned()),
    };

    match guard.chain.run(&guard.services, &input).await {
        Ok(ctx) => {
            parts.extensions.insert(ctx);
            next.run(Request::from_parts(parts, Body::from(bytes))).await
        }
        Err(err) => err.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::context::IdentifierKind;
    use crate::auth::extractor::Ctx;
    use crate::auth::permissions::READ_USERS;
    use crate::auth::tokens::TokenService;
    use crate::config::TokenConfig;
    use crate::models::{Account, PasswordHash, StandardUser};
    use crate::storage::{AccountStore, MemoryStore};
    use axum::{
        http::Method,
        routing::{get, post},
        Json, Router,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn echo(Ctx(ctx): Ctx, body: String) -> Json<Value> {
        Json(json!({
            "account": ctx.account().map(|a| a.id().to_string()),
            "caller": ctx.claims().map(|c| c.sub.clone()),
            "body": body,
        }))
    }

    struct Fixture {
        services: AuthServices,
        account: Account,
    }

    async fn fixture() -> Fixture {
        let store = MemoryStore::new();
        let mut user =
            StandardUser::new(Some("a@b.com".into()), None, PasswordHash("h".into()), None);
        user.permissions = [READ_USERS.to_string()].into_iter().collect();
        let account = store.insert_account(Account::Standard(user)).await.unwrap();
        let tokens = Arc::new(TokenService::new(&TokenConfig::new("mw-secret").unwrap()));
        Fixture {
            services: AuthServices::new(tokens, Arc::new(store)),
            account,
        }
    }

    fn app(guard: Guard) -> Router {
        Router::new()
            .route("/lookup", get(echo))
            .route("/submit", post(echo))
            .route_layer(axum::middleware::from_fn_with_state(guard, enforce))
    }

    async fn send(app: Router, request: Request) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn rejection_renders_typed_error() {
        let fx = fixture().await;
        let guard = Guard::new(AuthChain::new().verify_token(), fx.services);
        let request = Request::builder()
            .uri("/lookup")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(app(guard), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "UnAuthorised User.");
        assert_eq!(body["details"], "Auth Header Is Not Present");
    }

    #[tokio::test]
    async fn context_reaches_handler_for_query_identifier() {
        let fx = fixture().await;
        let token = fx.services.tokens.issue_tokens(&fx.account).unwrap().access_token;
        let chain = AuthChain::new()
            .require_identifier(IdentifierKind::Email)
            .user_exists(IdentifierKind::Email)
            .verify_token()
            .require_permission(READ_USERS);
        let guard = Guard::new(chain, fx.services.clone());

        let request = Request::builder()
            .uri("/lookup?email=a%40b.com")
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(app(guard), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["account"], fx.account.id());
        assert_eq!(body["caller"], fx.account.id());
    }

    #[tokio::test]
    async fn body_is_forwarded_after_inspection() {
        let fx = fixture().await;
        let chain = AuthChain::new().user_exists(IdentifierKind::Email);
        let guard = Guard::new(chain, fx.services.clone());

        let payload = json!({"email": "a@b.com", "extra": 1}).to_string();
        let request = Request::builder()
            .method(Method::POST)
            .uri("/submit")
            .header("content-type", "application/json")
            .body(Body::from(payload.clone()))
            .unwrap();
        let (status, body) = send(app(guard), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["body"], payload);
        assert_eq!(body["account"], fx.account.id());
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let fx = fixture().await;
        let guard = Guard::new(AuthChain::new(), fx.services);
        let request = Request::builder()
            .method(Method::POST)
            .uri("/submit")
            .body(Body::from(vec![b'x'; MAX_GUARD_BODY_BYTES + 1]))
            .unwrap();
        let (status, _) = send(app(guard), request).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    }
}
