// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    middleware,
    routing::{get, patch, post, MethodRouter},
    Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::{
    auth::{
        enforce,
        permissions::{CREATE_ROLE, READ_ROLES, READ_USERS, UPDATE_ROLE, UPDATE_USER_STATUS},
        AuthChain, IdentifierKind,
    },
    config::ConfigError,
    error::{handle_panic, not_found},
    models::Category,
    state::AppState,
};

pub mod auth;
pub mod health;
pub mod permissions;
pub mod roles;
pub mod users;

/// Attach a validated guard to a single method router.
fn guarded(
    state: &AppState,
    route: MethodRouter<AppState>,
    chain: AuthChain,
) -> Result<MethodRouter<AppState>, ConfigError> {
    let guard = state.guard(chain)?;
    Ok(route.route_layer(middleware::from_fn_with_state(guard, enforce)))
}

/// Build the HTTP router.
///
/// Fails when a route is gated on a permission the registry does not know.
pub fn router(state: AppState) -> Result<Router, ConfigError> {
    let email_account = || {
        AuthChain::new()
            .require_identifier(IdentifierKind::Email)
            .user_exists(IdentifierKind::Email)
    };
    let phone_account = || {
        AuthChain::new()
            .require_identifier(IdentifierKind::PhoneNumber)
            .user_exists(IdentifierKind::PhoneNumber)
    };
    let token = || AuthChain::new().verify_token();

    let v1_routes = Router::new()
        // Auth
        .route("/auth/register", post(auth::register))
        .route(
            "/auth/login",
            guarded(&state, post(auth::login), email_account())?,
        )
        .route("/auth/refresh", post(auth::refresh))
        .route(
            "/auth/otp/request",
            guarded(&state, post(auth::request_otp), phone_account())?,
        )
        .route(
            "/auth/otp/verify",
            guarded(&state, post(auth::verify_otp), phone_account())?,
        )
        // Users
        .route("/users/me", guarded(&state, get(users::me), token())?)
        .route(
            "/users/lookup",
            guarded(
                &state,
                get(users::lookup),
                email_account().verify_token().require_permission(READ_USERS),
            )?,
        )
        .route(
            "/users/status",
            guarded(
                &state,
                patch(users::update_status),
                email_account()
                    .verify_token()
                    .require_permission(UPDATE_USER_STATUS),
            )?,
        )
        // Roles
        .route(
            "/roles",
            guarded(
                &state,
                get(roles::list_roles),
                token().require_permission(READ_ROLES),
            )?
            .merge(guarded(
                &state,
                post(roles::create_role),
                token().require_permission(CREATE_ROLE),
            )?),
        )
        .route(
            "/roles/{role_id}",
            guarded(
                &state,
                patch(roles::update_role),
                token().require_permission(UPDATE_ROLE),
            )?,
        )
        .route(
            "/roles/assign",
            guarded(&state, post(roles::assign_role), AuthChain::new().super_admin())?,
        )
        // Permissions
        .route(
            "/permissions",
            guarded(
                &state,
                get(permissions::list_permissions),
                token().category([
                    Category::User,
                    Category::Vendor,
                    Category::Admin,
                    Category::SuperAdmin,
                ]),
            )?,
        );

    let health_routes = Router::new()
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness));

    Ok(Router::new()
        .nest("/v1", v1_routes)
        .merge(health_routes)
        .fallback(not_found)
        .with_state(state)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive()))
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn router_builds_with_all_routes() {
        let app = router(state()).unwrap();
        let _ = app.into_make_service();
    }

    #[tokio::test]
    async fn unknown_route_renders_error_shape() {
        let app = router(state()).unwrap();
        let (status, body) = send(app, request(Method::GET, "/v1/nope", None, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["statusCode"], 404);
        assert_eq!(body["message"], "Route Not Found.");
    }

    #[tokio::test]
    async fn permission_gated_route_without_header() {
        let app = router(state()).unwrap();
        let (status, body) = send(app, request(Method::GET, "/v1/roles", None, None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            json!({
                "statusCode": 400,
                "message": "UnAuthorised User.",
                "details": "Auth Header Is Not Present"
            })
        );
    }

    #[tokio::test]
    async fn request_id_is_echoed() {
        let app = router(state()).unwrap();
        let response = tower::ServiceExt::oneshot(
            app,
            request(Method::GET, "/health/live", None, None),
        )
        .await
        .unwrap();
        assert!(response.headers().contains_key("x-request-id"));
    }
}
