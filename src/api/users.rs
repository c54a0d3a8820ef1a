// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User endpoints.

use axum::{extract::State, Json};
use axum_extra::extract::WithRejection;
use serde::{Deserialize, Serialize};

use crate::auth::{AuthError, Ctx, Session, SessionClaims};
use crate::error::ApiError;
use crate::models::{AccountStatus, AccountView, Category, PermissionSet};
use crate::state::AppState;

/// Response for GET /v1/users/me
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserMeResponse {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub category: Category,
    pub permissions: PermissionSet,
    /// Session expiry (unix seconds)
    pub expires_at: i64,
}

impl From<SessionClaims> for UserMeResponse {
    fn from(claims: SessionClaims) -> Self {
        Self {
            id: claims.sub,
            name: claims.name,
            email: claims.email,
            address: claims.address,
            category: claims.category,
            permissions: claims.permissions.unwrap_or_default(),
            expires_at: claims.exp,
        }
    }
}

/// The caller, as described by their verified session.
pub async fn me(Session(claims): Session) -> Json<UserMeResponse> {
    Json(claims.into())
}

/// Account located by the `email` query parameter.
pub async fn lookup(Ctx(ctx): Ctx) -> Result<Json<AccountView>, ApiError> {
    let account = ctx.account().ok_or(AuthError::UnknownUser)?;
    Ok(Json(AccountView::from(account)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: AccountStatus,
}

/// Change the status of the account located by the body's `email`.
pub async fn update_status(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    WithRejection(Json(request), _): WithRejection<Json<UpdateStatusRequest>, ApiError>,
) -> Result<Json<AccountView>, ApiError> {
    let target = ctx.account().ok_or(AuthError::UnknownUser)?;
    let updated = state
        .rbac
        .set_account_status(target.id(), request.status)
        .await?;
    Ok(Json(AccountView::from(&updated)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::router;
    use crate::api::test_support::*;
    use crate::auth::permissions::{READ_USERS, UPDATE_USER_STATUS};
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn me_reflects_session_claims() {
        let state = state();
        let user = standard_user(&state, "me@b.com", &[READ_USERS]).await;
        let auth = bearer(&state, &user);
        let app = router(state).unwrap();

        let (status, body) =
            send(app, request(Method::GET, "/v1/users/me", Some(&auth), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], user.id());
        assert_eq!(body["email"], "me@b.com");
        assert_eq!(body["category"], "USER");
        assert_eq!(body["permissions"], json!([READ_USERS]));
    }

    #[tokio::test]
    async fn lookup_requires_read_users() {
        let state = state();
        let target = standard_user(&state, "target@b.com", &[]).await;
        let reader = standard_user(&state, "reader@b.com", &[READ_USERS]).await;
        let outsider = standard_user(&state, "outsider@b.com", &[]).await;
        let app = router(state.clone()).unwrap();

        let uri = "/v1/users/lookup?email=target%40b.com";
        let (status, body) = send(
            app.clone(),
            request(Method::GET, uri, Some(&bearer(&state, &reader)), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], target.id());

        let (status, body) = send(
            app.clone(),
            request(Method::GET, uri, Some(&bearer(&state, &outsider)), None),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "Access Denied.");
        // The required permission is not echoed back
        assert!(!body.to_string().contains(READ_USERS));

        let (status, _) = send(
            app,
            request(
                Method::GET,
                "/v1/users/lookup",
                Some(&bearer(&state, &reader)),
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn status_change_reads_identifier_from_body() {
        let state = state();
        let target = standard_user(&state, "target@b.com", &[]).await;
        let moderator = standard_user(&state, "mod@b.com", &[UPDATE_USER_STATUS]).await;
        let app = router(state.clone()).unwrap();

        let (status, body) = send(
            app,
            request(
                Method::PATCH,
                "/v1/users/status",
                Some(&bearer(&state, &moderator)),
                Some(json!({"email": "target@b.com", "status": "SUSPENDED"})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], target.id());
        assert_eq!(body["status"], "SUSPENDED");
    }

    #[tokio::test]
    async fn super_admin_status_is_fixed() {
        let state = state();
        let admin = super_admin(&state).await;
        let auth = bearer(&state, &admin);
        let app = router(state).unwrap();

        let (status, _) = send(
            app,
            request(
                Method::PATCH,
                "/v1/users/status",
                Some(&auth),
                Some(json!({"email": "root@x.com", "status": "BANNED"})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}
