// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication and authorization errors.
//!
//! Every failure in identity resolution, token handling, the guard chain and
//! the RBAC engine is an [`AuthError`]. Each variant carries:
//!
//! - a stable machine code ([`AuthError::code`]) used in audit logs
//! - an HTTP status ([`AuthError::status_code`])
//! - a user-facing message and structured details, rendered through
//!   [`crate::error::ApiError`]
//!
//! Category and permission failures deliberately render without details so
//! the response never discloses the route's allow-list or required permission.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::models::{AccountStatus, Category};
use crate::storage::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// `email` absent where the route requires it
    #[error("email identifier is missing")]
    MissingEmail,

    /// `phoneNumber` absent where the route requires it
    #[error("phone number identifier is missing")]
    MissingPhone,

    /// Identifier resolved to no account in any searched partition
    #[error("no account found for identifier '{identifier}'")]
    AccountNotFound { identifier: String },

    #[error("authorization header is not present")]
    MissingAuthHeader,

    /// Header present but carries no token segment
    #[error("bearer token is not present")]
    MissingToken,

    /// Bad signature, malformed payload, wrong issuer or wrong token use
    #[error("invalid token: {reason}")]
    InvalidToken { reason: &'static str },

    #[error("token has expired")]
    ExpiredToken,

    /// Effective category is not in the route's allow-list
    #[error("category {category:?} is not allowed on this route")]
    UnauthorizedCategory { category: Option<Category> },

    #[error("effective user lacks the required permission")]
    InsufficientPermission,

    /// Permission gate reached with no user in the request context
    #[error("no user present in request context")]
    UnknownUser,

    /// Super-admin gate or protected-account rule failed
    #[error("permission denied: {reason}")]
    PermissionDenied { reason: &'static str },

    #[error("unknown permission '{name}'")]
    InvalidPermissionsName { name: String },

    #[error("role '{role_id}' not found")]
    RoleNotFound { role_id: String },

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("account is {status}")]
    AccountInactive { status: AccountStatus },

    #[error("one-time passcode is invalid or expired")]
    InvalidOtp,

    #[error("one-time passcode verification required")]
    OtpRequired,

    #[error("invalid request: {0}")]
    InvalidRequest(&'static str),

    #[error("conflict: {0}")]
    Conflict(String),

    /// Signing secret or account variant misconfigured
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MissingEmail => "missing_email",
            AuthError::MissingPhone => "missing_phone",
            AuthError::AccountNotFound { .. } => "account_not_found",
            AuthError::MissingAuthHeader => "missing_auth_header",
            AuthError::MissingToken => "missing_token",
            AuthError::InvalidToken { .. } => "invalid_token",
            AuthError::ExpiredToken => "token_expired",
            AuthError::UnauthorizedCategory { .. } => "unauthorized_category",
            AuthError::InsufficientPermission => "insufficient_permission",
            AuthError::UnknownUser => "unknown_user",
            AuthError::PermissionDenied { .. } => "permission_denied",
            AuthError::InvalidPermissionsName { .. } => "invalid_permissions_name",
            AuthError::RoleNotFound { .. } => "role_not_found",
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::AccountInactive { .. } => "account_inactive",
            AuthError::InvalidOtp => "invalid_otp",
            AuthError::OtpRequired => "otp_required",
            AuthError::InvalidRequest(_) => "invalid_request",
            AuthError::Conflict(_) => "conflict",
            AuthError::Configuration(_) => "configuration_error",
            AuthError::Internal(_) => "internal_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingEmail
            | AuthError::MissingPhone
            | AuthError::MissingAuthHeader
            | AuthError::MissingToken
            | AuthError::InvalidPermissionsName { .. }
            | AuthError::InvalidOtp
            | AuthError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AuthError::InvalidToken { .. }
            | AuthError::ExpiredToken
            | AuthError::UnknownUser
            | AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AuthError::UnauthorizedCategory { .. }
            | AuthError::InsufficientPermission
            | AuthError::PermissionDenied { .. }
            | AuthError::AccountInactive { .. }
            | AuthError::OtpRequired => StatusCode::FORBIDDEN,
            AuthError::AccountNotFound { .. } | AuthError::RoleNotFound { .. } => {
                StatusCode::NOT_FOUND
            }
            AuthError::Conflict(_) => StatusCode::CONFLICT,
            AuthError::Configuration(_) | AuthError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// User-facing message.
    pub fn message(&self) -> &'static str {
        match self {
            AuthError::MissingAuthHeader
            | AuthError::MissingToken
            | AuthError::InvalidToken { .. }
            | AuthError::ExpiredToken
            | AuthError::UnknownUser
            | AuthError::InvalidCredentials => "UnAuthorised User.",
            AuthError::UnauthorizedCategory { .. }
            | AuthError::InsufficientPermission
            | AuthError::PermissionDenied { .. }
            | AuthError::AccountInactive { .. }
            | AuthError::OtpRequired => "Access Denied.",
            AuthError::MissingEmail
            | AuthError::MissingPhone
            | AuthError::InvalidOtp
            | AuthError::InvalidRequest(_) => "Invalid Request.",
            AuthError::AccountNotFound { .. } => "User Not Found.",
            AuthError::RoleNotFound { .. } => "Role Not Found.",
            AuthError::InvalidPermissionsName { .. } => "Invalid Permissions.",
            AuthError::Conflict(_) => "Conflict.",
            AuthError::Configuration(_) | AuthError::Internal(_) => "Internal Server Error.",
        }
    }

    /// Structured diagnostic context. Never contains credentials or tokens.
    pub fn details(&self) -> Value {
        match self {
            AuthError::MissingEmail => json!("Email Is Required"),
            AuthError::MissingPhone => json!("Phone Number Is Required"),
            AuthError::AccountNotFound { .. } => {
                json!("No Account Matches The Supplied Identifier")
            }
            AuthError::MissingAuthHeader => json!("Auth Header Is Not Present"),
            AuthError::MissingToken => json!("Token Is Not Present"),
            AuthError::InvalidToken { .. } => json!("Invalid Token"),
            AuthError::ExpiredToken => json!("Token Has Expired"),
            AuthError::UnknownUser => json!("User Is Not Present In Request"),
            AuthError::InvalidPermissionsName { name } => json!({ "permission": name }),
            AuthError::RoleNotFound { role_id } => json!({ "roleId": role_id }),
            AuthError::InvalidCredentials => json!("Invalid Credentials"),
            AuthError::AccountInactive { status } => json!({ "status": status }),
            AuthError::InvalidOtp => json!("Invalid Or Expired Code"),
            AuthError::OtpRequired => json!("Verification Code Required"),
            AuthError::InvalidRequest(reason) => json!(reason),
            AuthError::Conflict(what) => json!(what),
            AuthError::UnauthorizedCategory { .. }
            | AuthError::InsufficientPermission
            | AuthError::PermissionDenied { .. }
            | AuthError::Configuration(_)
            | AuthError::Internal(_) => Value::Null,
        }
    }

    /// True for the token-related kinds audited separately.
    pub fn is_token_failure(&self) -> bool {
        matches!(
            self,
            AuthError::MissingAuthHeader
                | AuthError::MissingToken
                | AuthError::InvalidToken { .. }
                | AuthError::ExpiredToken
        )
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::AlreadyExists(what) => {
                AuthError::Conflict(format!("{what} already exists"))
            }
            other => AuthError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_of(err: AuthError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn missing_auth_header_renders_fixed_shape() {
        let (status, body) = body_of(AuthError::MissingAuthHeader).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["statusCode"], 400);
        assert_eq!(body["message"], "UnAuthorised User.");
        assert_eq!(body["details"], "Auth Header Is Not Present");
    }

    #[tokio::test]
    async fn permission_failures_do_not_leak_requirements() {
        let (status, body) = body_of(AuthError::InsufficientPermission).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(body["details"].is_null());

        let (_, body) = body_of(AuthError::UnauthorizedCategory {
            category: Some(Category::User),
        })
        .await;
        assert!(body["details"].is_null());
        assert!(!body.to_string().contains("USER"));
    }

    #[tokio::test]
    async fn internal_errors_hide_cause() {
        let (status, body) = body_of(AuthError::Internal("redb exploded at /data".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Internal Server Error.");
        assert!(!body.to_string().contains("redb"));
    }

    #[tokio::test]
    async fn account_not_found_omits_identifier() {
        let (status, body) = body_of(AuthError::AccountNotFound {
            identifier: "a@b.com".into(),
        })
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(!body.to_string().contains("a@b.com"));
    }

    #[test]
    fn expiry_is_distinguishable_from_forgery() {
        let expired = AuthError::ExpiredToken;
        let forged = AuthError::InvalidToken { reason: "signature" };
        assert_ne!(expired.code(), forged.code());
        assert_eq!(expired.status_code(), forged.status_code());
        assert!(expired.is_token_failure() && forged.is_token_failure());
    }

    #[test]
    fn store_errors_map_to_internal_except_conflicts() {
        let err: AuthError = StoreError::Backend("disk full".into()).into();
        assert!(matches!(err, AuthError::Internal(_)));

        let err: AuthError = StoreError::NotFound("Account x".into()).into();
        assert!(matches!(err, AuthError::Internal(_)));

        let err: AuthError = StoreError::AlreadyExists("Role named editor".into()).into();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }
}
