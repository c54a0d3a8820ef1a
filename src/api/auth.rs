// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session endpoints: registration, login, refresh and one-time passcodes.
//!
//! The refresh token never appears in a response body; it travels only in
//! the `refresh_token` cookie scoped to `/v1/auth`.

use axum::{extract::State, http::StatusCode, Json};
use axum_extra::extract::{
    cookie::{Cookie, CookieJar, SameSite},
    WithRejection,
};
use serde::{Deserialize, Serialize};

use crate::auth::password::{hash_password_blocking, validate_password, verify_password_blocking};
use crate::auth::{AuthError, Ctx, RefreshedToken};
use crate::error::ApiError;
use crate::models::{Account, AccountStatus, AccountView, Category, StandardUser};
use crate::state::AppState;
use crate::telemetry::AUDIT_TARGET;

pub const REFRESH_COOKIE: &str = "refresh_token";
pub const REFRESH_COOKIE_PATH: &str = "/v1/auth";

type JsonBody<T> = WithRejection<Json<T>, ApiError>;

// =============================================================================
// Register
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub password: String,
    pub address: Option<String>,
}

/// Create a standard user with no permissions.
pub async fn register(
    State(state): State<AppState>,
    WithRejection(Json(request), _): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<AccountView>), ApiError> {
    let email = request
        .email
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
        .ok_or(AuthError::MissingEmail)?;
    let phone_number = request
        .phone_number
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty());
    validate_password(&request.password)?;

    let hash = hash_password_blocking(request.password).await?;
    let user = StandardUser::new(Some(email), phone_number, hash, request.address);
    let account = state.accounts.insert_account(Account::Standard(user)).await?;

    tracing::info!(target: AUDIT_TARGET, account_id = %account.id(), "account registered");
    Ok((StatusCode::CREATED, Json(AccountView::from(&account))))
}

// =============================================================================
// Login
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub expires_in: u64,
    pub token_type: &'static str,
    pub category: Category,
}

/// Verify the password of the account resolved by the guard and open a session.
pub async fn login(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    jar: CookieJar,
    WithRejection(Json(request), _): JsonBody<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>), ApiError> {
    let account = ctx.account().cloned().ok_or(AuthError::UnknownUser)?;

    let hash = account
        .password_hash()
        .cloned()
        .ok_or(AuthError::InvalidCredentials)?;
    if !verify_password_blocking(request.password, hash).await? {
        tracing::warn!(target: AUDIT_TARGET, account_id = %account.id(), "password mismatch");
        return Err(AuthError::InvalidCredentials.into());
    }

    let status = account.status();
    if status != AccountStatus::Active {
        return Err(AuthError::AccountInactive { status }.into());
    }

    // Super-admins carry no phone number to receive a passcode on
    if state.session.require_otp_before_login
        && !account.is_super_admin()
        && !state.otp.consume_verification(account.id())
    {
        return Err(AuthError::OtpRequired.into());
    }

    let pair = state.tokens.issue_tokens(&account)?;
    let cookie = Cookie::build((REFRESH_COOKIE, pair.refresh_token.clone()))
        .http_only(true)
        .secure(state.session.cookie_secure)
        .same_site(SameSite::Strict)
        .path(REFRESH_COOKIE_PATH);

    tracing::info!(
        target: AUDIT_TARGET,
        account_id = %account.id(),
        category = %pair.category,
        "login succeeded"
    );

    Ok((
        jar.add(cookie),
        Json(LoginResponse {
            access_token: pair.access_token,
            expires_in: pair.expires_in,
            token_type: "Bearer",
            category: pair.category,
        }),
    ))
}

// =============================================================================
// Refresh
// =============================================================================

/// Exchange the refresh cookie for a new access token.
///
/// The account is loaded again so the new token carries its current
/// permissions; accounts that are gone or no longer active are refused.
pub async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Json<RefreshedToken>, ApiError> {
    let cookie = jar.get(REFRESH_COOKIE).ok_or(AuthError::MissingToken)?;
    let claims = state.tokens.verify_refresh_token(cookie.value())?;

    let account = state
        .accounts
        .find_by_id(&claims.sub)
        .await?
        .ok_or(AuthError::InvalidToken { reason: "subject" })?;
    let status = account.status();
    if status != AccountStatus::Active {
        tracing::warn!(
            target: AUDIT_TARGET,
            account_id = %account.id(),
            %status,
            "refresh refused"
        );
        return Err(AuthError::AccountInactive { status }.into());
    }

    let refreshed = state.tokens.refresh_access_token(&claims, &account)?;
    Ok(Json(refreshed))
}

// =============================================================================
// One-time passcodes
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpIssued {
    pub expires_in: u64,
}

/// Send a passcode to the phone number of the resolved account.
pub async fn request_otp(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
) -> Result<(StatusCode, Json<OtpIssued>), ApiError> {
    let account = ctx.account().ok_or(AuthError::UnknownUser)?;
    let destination = account.phone_number().ok_or(AuthError::MissingPhone)?;
    let ttl = state.otp.issue(account.id(), destination).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(OtpIssued {
            expires_in: ttl.as_secs(),
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct VerifyOtpRequest {
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct OtpVerified {
    pub verified: bool,
}

pub async fn verify_otp(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    WithRejection(Json(request), _): JsonBody<VerifyOtpRequest>,
) -> Result<Json<OtpVerified>, ApiError> {
    let account = ctx.account().ok_or(AuthError::UnknownUser)?;
    state.otp.verify(account.id(), &request.code)?;
    Ok(Json(OtpVerified { verified: true }))
}
