// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Role management endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::WithRejection;
use serde::Deserialize;

use crate::error::ApiError;
use crate::models::{AccountView, Role};
use crate::state::AppState;

type JsonBody<T> = WithRejection<Json<T>, ApiError>;

#[derive(Debug, Deserialize)]
pub struct CreateRoleRequest {
    pub name: String,
    #[serde(default)]
    pub permissions: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub permissions: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRoleRequest {
    pub user_id: String,
    pub role_id: String,
}

pub async fn list_roles(State(state): State<AppState>) -> Result<Json<Vec<Role>>, ApiError> {
    Ok(Json(state.rbac.list_roles().await?))
}

pub async fn create_role(
    State(state): State<AppState>,
    WithRejection(Json(request), _): JsonBody<CreateRoleRequest>,
) -> Result<(StatusCode, Json<Role>), ApiError> {
    let role = state
        .rbac
        .create_role(&request.name, &request.permissions)
        .await?;
    Ok((StatusCode::CREATED, Json(role)))
}

/// Replace a role's permission set.
pub async fn update_role(
    State(state): State<AppState>,
    Path(role_id): Path<String>,
    WithRejection(Json(request), _): JsonBody<UpdateRoleRequest>,
) -> Result<Json<Role>, ApiError> {
    let role = state
        .rbac
        .update_role(&role_id, &request.permissions)
        .await?;
    Ok(Json(role))
}

/// Give an account a role. Super-admin only.
pub async fn assign_role(
    State(state): State<AppState>,
    WithRejection(Json(request), _): JsonBody<AssignRoleRequest>,
) -> Result<Json<AccountView>, ApiError> {
    let account = state
        .rbac
        .assign_role(&request.user_id, &request.role_id)
        .await?;
    Ok(Json(AccountView::from(&account)))
}
