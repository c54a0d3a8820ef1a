// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, Json};

use crate::auth::permissions::PermissionCatalog;
use crate::state::AppState;

/// The four permission maps (create, read, update, delete).
pub async fn list_permissions(State(state): State<AppState>) -> Json<PermissionCatalog> {
    Json(state.registry.list_permissions().clone())
}
