// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::state::AppState;

/// Readiness response with individual component status.
#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    /// Overall health status ("ok" or "degraded").
    pub status: String,
    pub checks: HealthChecks,
}

#[derive(Debug, Serialize)]
pub struct HealthChecks {
    /// Whether the service process is running.
    pub service: String,
    /// Account store reachability.
    pub store: String,
    /// Registered permission count.
    pub permissions: usize,
}

/// Simple health check response for liveness probes.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Liveness probe handler.
///
/// Always returns 200 if the process is running.
/// Does not check dependencies - use readiness for that.
pub async fn liveness() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Readiness probe handler.
///
/// Returns 200 when the account store answers, 503 otherwise.
pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let store = match state.accounts.health_check().await {
        Ok(()) => "ok",
        Err(e) => {
            tracing::warn!(error = %e, "account store health check failed");
            "unavailable"
        }
    };
    let all_ok = store == "ok" && !state.registry.is_empty();

    let response = ReadyResponse {
        status: if all_ok { "ok" } else { "degraded" }.to_string(),
        checks: HealthChecks {
            service: "ok".to_string(),
            store: store.to_string(),
            permissions: state.registry.len(),
        },
    };

    let status = if all_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TokenConfig;
    use crate::models::{Account, AccountUpdate, Partition, PermissionSet};
    use crate::storage::{AccountStore, MemoryStore, RoleStore, StoreError, StoreResult};
    use async_trait::async_trait;
    use std::sync::Arc;

    #[tokio::test]
    async fn liveness_is_ok() {
        let Json(body) = liveness().await;
        assert_eq!(body.status, "ok");
    }

    #[tokio::test]
    async fn readiness_with_memory_store() {
        let state = AppState::in_memory(&TokenConfig::new("s").unwrap());
        let (status, Json(body)) = readiness(State(state)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.checks.store, "ok");
        assert!(body.checks.permissions > 0);
    }

    struct DownStore;

    #[async_trait]
    impl AccountStore for DownStore {
        async fn find_by_email(&self, _: Partition, _: &str) -> StoreResult<Option<Account>> {
            Err(StoreError::Backend("down".into()))
        }
        async fn find_by_phone(&self, _: Partition, _: &str) -> StoreResult<Option<Account>> {
            Err(StoreError::Backend("down".into()))
        }
        async fn find_by_id(&self, _: &str) -> StoreResult<Option<Account>> {
            Err(StoreError::Backend("down".into()))
        }
        async fn insert_account(&self, _: Account) -> StoreResult<Account> {
            Err(StoreError::Backend("down".into()))
        }
        async fn update_account(&self, _: &str, _: AccountUpdate) -> StoreResult<Account> {
            Err(StoreError::Backend("down".into()))
        }
        async fn assign_role(&self, _: &str, _: &str, _: &PermissionSet) -> StoreResult<Account> {
            Err(StoreError::Backend("down".into()))
        }
        async fn health_check(&self) -> StoreResult<()> {
            Err(StoreError::Backend("down".into()))
        }
    }

    #[tokio::test]
    async fn readiness_reports_store_outage() {
        let roles: Arc<dyn RoleStore> = Arc::new(MemoryStore::new());
        let state = AppState::new(&TokenConfig::new("s").unwrap(), Arc::new(DownStore), roles);
        let (status, Json(body)) = readiness(State(state)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body.status, "degraded");
        assert_eq!(body.checks.store, "unavailable");
    }
}
