// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Identity Resolver
//!
//! Locates the account behind a request identifier.
//!
//! ## Identifier source
//!
//! | Method | Source |
//! |--------|--------|
//! | `GET`, `HEAD`, `DELETE`, `OPTIONS` | query string |
//! | `POST`, `PUT`, `PATCH` | JSON body |
//!
//! Bodyless methods never read an identifier from a body.
//!
//! ## Partition search order
//!
//! | Identifier | Partitions, in order |
//! |------------|----------------------|
//! | `email` | standard users, super-admins |
//! | `phoneNumber` | standard users, passwordless users |
//!
//! Stores keep standard-user and super-admin emails in one namespace, so an
//! email search never has two candidates.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use axum::http::Method;
use serde_json::Value;

use super::context::{Identifier, IdentifierKind};
use super::AuthError;
use crate::models::{Account, Partition};
use crate::storage::AccountStore;

/// The parts of an HTTP request the guard chain reads.
#[derive(Clone, Default)]
pub struct RequestInput {
    pub method: Method,
    pub query: HashMap<String, String>,
    /// Parsed JSON body, when the request carried one
    pub body: Option<Value>,
    /// Raw `Authorization` header value
    pub authorization: Option<String>,
}

impl fmt::Debug for RequestInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestInput")
            .field("method", &self.method)
            .field("query_keys", &self.query.keys().collect::<Vec<_>>())
            .field("has_body", &self.body.is_some())
            .field("has_authorization", &self.authorization.is_some())
            .finish()
    }
}

fn reads_query(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::HEAD | Method::DELETE | Method::OPTIONS
    )
}

/// Partitions searched for an identifier kind, in order.
pub fn search_order(kind: IdentifierKind) -> &'static [Partition] {
    match kind {
        IdentifierKind::Email => &[Partition::Standard, Partition::SuperAdmin],
        IdentifierKind::PhoneNumber => &[Partition::Standard, Partition::Passwordless],
    }
}

/// Pull the identifier of `kind` out of the request.
///
/// Values are trimmed; an empty value counts as absent.
pub fn extract_identifier(
    kind: IdentifierKind,
    input: &RequestInput,
) -> Result<Identifier, AuthError> {
    let field = kind.field();
    let raw = if reads_query(&input.method) {
        input.query.get(field).map(String::as_str)
    } else {
        input
            .body
            .as_ref()
            .and_then(|body| body.get(field))
            .and_then(Value::as_str)
    };

    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        Some(value) => Ok(Identifier {
            kind,
            value: value.to_string(),
        }),
        None => Err(match kind {
            IdentifierKind::Email => AuthError::MissingEmail,
            IdentifierKind::PhoneNumber => AuthError::MissingPhone,
        }),
    }
}

#[derive(Clone)]
pub struct IdentityResolver {
    accounts: Arc<dyn AccountStore>,
}

impl IdentityResolver {
    pub fn new(accounts: Arc<dyn AccountStore>) -> Self {
        Self { accounts }
    }

    /// Find the account for an identifier, searching partitions in order.
    ///
    /// Not-found is [`AuthError::AccountNotFound`]; any store failure is
    /// [`AuthError::Internal`].
    pub async fn resolve(&self, identifier: &Identifier) -> Result<Account, AuthError> {
        for partition in search_order(identifier.kind) {
            let found = match identifier.kind {
                IdentifierKind::Email => {
                    self.accounts
                        .find_by_email(*partition, &identifier.value)
                        .await?
                }
                IdentifierKind::PhoneNumber => {
                    self.accounts
                        .find_by_phone(*partition, &identifier.value)
                        .await?
                }
            };
            if let Some(account) = found {
                return Ok(account);
            }
        }

        Err(AuthError::AccountNotFound {
            identifier: identifier.value.clone(),
        })
    }

    /// Extract and resolve in one step.
    pub async fn resolve_request(
        &self,
        kind: IdentifierKind,
        input: &RequestInput,
    ) -> Result<(Identifier, Account), AuthError> {
        let identifier = extract_identifier(kind, input)?;
        let account = self.resolve(&identifier).await?;
        Ok((identifier, account))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PasswordHash, PasswordlessUser, PermissionSet, StandardUser, SuperAdmin};
    use crate::storage::{MemoryStore, StoreError, StoreResult};
    use crate::models::AccountUpdate;
    use async_trait::async_trait;
    use serde_json::json;

    fn input(method: Method, query: &[(&str, &str)], body: Option<Value>) -> RequestInput {
        RequestInput {
            method,
            query: query
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            body,
            authorization: None,
        }
    }

    #[test]
    fn get_reads_query_and_ignores_body() {
        let req = input(
            Method::GET,
            &[("email", " a@b.com ")],
            Some(json!({"email": "body@b.com"})),
        );
        let id = extract_identifier(IdentifierKind::Email, &req).unwrap();
        assert_eq!(id.value, "a@b.com");

        let req = input(Method::GET, &[], Some(json!({"email": "body@b.com"})));
        assert!(matches!(
            extract_identifier(IdentifierKind::Email, &req),
            Err(AuthError::MissingEmail)
        ));
    }

    #[test]
    fn post_and_patch_read_body() {
        for method in [Method::POST, Method::PATCH, Method::PUT] {
            let req = input(method, &[("phoneNumber", "+1")], Some(json!({"phoneNumber": "+2"})));
            let id = extract_identifier(IdentifierKind::PhoneNumber, &req).unwrap();
            assert_eq!(id.value, "+2");
        }
    }

    #[test]
    fn empty_or_non_string_counts_as_missing() {
        let req = input(Method::POST, &[], Some(json!({"phoneNumber": "   "})));
        assert!(matches!(
            extract_identifier(IdentifierKind::PhoneNumber, &req),
            Err(AuthError::MissingPhone)
        ));
        let req = input(Method::POST, &[], Some(json!({"email": 42})));
        assert!(matches!(
            extract_identifier(IdentifierKind::Email, &req),
            Err(AuthError::MissingEmail)
        ));
        let req = input(Method::POST, &[], None);
        assert!(extract_identifier(IdentifierKind::Email, &req).is_err());
    }

    fn email(value: &str) -> Identifier {
        Identifier {
            kind: IdentifierKind::Email,
            value: value.into(),
        }
    }

    fn phone(value: &str) -> Identifier {
        Identifier {
            kind: IdentifierKind::PhoneNumber,
            value: value.into(),
        }
    }

    #[tokio::test]
    async fn email_falls_back_to_super_admin() {
        let store = MemoryStore::new();
        let admin = Account::SuperAdmin(SuperAdmin::new(
            "Root",
            "root@x.com",
            PasswordHash("h".into()),
            PermissionSet::new(),
        ));
        store.insert_account(admin.clone()).await.unwrap();

        let resolver = IdentityResolver::new(Arc::new(store));
        let found = resolver.resolve(&email("root@x.com")).await.unwrap();
        assert_eq!(found.id(), admin.id());
    }

    #[tokio::test]
    async fn super_admin_email_cannot_be_shadowed() {
        let store = MemoryStore::new();
        let admin = store
            .insert_account(Account::SuperAdmin(SuperAdmin::new(
                "Root",
                "dup@x.com",
                PasswordHash("h".into()),
                PermissionSet::new(),
            )))
            .await
            .unwrap();
        let squatter = store
            .insert_account(Account::Standard(StandardUser::new(
                Some("dup@x.com".into()),
                None,
                PasswordHash("h".into()),
                None,
            )))
            .await;
        assert!(matches!(squatter, Err(StoreError::AlreadyExists(_))));

        let resolver = IdentityResolver::new(Arc::new(store));
        let found = resolver.resolve(&email("dup@x.com")).await.unwrap();
        assert_eq!(found.id(), admin.id());
    }

    #[tokio::test]
    async fn phone_falls_back_to_passwordless() {
        let store = MemoryStore::new();
        let pl = Account::Passwordless(PasswordlessUser::new("+4915"));
        store.insert_account(pl.clone()).await.unwrap();

        let resolver = IdentityResolver::new(Arc::new(store));
        let found = resolver.resolve(&phone("+4915")).await.unwrap();
        assert_eq!(found.partition(), Partition::Passwordless);
    }

    #[tokio::test]
    async fn unknown_email_is_not_found() {
        let resolver = IdentityResolver::new(Arc::new(MemoryStore::new()));
        let err = resolver.resolve(&email("ghost@x.com")).await.unwrap_err();
        assert!(matches!(
            err,
            AuthError::AccountNotFound { identifier } if identifier == "ghost@x.com"
        ));
    }

    struct FailingStore;

    #[async_trait]
    impl AccountStore for FailingStore {
        async fn find_by_email(&self, _: Partition, _: &str) -> StoreResult<Option<Account>> {
            Err(StoreError::Backend("timeout".into()))
        }
        async fn find_by_phone(&self, _: Partition, _: &str) -> StoreResult<Option<Account>> {
            Err(StoreError::Backend("timeout".into()))
        }
        async fn find_by_id(&self, _: &str) -> StoreResult<Option<Account>> {
            Err(StoreError::Backend("timeout".into()))
        }
        async fn insert_account(&self, _: Account) -> StoreResult<Account> {
            Err(StoreError::Backend("timeout".into()))
        }
        async fn update_account(&self, _: &str, _: AccountUpdate) -> StoreResult<Account> {
            Err(StoreError::Backend("timeout".into()))
        }
        async fn assign_role(&self, _: &str, _: &str, _: &PermissionSet) -> StoreResult<Account> {
            Err(StoreError::Backend("timeout".into()))
        }
    }

    #[tokio::test]
    async fn store_failure_is_internal_not_not_found() {
        let resolver = IdentityResolver::new(Arc::new(FailingStore));
        let err = resolver.resolve(&email("a@b.com")).await.unwrap_err();
        assert!(matches!(err, AuthError::Internal(_)));
    }
}
