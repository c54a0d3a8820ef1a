// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;
use std::time::Duration;

use crate::auth::otp::DEFAULT_CAPACITY;
use crate::auth::{
    AuthChain, AuthServices, Guard, OtpService, PermissionRegistry, RbacEngine, TokenService,
};
use crate::config::{AppConfig, ConfigError, TokenConfig, DEFAULT_OTP_TTL_SECS};
use crate::storage::{AccountStore, MemoryStore, RoleStore};

/// Login-time behaviour switches.
#[derive(Debug, Clone, Copy)]
pub struct SessionPolicy {
    pub require_otp_before_login: bool,
    pub cookie_secure: bool,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            require_otp_before_login: false,
            cookie_secure: true,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<PermissionRegistry>,
    pub tokens: Arc<TokenService>,
    pub accounts: Arc<dyn AccountStore>,
    pub roles: Arc<dyn RoleStore>,
    pub rbac: RbacEngine,
    pub otp: Arc<OtpService>,
    pub session: SessionPolicy,
}

impl AppState {
    pub fn new(
        token: &TokenConfig,
        accounts: Arc<dyn AccountStore>,
        roles: Arc<dyn RoleStore>,
    ) -> Self {
        Self::with_otp_ttl(
            token,
            Duration::from_secs(DEFAULT_OTP_TTL_SECS),
            accounts,
            roles,
        )
    }

    fn with_otp_ttl(
        token: &TokenConfig,
        otp_ttl: Duration,
        accounts: Arc<dyn AccountStore>,
        roles: Arc<dyn RoleStore>,
    ) -> Self {
        let registry = Arc::new(PermissionRegistry::standard());
        let otp = OtpService::new(token.secret.as_bytes(), otp_ttl, DEFAULT_CAPACITY);
        Self {
            rbac: RbacEngine::new(registry.clone(), roles.clone(), accounts.clone()),
            registry,
            tokens: Arc::new(TokenService::new(token)),
            accounts,
            roles,
            otp: Arc::new(otp),
            session: SessionPolicy::default(),
        }
    }

    /// State over a fresh in-memory store.
    pub fn in_memory(token: &TokenConfig) -> Self {
        let store = MemoryStore::new();
        Self::new(token, Arc::new(store.clone()), Arc::new(store))
    }

    /// State with OTP lifetime and session policy taken from configuration.
    pub fn from_config(
        config: &AppConfig,
        accounts: Arc<dyn AccountStore>,
        roles: Arc<dyn RoleStore>,
    ) -> Self {
        Self::with_otp_ttl(&config.token, config.otp_ttl, accounts, roles)
            .with_session_policy(SessionPolicy {
                require_otp_before_login: config.require_otp_before_login,
                cookie_secure: config.cookie_secure,
            })
    }

    pub fn with_otp(mut self, otp: OtpService) -> Self {
        self.otp = Arc::new(otp);
        self
    }

    pub fn with_session_policy(mut self, session: SessionPolicy) -> Self {
        self.session = session;
        self
    }

    pub fn auth_services(&self) -> AuthServices {
        AuthServices::new(self.tokens.clone(), self.accounts.clone())
    }

    /// Validate a chain against the registry and bind it to this state's services.
    pub fn guard(&self, chain: AuthChain) -> Result<Guard, ConfigError> {
        let chain = chain.validate(&self.registry)?;
        Ok(Guard::new(chain, self.auth_services()))
    }
}
