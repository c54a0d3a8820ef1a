// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is loaded from the environment at startup. Any problem here
//! is fatal: the listener is never bound with a half-valid configuration.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `JWT_SECRET` | Shared HS256 signing secret | Required |
//! | `JWT_ISSUER` | Issuer written to and required in tokens | `marketplace-identity` |
//! | `REFRESH_TOKEN_TTL_SECS` | Refresh token lifetime, at most one year | `604800` |
//! | `TOKEN_LEEWAY_SECS` | Clock skew tolerance for `exp`, at most one hour | `60` |
//! | `DATA_DIR` | Directory for `identity.redb` | unset (in-memory store) |
//! | `SUPER_ADMIN_EMAIL` | Bootstrap super-admin email | unset |
//! | `SUPER_ADMIN_PASSWORD` | Bootstrap super-admin password | unset |
//! | `SUPER_ADMIN_NAME` | Bootstrap super-admin display name | `Super Admin` |
//! | `REQUIRE_OTP_BEFORE_LOGIN` | Require a verified passcode before password login | `false` |
//! | `OTP_TTL_SECS` | One-time passcode lifetime, at most one day | `300` |
//! | `COOKIE_SECURE` | `Secure` attribute on the refresh cookie | `true` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::telemetry::LogFormat;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const JWT_SECRET_ENV: &str = "JWT_SECRET";
pub const JWT_ISSUER_ENV: &str = "JWT_ISSUER";
pub const REFRESH_TOKEN_TTL_ENV: &str = "REFRESH_TOKEN_TTL_SECS";
pub const TOKEN_LEEWAY_ENV: &str = "TOKEN_LEEWAY_SECS";

/// Directory holding the redb database file. Unset selects the in-memory store.
pub const DATA_DIR_ENV: &str = "DATA_DIR";

pub const SUPER_ADMIN_EMAIL_ENV: &str = "SUPER_ADMIN_EMAIL";
pub const SUPER_ADMIN_PASSWORD_ENV: &str = "SUPER_ADMIN_PASSWORD";
pub const SUPER_ADMIN_NAME_ENV: &str = "SUPER_ADMIN_NAME";
pub const REQUIRE_OTP_ENV: &str = "REQUIRE_OTP_BEFORE_LOGIN";
pub const OTP_TTL_ENV: &str = "OTP_TTL_SECS";
pub const COOKIE_SECURE_ENV: &str = "COOKIE_SECURE";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_ISSUER: &str = "marketplace-identity";
pub const DEFAULT_REFRESH_TTL_SECS: u64 = 7 * 24 * 60 * 60;
pub const DEFAULT_LEEWAY_SECS: u64 = 60;
pub const DEFAULT_OTP_TTL_SECS: u64 = 300;

/// Upper bounds on configured durations, in seconds.
pub const MAX_REFRESH_TTL_SECS: u64 = 365 * 24 * 60 * 60;
pub const MAX_LEEWAY_SECS: u64 = 60 * 60;
pub const MAX_OTP_TTL_SECS: u64 = 24 * 60 * 60;

/// Database file name inside `DATA_DIR`.
pub const DB_FILE_NAME: &str = "identity.redb";

// =============================================================================
// Errors
// =============================================================================

/// Startup-time configuration failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("JWT_SECRET is missing or empty")]
    InvalidSigningSecret,

    #[error("invalid value for {name}: {reason}")]
    InvalidValue { name: &'static str, reason: String },

    #[error("route requires unknown permission '{0}'")]
    UnknownPermission(String),

    #[error("permission '{0}' is registered in more than one category")]
    DuplicatePermission(String),
}

// =============================================================================
// Token configuration
// =============================================================================

/// Signing material and lifetimes for the token service.
#[derive(Clone)]
pub struct TokenConfig {
    pub secret: String,
    pub issuer: String,
    pub refresh_ttl: Duration,
    pub leeway: Duration,
}

impl TokenConfig {
    pub fn new(secret: impl Into<String>) -> Result<Self, ConfigError> {
        let secret = secret.into();
        if secret.trim().is_empty() {
            return Err(ConfigError::InvalidSigningSecret);
        }
        Ok(Self {
            secret,
            issuer: DEFAULT_ISSUER.to_string(),
            refresh_ttl: Duration::from_secs(DEFAULT_REFRESH_TTL_SECS),
            leeway: Duration::from_secs(DEFAULT_LEEWAY_SECS),
        })
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    pub fn with_refresh_ttl(mut self, ttl: Duration) -> Self {
        self.refresh_ttl = ttl;
        self
    }

    pub fn with_leeway(mut self, leeway: Duration) -> Self {
        self.leeway = leeway;
        self
    }
}

impl fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("leeway", &self.leeway)
            .finish()
    }
}

// =============================================================================
// Bootstrap super-admin
// =============================================================================

#[derive(Clone)]
pub struct BootstrapAdmin {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl fmt::Debug for BootstrapAdmin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BootstrapAdmin")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

// =============================================================================
// AppConfig
// =============================================================================

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub token: TokenConfig,
    pub data_dir: Option<PathBuf>,
    pub bootstrap_admin: Option<BootstrapAdmin>,
    pub require_otp_before_login: bool,
    pub otp_ttl: Duration,
    pub cookie_secure: bool,
    pub log_format: LogFormat,
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let secret = get(JWT_SECRET_ENV).ok_or(ConfigError::InvalidSigningSecret)?;
        let token = TokenConfig::new(secret)?
            .with_issuer(get(JWT_ISSUER_ENV).unwrap_or_else(|| DEFAULT_ISSUER.to_string()))
            .with_refresh_ttl(parse_secs(
                REFRESH_TOKEN_TTL_ENV,
                get(REFRESH_TOKEN_TTL_ENV),
                DEFAULT_REFRESH_TTL_SECS,
                MAX_REFRESH_TTL_SECS,
            )?)
            .with_leeway(parse_secs(
                TOKEN_LEEWAY_ENV,
                get(TOKEN_LEEWAY_ENV),
                DEFAULT_LEEWAY_SECS,
                MAX_LEEWAY_SECS,
            )?);

        let bootstrap_admin = match (get(SUPER_ADMIN_EMAIL_ENV), get(SUPER_ADMIN_PASSWORD_ENV)) {
            (Some(email), Some(password)) => Some(BootstrapAdmin {
                name: get(SUPER_ADMIN_NAME_ENV).unwrap_or_else(|| "Super Admin".to_string()),
                email: email.trim().to_string(),
                password,
            }),
            (None, None) => None,
            _ => {
                return Err(ConfigError::InvalidValue {
                    name: SUPER_ADMIN_EMAIL_ENV,
                    reason: "SUPER_ADMIN_EMAIL and SUPER_ADMIN_PASSWORD must be set together"
                        .to_string(),
                })
            }
        };

        let log_format = match get(LOG_FORMAT_ENV) {
            Some(value) => LogFormat::parse(&value).ok_or_else(|| ConfigError::InvalidValue {
                name: LOG_FORMAT_ENV,
                reason: format!("expected 'json' or 'pretty', got '{value}'"),
            })?,
            None => LogFormat::Pretty,
        };

        Ok(Self {
            host: get(HOST_ENV).unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(PORT_ENV, get(PORT_ENV), 8080)?,
            token,
            data_dir: get(DATA_DIR_ENV).map(PathBuf::from),
            bootstrap_admin,
            require_otp_before_login: parse_bool(REQUIRE_OTP_ENV, get(REQUIRE_OTP_ENV), false)?,
            otp_ttl: parse_secs(
                OTP_TTL_ENV,
                get(OTP_TTL_ENV),
                DEFAULT_OTP_TTL_SECS,
                MAX_OTP_TTL_SECS,
            )?,
            cookie_secure: parse_bool(COOKIE_SECURE_ENV, get(COOKIE_SECURE_ENV), true)?,
            log_format,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Path of the redb file, when persistent storage is configured.
    pub fn db_path(&self) -> Option<PathBuf> {
        self.data_dir.as_ref().map(|dir| dir.join(DB_FILE_NAME))
    }
}

fn parse_or<T>(name: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    match value {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            name,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

/// A duration in whole seconds, at most `max`.
fn parse_secs(
    name: &'static str,
    value: Option<String>,
    default: u64,
    max: u64,
) -> Result<Duration, ConfigError> {
    let secs = parse_or(name, value, default)?;
    if secs > max {
        return Err(ConfigError::InvalidValue {
            name,
            reason: format!("{secs} exceeds the maximum of {max} seconds"),
        });
    }
    Ok(Duration::from_secs(secs))
}

fn parse_bool(
    name: &'static str,
    value: Option<String>,
    default: bool,
) -> Result<bool, ConfigError> {
    match value.as_deref().map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
        Some(v) => Err(ConfigError::InvalidValue {
            name,
            reason: format!("expected a boolean, got '{v}'"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn missing_secret_is_fatal() {
        let result = AppConfig::from_lookup(lookup(&[]));
        assert!(matches!(result, Err(ConfigError::InvalidSigningSecret)));

        let result = AppConfig::from_lookup(lookup(&[(JWT_SECRET_ENV, "   ")]));
        assert!(matches!(result, Err(ConfigError::InvalidSigningSecret)));
    }

    #[test]
    fn defaults_apply() {
        let config = AppConfig::from_lookup(lookup(&[(JWT_SECRET_ENV, "s3cret")])).unwrap();
        assert_eq!(config.bind_addr(), "0.0.0.0:8080");
        assert_eq!(config.token.issuer, DEFAULT_ISSUER);
        assert_eq!(config.token.refresh_ttl, Duration::from_secs(604_800));
        assert_eq!(config.token.leeway, Duration::from_secs(60));
        assert!(config.data_dir.is_none());
        assert!(config.bootstrap_admin.is_none());
        assert!(!config.require_otp_before_login);
        assert!(config.cookie_secure);
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn overrides_are_parsed() {
        let config = AppConfig::from_lookup(lookup(&[
            (JWT_SECRET_ENV, "s3cret"),
            (PORT_ENV, "9000"),
            (DATA_DIR_ENV, "/var/lib/identity"),
            (REQUIRE_OTP_ENV, "true"),
            (COOKIE_SECURE_ENV, "0"),
            (LOG_FORMAT_ENV, "json"),
            (SUPER_ADMIN_EMAIL_ENV, " root@example.com "),
            (SUPER_ADMIN_PASSWORD_ENV, "pw"),
        ]))
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(
            config.db_path(),
            Some(PathBuf::from("/var/lib/identity/identity.redb"))
        );
        assert!(config.require_otp_before_login);
        assert!(!config.cookie_secure);
        assert_eq!(config.log_format, LogFormat::Json);
        let admin = config.bootstrap_admin.unwrap();
        assert_eq!(admin.email, "root@example.com");
        assert_eq!(admin.name, "Super Admin");
    }

    #[test]
    fn bad_numbers_are_reported_by_name() {
        let result =
            AppConfig::from_lookup(lookup(&[(JWT_SECRET_ENV, "s"), (PORT_ENV, "eighty")]));
        assert!(matches!(result, Err(ConfigError::InvalidValue { name, .. }) if name == PORT_ENV));
    }

    #[test]
    fn oversized_lifetimes_are_rejected() {
        let huge = u64::MAX.to_string();
        let result = AppConfig::from_lookup(lookup(&[
            (JWT_SECRET_ENV, "s"),
            (REFRESH_TOKEN_TTL_ENV, huge.as_str()),
        ]));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { name, .. }) if name == REFRESH_TOKEN_TTL_ENV
        ));

        let result =
            AppConfig::from_lookup(lookup(&[(JWT_SECRET_ENV, "s"), (OTP_TTL_ENV, "86401")]));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { name, .. }) if name == OTP_TTL_ENV
        ));

        let max = MAX_REFRESH_TTL_SECS.to_string();
        let config = AppConfig::from_lookup(lookup(&[
            (JWT_SECRET_ENV, "s"),
            (REFRESH_TOKEN_TTL_ENV, max.as_str()),
        ]))
        .unwrap();
        assert_eq!(config.token.refresh_ttl, Duration::from_secs(MAX_REFRESH_TTL_SECS));
    }

    #[test]
    fn half_configured_admin_is_rejected() {
        let result = AppConfig::from_lookup(lookup(&[
            (JWT_SECRET_ENV, "s"),
            (SUPER_ADMIN_EMAIL_ENV, "root@example.com"),
        ]));
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let config = AppConfig::from_lookup(lookup(&[
            (JWT_SECRET_ENV, "top-secret-value"),
            (SUPER_ADMIN_EMAIL_ENV, "root@example.com"),
            (SUPER_ADMIN_PASSWORD_ENV, "hunter2"),
        ]))
        .unwrap();
        let printed = format!("{config:?}");
        assert!(!printed.contains("top-secret-value"));
        assert!(!printed.contains("hunter2"));
    }
}
