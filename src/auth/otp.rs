// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! One-time passcodes.
//!
//! Codes are six digits, keyed by account id, and held only as HMAC-SHA256
//! digests in a bounded LRU. An entry is dropped when it expires, after
//! [`MAX_ATTEMPTS`] wrong guesses, when a newer code is issued, when a
//! verified entry is consumed, or when the LRU evicts it.
//!
//! Delivery goes through [`OtpSender`]; the service never logs a code.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use lru::LruCache;
use rand::Rng;
use sha2::Sha256;

use super::AuthError;
use crate::telemetry::AUDIT_TARGET;

type HmacSha256 = Hmac<Sha256>;

pub const MAX_ATTEMPTS: u8 = 5;

/// Outstanding codes held at once.
pub const DEFAULT_CAPACITY: usize = 10_000;

/// Delivers a passcode to the account holder.
#[async_trait]
pub trait OtpSender: Send + Sync {
    async fn send(&self, destination: &str, code: &str) -> Result<(), AuthError>;
}

/// Sender that only records that a dispatch happened.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingOtpSender;

#[async_trait]
impl OtpSender for TracingOtpSender {
    async fn send(&self, destination: &str, _code: &str) -> Result<(), AuthError> {
        let tail: String = destination
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        tracing::info!(destination = %format!("***{tail}"), "one-time passcode dispatched");
        Ok(())
    }
}

struct OtpEntry {
    digest: Vec<u8>,
    expires_at: Instant,
    attempts: u8,
    verified: bool,
}

pub struct OtpService {
    key: Vec<u8>,
    ttl: Duration,
    entries: Mutex<LruCache<String, OtpEntry>>,
    sender: Arc<dyn OtpSender>,
}

impl OtpService {
    /// `key` is the HMAC key for code digests (the signing secret).
    pub fn new(key: impl Into<Vec<u8>>, ttl: Duration, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            key: key.into(),
            ttl,
            entries: Mutex::new(LruCache::new(capacity)),
            sender: Arc::new(TracingOtpSender),
        }
    }

    pub fn with_sender(mut self, sender: Arc<dyn OtpSender>) -> Self {
        self.sender = sender;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn mac(&self, account_id: &str, code: &str) -> Result<HmacSha256, AuthError> {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|e| AuthError::Internal(format!("otp key rejected: {e}")))?;
        mac.update(account_id.as_bytes());
        mac.update(b":");
        mac.update(code.as_bytes());
        Ok(mac)
    }

    fn generate_code() -> String {
        let n: u32 = rand::thread_rng().gen_range(0..1_000_000);
        format!("{n:06}")
    }

    /// Issue a fresh code for an account, replacing any outstanding one,
    /// and hand it to the sender.
    pub async fn issue(&self, account_id: &str, destination: &str) -> Result<Duration, AuthError> {
        let code = Self::generate_code();
        self.store_code(account_id, &code)?;
        self.sender.send(destination, &code).await?;
        tracing::info!(target: AUDIT_TARGET, account_id, "one-time passcode issued");
        Ok(self.ttl)
    }

    fn store_code(&self, account_id: &str, code: &str) -> Result<(), AuthError> {
        let digest = self.mac(account_id, code)?.finalize().into_bytes().to_vec();
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| AuthError::Internal("otp store poisoned".to_string()))?;
        entries.put(
            account_id.to_string(),
            OtpEntry {
                digest,
                expires_at: Instant::now() + self.ttl,
                attempts: 0,
                verified: false,
            },
        );
        Ok(())
    }

    /// Check a submitted code. A match marks the entry verified.
    pub fn verify(&self, account_id: &str, code: &str) -> Result<(), AuthError> {
        let candidate = self.mac(account_id, code.trim())?;
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| AuthError::Internal("otp store poisoned".to_string()))?;

        let entry = entries.get_mut(account_id).ok_or(AuthError::InvalidOtp)?;
        if entry.expires_at <= Instant::now() || entry.attempts >= MAX_ATTEMPTS {
            entries.pop(account_id);
            return Err(AuthError::InvalidOtp);
        }

        if candidate.verify_slice(&entry.digest).is_ok() {
            entry.verified = true;
            tracing::info!(target: AUDIT_TARGET, account_id, "one-time passcode verified");
            Ok(())
        } else {
            entry.attempts += 1;
            tracing::warn!(
                target: AUDIT_TARGET,
                account_id,
                attempts = entry.attempts,
                "one-time passcode mismatch"
            );
            if entry.attempts >= MAX_ATTEMPTS {
                entries.pop(account_id);
            }
            Err(AuthError::InvalidOtp)
        }
    }

    /// Consume a verified, unexpired entry. Returns whether one existed.
    pub fn consume_verification(&self, account_id: &str) -> bool {
        let Ok(mut entries) = self.entries.lock() else {
            return false;
        };
        let usable = entries
            .peek(account_id)
            .is_some_and(|e| e.verified && e.expires_at > Instant::now());
        if usable {
            entries.pop(account_id);
        }
        usable
    }

    pub fn outstanding(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Mutex as AsyncMutex;

    #[derive(Default)]
    struct CapturingSender {
        sent: AsyncMutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl OtpSender for CapturingSender {
        async fn send(&self, destination: &str, code: &str) -> Result<(), AuthError> {
            self.sent
                .lock()
                .await
                .push((destination.to_string(), code.to_string()));
            Ok(())
        }
    }

    fn service(ttl: Duration) -> (OtpService, Arc<CapturingSender>) {
        let sender = Arc::new(CapturingSender::default());
        let svc = OtpService::new("otp-key", ttl, 16).with_sender(sender.clone());
        (svc, sender)
    }

    async fn last_code(sender: &CapturingSender) -> String {
        sender.sent.lock().await.last().unwrap().1.clone()
    }

    #[tokio::test]
    async fn issue_then_verify_then_consume() {
        let (svc, sender) = service(Duration::from_secs(60));
        svc.issue("acct-1", "+15550001").await.unwrap();
        let code = last_code(&sender).await;
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));

        assert!(!svc.consume_verification("acct-1"));
        svc.verify("acct-1", &code).unwrap();
        assert!(svc.consume_verification("acct-1"));
        // Single use
        assert!(!svc.consume_verification("acct-1"));
    }

    #[tokio::test]
    async fn wrong_code_counts_attempts_and_locks_out() {
        let (svc, sender) = service(Duration::from_secs(60));
        svc.issue("acct-1", "+1").await.unwrap();
        let code = last_code(&sender).await;
        let wrong = if code == "000000" { "111111" } else { "000000" };

        for _ in 0..MAX_ATTEMPTS {
            assert!(matches!(svc.verify("acct-1", wrong), Err(AuthError::InvalidOtp)));
        }
        // Entry is gone; even the right code fails now
        assert!(matches!(svc.verify("acct-1", &code), Err(AuthError::InvalidOtp)));
        assert_eq!(svc.outstanding(), 0);
    }

    #[tokio::test]
    async fn expired_code_is_rejected() {
        let (svc, sender) = service(Duration::from_millis(0));
        svc.issue("acct-1", "+1").await.unwrap();
        let code = last_code(&sender).await;
        assert!(matches!(svc.verify("acct-1", &code), Err(AuthError::InvalidOtp)));
    }

    #[tokio::test]
    async fn codes_are_bound_to_accounts() {
        let (svc, sender) = service(Duration::from_secs(60));
        svc.issue("acct-1", "+1").await.unwrap();
        let code = last_code(&sender).await;
        assert!(svc.verify("acct-2", &code).is_err());
    }

    #[tokio::test]
    async fn reissue_replaces_previous_code() {
        let (svc, sender) = service(Duration::from_secs(60));
        svc.issue("acct-1", "+1").await.unwrap();
        let first = last_code(&sender).await;
        svc.issue("acct-1", "+1").await.unwrap();
        let second = last_code(&sender).await;
        if first != second {
            assert!(svc.verify("acct-1", &first).is_err());
        }
        assert!(svc.verify("acct-1", &second).is_ok());
        assert_eq!(svc.outstanding(), 1);
    }

    #[tokio::test]
    async fn capacity_is_bounded() {
        let sender = Arc::new(CapturingSender::default());
        let svc = OtpService::new("k", Duration::from_secs(60), 2).with_sender(sender);
        for id in ["a", "b", "c"] {
            svc.issue(id, "+1").await.unwrap();
        }
        assert_eq!(svc.outstanding(), 2);
    }
}
