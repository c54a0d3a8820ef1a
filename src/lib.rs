// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Marketplace Identity - Authentication & Authorization Service
//!
//! This crate resolves accounts by email or phone, issues and verifies
//! HS256 session tokens, and enforces role-based access control in front of
//! the marketplace API.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Tokens, identity resolution, guard chains and RBAC
//! - `storage` - Account and role stores (in-memory, redb)
//! - `config` - Environment configuration
//! - `telemetry` - tracing subscriber setup

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod state;
pub mod storage;
pub mod telemetry;
