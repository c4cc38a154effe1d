// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! FindMyDoc API: registration and account backend for the patient and
//! clinic marketplace.
//!
//! Keeps Supabase identity records consistent with the local staff and
//! patient records, and serves the authenticated account API.

pub mod access;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod hooks;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::Db;
use services::{RegistrationService, SupabaseAuthClient, UserLifecycle};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: Db,
    pub identity: SupabaseAuthClient,
    pub lifecycle: UserLifecycle,
    pub registration: RegistrationService,
}

impl AppState {
    /// Wire services over a record store.
    pub fn new(config: Config, db: Db) -> Self {
        let identity = SupabaseAuthClient::from_config(&config);
        let lifecycle = UserLifecycle::new(db.clone(), identity.clone());
        let registration = RegistrationService::new(db.clone(), identity.clone(), lifecycle.clone());

        Self {
            config,
            db,
            identity,
            lifecycle,
            registration,
        }
    }
}
