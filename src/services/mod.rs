// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod lifecycle;
pub mod provisioning;
pub mod registration;
pub mod supabase;

pub use lifecycle::{StaffAccount, StaffProfile, UserLifecycle};
pub use provisioning::{ensure_patient, IdentityProfile};
pub use registration::{Registered, RegistrationRequest, RegistrationService};
pub use supabase::{IdentityUser, ProviderError, SupabaseAuthClient};
