// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod application;
pub mod media;
pub mod staff;
pub mod user;

pub use application::{
    ApplicationStatus, ClinicAddress, ClinicApplication, SourceMeta, DEFAULT_COUNTRY,
};
pub use media::ClinicMedia;
pub use staff::{ClinicStaff, ClinicStaffStatus, PlatformRole, PlatformStaff};
pub use user::{BasicUser, Patient, StaffType, UserType};
