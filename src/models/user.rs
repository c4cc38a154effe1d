//! Authentication-anchor records: staff accounts and patients.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::db::{collections, Record, RecordId, UniqueKey};

/// Kind of account, as tagged in the identity record's `app_metadata.user_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    Clinic,
    Platform,
    Patient,
}

impl UserType {
    pub fn as_str(self) -> &'static str {
        match self {
            UserType::Clinic => "clinic",
            UserType::Platform => "platform",
            UserType::Patient => "patient",
        }
    }

    /// The staff variant, or `None` for patients.
    pub fn staff_type(self) -> Option<StaffType> {
        match self {
            UserType::Clinic => Some(StaffType::Clinic),
            UserType::Platform => Some(StaffType::Platform),
            UserType::Patient => None,
        }
    }
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "clinic" => Ok(UserType::Clinic),
            "platform" => Ok(UserType::Platform),
            "patient" => Ok(UserType::Patient),
            other => Err(format!(
                "Invalid user type: {other}. Must be one of 'patient', 'clinic', or 'platform'."
            )),
        }
    }
}

/// User types allowed on a BasicUser (staff with admin access).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StaffType {
    Clinic,
    Platform,
}

impl From<StaffType> for UserType {
    fn from(value: StaffType) -> Self {
        match value {
            StaffType::Clinic => UserType::Clinic,
            StaffType::Platform => UserType::Platform,
        }
    }
}

/// Hidden authentication anchor linking staff profiles to the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasicUser {
    /// Record ID (also used as document ID)
    #[serde(default)]
    pub id: RecordId,
    /// Login email, unique across BasicUsers
    pub email: String,
    /// Identity record ID; set once at creation
    pub supabase_user_id: Option<String>,
    pub user_type: StaffType,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Record for BasicUser {
    const COLLECTION: &'static str = collections::BASIC_USERS;

    fn id(&self) -> RecordId {
        self.id
    }

    fn set_id(&mut self, id: RecordId) {
        self.id = id;
    }

    fn unique_keys(&self) -> Vec<UniqueKey> {
        let mut keys = vec![UniqueKey::email(&self.email)];
        if let Some(supabase_user_id) = &self.supabase_user_id {
            keys.push(UniqueKey::new("supabase_user_id", supabase_user_id));
        }
        keys
    }
}

/// Patient profile; patients authenticate directly, without a BasicUser.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    #[serde(default)]
    pub id: RecordId,
    pub email: String,
    pub supabase_user_id: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub date_of_birth: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Record for Patient {
    const COLLECTION: &'static str = collections::PATIENTS;

    fn id(&self) -> RecordId {
        self.id
    }

    fn set_id(&mut self, id: RecordId) {
        self.id = id;
    }

    /// Identities without an email claim do not reserve the empty email.
    fn unique_keys(&self) -> Vec<UniqueKey> {
        let mut keys = vec![UniqueKey::new("supabase_user_id", &self.supabase_user_id)];
        if !self.email.trim().is_empty() {
            keys.push(UniqueKey::email(&self.email));
        }
        keys
    }
}
