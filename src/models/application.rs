//! Clinic applications: public intake reviewed by platform staff.

use serde::{Deserialize, Serialize};

use crate::db::{collections, Record, RecordId, UniqueKey};

/// Country recorded when the applicant leaves it blank.
pub const DEFAULT_COUNTRY: &str = "Turkey";

/// Review state of an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    #[default]
    Submitted,
    Approved,
    Rejected,
}

impl ApplicationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ApplicationStatus::Submitted => "submitted",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClinicAddress {
    pub street: String,
    pub house_number: String,
    pub zip_code: u32,
    pub city: String,
    pub country: String,
}

/// Where a submission came from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceMeta {
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClinicApplication {
    #[serde(default)]
    pub id: RecordId,
    pub clinic_name: String,
    pub contact_first_name: String,
    pub contact_last_name: String,
    /// Lowercased
    pub contact_email: String,
    #[serde(default)]
    pub contact_phone: Option<String>,
    pub address: ClinicAddress,
    #[serde(default)]
    pub additional_notes: Option<String>,
    #[serde(default)]
    pub status: ApplicationStatus,
    /// Internal notes; platform staff only
    #[serde(default)]
    pub review_notes: Option<String>,
    #[serde(default)]
    pub source_meta: SourceMeta,
    pub created_at: String,
    pub updated_at: String,
}

impl Record for ClinicApplication {
    const COLLECTION: &'static str = collections::CLINIC_APPLICATIONS;

    fn id(&self) -> RecordId {
        self.id
    }

    fn set_id(&mut self, id: RecordId) {
        self.id = id;
    }

    /// One open submission per clinic name and contact email. The key is
    /// released once the application is reviewed.
    fn unique_keys(&self) -> Vec<UniqueKey> {
        if self.status != ApplicationStatus::Submitted {
            return Vec::new();
        }
        vec![UniqueKey::new(
            "submission",
            &format!("{}|{}", self.clinic_name, self.contact_email),
        )]
    }
}
