//! Clinic (tenant) models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Roles within a clinic that count as administrative
pub const CLINIC_ADMIN_ROLES: &[&str] = &["owner", "admin"];

/// A clinic the user can operate in
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Clinic {
    #[serde(alias = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub address: ClinicAddress,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub working_hours: Vec<WorkingHours>,
    /// False for clinics synthesized locally while the backend is unreachable
    #[serde(default = "default_true")]
    pub has_relationship: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClinicAddress {
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub zip_code: String,
    #[serde(default)]
    pub country: String,
}

impl ClinicAddress {
    pub fn is_empty(&self) -> bool {
        self.street.is_empty()
            && self.city.is_empty()
            && self.state.is_empty()
            && self.zip_code.is_empty()
            && self.country.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

/// Opening hours for a single day, "HH:MM" strings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkingHours {
    pub day: Weekday,
    pub is_open: bool,
    #[serde(default)]
    pub open: Option<String>,
    #[serde(default)]
    pub close: Option<String>,
}

impl WorkingHours {
    fn open(day: Weekday, open: &str, close: &str) -> Self {
        Self {
            day,
            is_open: true,
            open: Some(open.to_string()),
            close: Some(close.to_string()),
        }
    }

    fn closed(day: Weekday) -> Self {
        Self {
            day,
            is_open: false,
            open: None,
            close: None,
        }
    }
}

/// Default week used for placeholder clinics
pub fn default_working_hours() -> Vec<WorkingHours> {
    vec![
        WorkingHours::open(Weekday::Monday, "09:00", "17:00"),
        WorkingHours::open(Weekday::Tuesday, "09:00", "17:00"),
        WorkingHours::open(Weekday::Wednesday, "09:00", "17:00"),
        WorkingHours::open(Weekday::Thursday, "09:00", "17:00"),
        WorkingHours::open(Weekday::Friday, "09:00", "17:00"),
        WorkingHours::open(Weekday::Saturday, "09:00", "13:00"),
        WorkingHours::closed(Weekday::Sunday),
    ]
}

impl Clinic {
    /// Minimal local stand-in for a clinic whose details could not be fetched
    pub fn placeholder(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: "Current Clinic".to_string(),
            address: ClinicAddress::default(),
            phone: None,
            email: None,
            working_hours: default_working_hours(),
            has_relationship: false,
        }
    }
}

/// One entry in the list of clinics the user belongs to
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserClinic {
    pub clinic: Clinic,
    pub role: String,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub joined_at: Option<DateTime<Utc>>,
}

/// Role and permissions the user holds inside the active clinic
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClinicRelation {
    pub clinic_id: String,
    pub role: String,
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl ClinicRelation {
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.role.eq_ignore_ascii_case(role)
    }

    pub fn is_admin(&self) -> bool {
        CLINIC_ADMIN_ROLES.iter().any(|r| self.has_role(r))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SelectClinicInput {
    pub clinic_id: String,
}

/// Response to selecting a clinic: a tenant-scoped token plus the relation
#[derive(Debug, Clone, Deserialize)]
pub struct SelectClinicResponse {
    pub token: String,
    pub clinic: Clinic,
    pub role: String,
    #[serde(default)]
    pub permissions: Vec<String>,
}

/// Response to clearing the clinic selection: a token with no tenant bound
#[derive(Debug, Clone, Deserialize)]
pub struct ClearClinicResponse {
    pub token: String,
}

/// Full record of the currently selected clinic
#[derive(Debug, Clone, Deserialize)]
pub struct CurrentClinicResponse {
    pub clinic: Clinic,
    pub role: String,
    #[serde(default)]
    pub permissions: Vec<String>,
}

/// The active clinic, distinguishing real data from a local placeholder
#[derive(Debug, Clone, Default, PartialEq)]
pub enum CurrentClinic {
    Loaded(Clinic),
    Degraded(Clinic),
    #[default]
    Absent,
}

impl CurrentClinic {
    pub fn clinic(&self) -> Option<&Clinic> {
        match self {
            CurrentClinic::Loaded(c) | CurrentClinic::Degraded(c) => Some(c),
            CurrentClinic::Absent => None,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, CurrentClinic::Degraded(_))
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, CurrentClinic::Absent)
    }
}
