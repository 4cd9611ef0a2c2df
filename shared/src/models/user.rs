//! Session user, roles and the global role → permission table

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::Validate;

/// Fixed set of global roles a user account can hold.
///
/// Deserializes through [`FromStr`], so role names are matched without regard
/// to case.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum Role {
    Admin,
    Doctor,
    Receptionist,
    Nurse,
    Accountant,
    Staff,
    /// Any role string the backend sends that is not in the fixed set
    Unknown,
}

/// Permissions granted through the global role table
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ViewPatients,
    ManagePatients,
    ViewAppointments,
    ManageAppointments,
    ViewMedicalRecords,
    ManageMedicalRecords,
    ViewLabTests,
    ManageLabTests,
    ViewInvoices,
    ManageInvoices,
    ViewPayments,
    ManagePayments,
    ViewPayroll,
    ManagePayroll,
    ViewInventory,
    ManageInventory,
    ViewLeads,
    ManageLeads,
    ViewTraining,
    ManageTraining,
    ViewAnalytics,
    ManageUsers,
    ManageSettings,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown role: {0}")]
pub struct ParseRoleError(pub String);

impl Role {
    pub const ALL: [Role; 6] = [
        Role::Admin,
        Role::Doctor,
        Role::Receptionist,
        Role::Nurse,
        Role::Accountant,
        Role::Staff,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Doctor => "doctor",
            Role::Receptionist => "receptionist",
            Role::Nurse => "nurse",
            Role::Accountant => "accountant",
            Role::Staff => "staff",
            Role::Unknown => "unknown",
        }
    }

    /// Static permission list for this role
    pub fn permissions(&self) -> &'static [Permission] {
        use Permission::*;

        match self {
            Role::Admin => &Permission::ALL,
            Role::Doctor => &[
                ViewPatients,
                ManagePatients,
                ViewAppointments,
                ManageAppointments,
                ViewMedicalRecords,
                ManageMedicalRecords,
                ViewLabTests,
                ManageLabTests,
                ViewTraining,
                ViewAnalytics,
            ],
            Role::Receptionist => &[
                ViewPatients,
                ManagePatients,
                ViewAppointments,
                ManageAppointments,
                ViewInvoices,
                ViewPayments,
                ViewLeads,
                ManageLeads,
            ],
            Role::Nurse => &[
                ViewPatients,
                ViewAppointments,
                ManageAppointments,
                ViewMedicalRecords,
                ManageMedicalRecords,
                ViewLabTests,
                ViewInventory,
                ViewTraining,
            ],
            Role::Accountant => &[
                ViewInvoices,
                ManageInvoices,
                ViewPayments,
                ManagePayments,
                ViewPayroll,
                ManagePayroll,
                ViewInventory,
                ViewAnalytics,
            ],
            Role::Staff => &[ViewPatients, ViewAppointments, ViewInventory, ViewTraining],
            Role::Unknown => &[],
        }
    }

    /// Permission strings as stored on the session
    pub fn permission_names(&self) -> Vec<String> {
        self.permissions()
            .iter()
            .map(|p| p.as_str().to_string())
            .collect()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseRoleError(s.to_string()))
    }
}

impl From<String> for Role {
    fn from(s: String) -> Self {
        s.parse().unwrap_or(Role::Unknown)
    }
}

impl Permission {
    pub const ALL: [Permission; 23] = [
        Permission::ViewPatients,
        Permission::ManagePatients,
        Permission::ViewAppointments,
        Permission::ManageAppointments,
        Permission::ViewMedicalRecords,
        Permission::ManageMedicalRecords,
        Permission::ViewLabTests,
        Permission::ManageLabTests,
        Permission::ViewInvoices,
        Permission::ManageInvoices,
        Permission::ViewPayments,
        Permission::ManagePayments,
        Permission::ViewPayroll,
        Permission::ManagePayroll,
        Permission::ViewInventory,
        Permission::ManageInventory,
        Permission::ViewLeads,
        Permission::ManageLeads,
        Permission::ViewTraining,
        Permission::ManageTraining,
        Permission::ViewAnalytics,
        Permission::ManageUsers,
        Permission::ManageSettings,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ViewPatients => "view_patients",
            Permission::ManagePatients => "manage_patients",
            Permission::ViewAppointments => "view_appointments",
            Permission::ManageAppointments => "manage_appointments",
            Permission::ViewMedicalRecords => "view_medical_records",
            Permission::ManageMedicalRecords => "manage_medical_records",
            Permission::ViewLabTests => "view_lab_tests",
            Permission::ManageLabTests => "manage_lab_tests",
            Permission::ViewInvoices => "view_invoices",
            Permission::ManageInvoices => "manage_invoices",
            Permission::ViewPayments => "view_payments",
            Permission::ManagePayments => "manage_payments",
            Permission::ViewPayroll => "view_payroll",
            Permission::ManagePayroll => "manage_payroll",
            Permission::ViewInventory => "view_inventory",
            Permission::ManageInventory => "manage_inventory",
            Permission::ViewLeads => "view_leads",
            Permission::ManageLeads => "manage_leads",
            Permission::ViewTraining => "view_training",
            Permission::ManageTraining => "manage_training",
            Permission::ViewAnalytics => "view_analytics",
            Permission::ManageUsers => "manage_users",
            Permission::ManageSettings => "manage_settings",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Check a permission string against the static table for a role
pub fn role_has_permission(role: Role, permission: &str) -> bool {
    role.permissions().iter().any(|p| p.as_str() == permission)
}

/// The signed-in user as held by the client session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub permissions: Vec<String>,
    pub base_currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionUser {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }

    /// Merge a local partial update; `updated_at` is left to the backend
    pub fn apply(&mut self, update: SessionUserUpdate) {
        if let Some(email) = update.email {
            self.email = email;
        }
        if let Some(first_name) = update.first_name {
            self.first_name = first_name;
        }
        if let Some(last_name) = update.last_name {
            self.last_name = last_name;
        }
        if let Some(base_currency) = update.base_currency {
            self.base_currency = base_currency;
        }
        if let Some(role) = update.role {
            self.role = role;
            self.permissions = role.permission_names();
        }
    }
}

/// User record as the backend returns it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendUser {
    #[serde(alias = "_id")]
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub role: Role,
    #[serde(default)]
    pub base_currency: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const DEFAULT_BASE_CURRENCY: &str = "USD";

impl From<BackendUser> for SessionUser {
    fn from(user: BackendUser) -> Self {
        SessionUser {
            permissions: user.role.permission_names(),
            id: user.id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            role: user.role,
            base_currency: user
                .base_currency
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| DEFAULT_BASE_CURRENCY.to_string()),
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Local partial update to the session user
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUserUpdate {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Option<Role>,
    pub base_currency: Option<String>,
}

/// Login request body
#[derive(Debug, Clone, Serialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

/// Successful login response
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: BackendUser,
}

/// Input for registering a new account
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RegisterInput {
    #[validate(length(min = 1, message = "First name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, message = "Last name is required"))]
    pub last_name: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_currency: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend_user(role: Role) -> BackendUser {
        BackendUser {
            id: "64f1a2b3c4d5e6f7a8b9c0d1".to_string(),
            email: "doc@example.com".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Okafor".to_string(),
            role,
            base_currency: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_doctor_permissions() {
        assert!(role_has_permission(Role::Doctor, "manage_appointments"));
        assert!(!role_has_permission(Role::Doctor, "manage_payroll"));
        assert!(role_has_permission(Role::Accountant, "manage_payroll"));
    }

    #[test]
    fn test_admin_has_everything() {
        for p in Permission::ALL {
            assert!(role_has_permission(Role::Admin, p.as_str()));
        }
    }

    #[test]
    fn test_unknown_role_has_nothing() {
        let role: Role = serde_json::from_str("\"janitor\"").unwrap();
        assert_eq!(role, Role::Unknown);
        assert!(role.permissions().is_empty());
        assert!("janitor".parse::<Role>().is_err());
        assert_eq!("Doctor".parse::<Role>(), Ok(Role::Doctor));
    }

    #[test]
    fn test_backend_user_conversion() {
        let session: SessionUser = backend_user(Role::Nurse).into();
        assert_eq!(session.permissions, Role::Nurse.permission_names());
        assert_eq!(session.base_currency, DEFAULT_BASE_CURRENCY);
        assert_eq!(session.full_name(), "Ada Okafor");

        let json = serde_json::to_value(&session).unwrap();
        assert!(json.get("firstName").is_some());
        assert!(json.get("baseCurrency").is_some());
    }

    #[test]
    fn test_backend_user_accepts_mongo_id() {
        let json = r#"{
            "_id": "64f1a2b3c4d5e6f7a8b9c0d1",
            "email": "a@b.com",
            "first_name": "A",
            "last_name": "B",
            "role": "receptionist",
            "base_currency": "EUR",
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-02T00:00:00Z"
        }"#;
        let user: BackendUser = serde_json::from_str(json).unwrap();
        let session = SessionUser::from(user);
        assert_eq!(session.id, "64f1a2b3c4d5e6f7a8b9c0d1");
        assert_eq!(session.base_currency, "EUR");
        assert_eq!(session.role, Role::Receptionist);
    }

    #[test]
    fn test_backend_role_is_case_insensitive() {
        let json = r#"{
            "_id": "64f1a2b3c4d5e6f7a8b9c0d1",
            "email": "a@b.com",
            "role": "Doctor",
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-02T00:00:00Z"
        }"#;
        let user: BackendUser = serde_json::from_str(json).unwrap();
        let session = SessionUser::from(user);
        assert_eq!(session.role, Role::Doctor);
        assert!(session.has_permission("manage_appointments"));

        let role: Role = serde_json::from_str("\" NURSE \"").unwrap();
        assert_eq!(role, Role::Nurse);
        assert_eq!(serde_json::to_string(&role).unwrap(), "\"nurse\"");
    }

    #[test]
    fn test_apply_update_recomputes_permissions() {
        let mut session: SessionUser = backend_user(Role::Staff).into();
        session.apply(SessionUserUpdate {
            first_name: Some("Grace".to_string()),
            role: Some(Role::Accountant),
            ..Default::default()
        });
        assert_eq!(session.first_name, "Grace");
        assert_eq!(session.last_name, "Okafor");
        assert!(session.has_permission("manage_payroll"));
    }

    #[test]
    fn test_register_input_validation() {
        let input = RegisterInput {
            first_name: "A".to_string(),
            last_name: "B".to_string(),
            email: "not-an-email".to_string(),
            password: "short".to_string(),
            role: None,
            base_currency: None,
        };
        let errors = input.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
    }
}
