//! Clinic (tenant) selection service
//!
//! Tracks which clinic the signed-in user is operating in and the role and
//! permissions they hold there. Tenant-scoped permissions are kept apart from
//! the global role table in [`crate::services::auth`].

use std::sync::{Arc, Mutex};

use shared::{
    validate_entity_id, AuthStatus, ClearClinicResponse, Clinic, ClinicRelation, CurrentClinic,
    CurrentClinicResponse, SelectClinicInput, SelectClinicResponse, UserClinic,
};
use tokio::sync::watch;

use crate::error::{ClientError, ClientResult};
use crate::http::ApiClient;
use crate::services::auth::AuthSnapshot;
use crate::storage::lock;
use crate::token::check_token;

pub const SESSION_EXPIRED_MESSAGE: &str = "Your session has expired. Please log in again.";
pub const CLINIC_ACCESS_DENIED_MESSAGE: &str = "You do not have access to this clinic";

/// Tenant state as seen by the UI
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClinicState {
    pub current: CurrentClinic,
    pub user_clinics: Vec<UserClinic>,
    pub relation: Option<ClinicRelation>,
    pub loading: bool,
    pub error: Option<String>,
}

/// Clinic selection service
#[derive(Clone)]
pub struct ClinicService {
    api: ApiClient,
    state: Arc<Mutex<ClinicState>>,
}

impl ClinicService {
    /// Create a new ClinicService with no clinic selected
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            state: Arc::new(Mutex::new(ClinicState::default())),
        }
    }

    pub fn state(&self) -> ClinicState {
        lock(&self.state).clone()
    }

    pub fn current_clinic(&self) -> CurrentClinic {
        lock(&self.state).current.clone()
    }

    pub fn user_clinics(&self) -> Vec<UserClinic> {
        lock(&self.state).user_clinics.clone()
    }

    pub fn relation(&self) -> Option<ClinicRelation> {
        lock(&self.state).relation.clone()
    }

    pub fn error(&self) -> Option<String> {
        lock(&self.state).error.clone()
    }

    pub fn is_loading(&self) -> bool {
        lock(&self.state).loading
    }

    /// Select a clinic; failures are recorded in `error()` and reported as false
    pub async fn select_clinic(&self, clinic_id: &str) -> bool {
        if let Err(e) = check_token(self.api.storage().token().as_deref()) {
            tracing::warn!("Refusing to select clinic {}: {}", clinic_id, e);
            self.set_error(format!("{}. Please log in again.", e));
            return false;
        }

        self.set_loading(true);
        let result = self.try_select_clinic(clinic_id).await;
        self.set_loading(false);

        match result {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("Failed to select clinic {}: {}", clinic_id, e);
                let message = match &e {
                    ClientError::Unauthenticated => {
                        self.clear_tenant_data();
                        SESSION_EXPIRED_MESSAGE.to_string()
                    }
                    ClientError::Forbidden(_) => CLINIC_ACCESS_DENIED_MESSAGE.to_string(),
                    other => format!("Failed to select clinic: {}", other),
                };
                self.set_error(message);
                false
            }
        }
    }

    /// Same as [`ClinicService::select_clinic`]
    pub async fn switch_clinic(&self, clinic_id: &str) -> bool {
        self.select_clinic(clinic_id).await
    }

    async fn try_select_clinic(&self, clinic_id: &str) -> ClientResult<Clinic> {
        let clinic_id = clinic_id.trim();
        validate_entity_id(clinic_id).map_err(|m| ClientError::validation("clinic_id", m))?;

        let input = SelectClinicInput {
            clinic_id: clinic_id.to_string(),
        };
        let response: SelectClinicResponse =
            self.api.post("/user/select-clinic", &input).await?;

        self.api
            .storage()
            .set_clinic(response.clinic.id.clone(), response.token)?;

        let clinic = response.clinic;
        let relation = ClinicRelation {
            clinic_id: clinic.id.clone(),
            role: response.role,
            permissions: response.permissions,
        };

        tracing::info!(clinic_id = %clinic.id, role = %relation.role, "Clinic selected");

        let mut state = lock(&self.state);
        state.current = CurrentClinic::Loaded(clinic.clone());
        state.relation = Some(relation);
        state.error = None;
        Ok(clinic)
    }

    /// Ask the backend for a token with no clinic bound, then drop local tenant state
    pub async fn clear_clinic_selection(&self) -> bool {
        self.set_loading(true);
        let result = self.try_clear_clinic_selection().await;
        self.set_loading(false);

        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Failed to clear clinic selection: {}", e);
                if matches!(e, ClientError::Unauthenticated) {
                    self.clear_tenant_data();
                }
                self.set_error(format!("Failed to clear clinic selection: {}", e));
                false
            }
        }
    }

    async fn try_clear_clinic_selection(&self) -> ClientResult<()> {
        let response: ClearClinicResponse = self
            .api
            .post("/user/clear-clinic", &serde_json::json!({}))
            .await?;

        let storage = self.api.storage();
        storage.set_token(response.token)?;
        storage.clear_clinic()?;

        let mut state = lock(&self.state);
        state.current = CurrentClinic::Absent;
        state.relation = None;
        state.error = None;
        tracing::info!("Clinic selection cleared");
        Ok(())
    }

    /// Fetch the clinics the user belongs to, auto-selecting a sole clinic,
    /// then hydrate the current clinic
    pub async fn load_user_clinics(&self) -> bool {
        self.set_loading(true);
        let result: ClientResult<Vec<UserClinic>> = self.api.get("/user/clinics").await;
        self.set_loading(false);

        let clinics = match result {
            Ok(clinics) => clinics,
            Err(e) => {
                tracing::warn!("Failed to load user clinics: {}", e);
                if matches!(e, ClientError::Unauthenticated) {
                    self.clear_tenant_data();
                }
                self.set_error(format!("Failed to load clinics: {}", e));
                return false;
            }
        };

        let auto_select = {
            let mut state = lock(&self.state);
            let nothing_selected =
                self.api.storage().clinic_id().is_none() && state.current.is_absent();
            let sole = match clinics.as_slice() {
                [only] if nothing_selected => Some(only.clinic.id.clone()),
                _ => None,
            };
            state.user_clinics = clinics;
            sole
        };

        if let Some(clinic_id) = auto_select {
            tracing::info!(%clinic_id, "Auto-selecting the user's only clinic");
            self.select_clinic(&clinic_id).await;
        }

        self.load_current_clinic().await;
        true
    }

    /// Hydrate the selected clinic's full record.
    ///
    /// 401/403 clears tenant data. Any other failure keeps the UI usable with a
    /// placeholder clinic, provided a clinic id and tenant token are cached.
    pub async fn load_current_clinic(&self) -> CurrentClinic {
        let storage = self.api.storage();
        let Some(clinic_id) = storage.clinic_id() else {
            let mut state = lock(&self.state);
            state.current = CurrentClinic::Absent;
            state.relation = None;
            return CurrentClinic::Absent;
        };

        self.set_loading(true);
        let result: ClientResult<CurrentClinicResponse> =
            self.api.get("/user/current-clinic").await;
        self.set_loading(false);

        match result {
            Ok(response) => {
                let relation = ClinicRelation {
                    clinic_id: response.clinic.id.clone(),
                    role: response.role,
                    permissions: response.permissions,
                };
                let current = CurrentClinic::Loaded(response.clinic);

                let mut state = lock(&self.state);
                state.current = current.clone();
                state.relation = Some(relation);
                state.error = None;
                current
            }
            Err(e) if e.is_auth_failure() => {
                tracing::warn!("Clinic session rejected, clearing tenant data: {}", e);
                self.clear_tenant_data();
                let message = match e {
                    ClientError::Unauthenticated => SESSION_EXPIRED_MESSAGE.to_string(),
                    _ => CLINIC_ACCESS_DENIED_MESSAGE.to_string(),
                };
                self.set_error(message);
                CurrentClinic::Absent
            }
            Err(e) if storage.clinic_token().is_some() => {
                tracing::warn!(
                    %clinic_id,
                    "Clinic details unavailable, continuing with placeholder: {}",
                    e
                );
                let current = CurrentClinic::Degraded(Clinic::placeholder(clinic_id.clone()));

                let mut state = lock(&self.state);
                state.current = current.clone();
                if state
                    .relation
                    .as_ref()
                    .map(|r| r.clinic_id != clinic_id)
                    .unwrap_or(false)
                {
                    state.relation = None;
                }
                current
            }
            Err(e) => {
                tracing::warn!("Failed to load current clinic: {}", e);
                let mut state = lock(&self.state);
                state.current = CurrentClinic::Absent;
                state.error = Some(format!("Failed to load clinic: {}", e));
                CurrentClinic::Absent
            }
        }
    }

    /// React to a change in the auth session
    pub async fn on_auth_changed(&self, auth: &AuthSnapshot) {
        match auth.status {
            AuthStatus::Loading => {}
            AuthStatus::Authenticated if auth.user.is_some() => {
                self.load_user_clinics().await;
            }
            _ => self.clear_tenant_data(),
        }
    }

    /// Follow the auth service until its channel closes
    pub async fn run_auth_sync(self, mut auth: watch::Receiver<AuthSnapshot>) {
        loop {
            let snapshot = auth.borrow_and_update().clone();
            self.on_auth_changed(&snapshot).await;
            if auth.changed().await.is_err() {
                break;
            }
        }
    }

    /// Tenant-scoped permission check
    pub fn has_permission(&self, permission: &str) -> bool {
        lock(&self.state)
            .relation
            .as_ref()
            .map(|r| r.has_permission(permission))
            .unwrap_or(false)
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.has_any_role(&[role])
    }

    pub fn has_any_role(&self, roles: &[&str]) -> bool {
        lock(&self.state)
            .relation
            .as_ref()
            .map(|r| roles.iter().any(|role| r.has_role(role)))
            .unwrap_or(false)
    }

    pub fn is_clinic_admin(&self) -> bool {
        lock(&self.state)
            .relation
            .as_ref()
            .map(ClinicRelation::is_admin)
            .unwrap_or(false)
    }

    pub fn clinic_role(&self) -> Option<String> {
        lock(&self.state).relation.as_ref().map(|r| r.role.clone())
    }

    /// Drop all tenant state and the persisted clinic keys
    pub fn clear_tenant_data(&self) {
        if let Err(e) = self.api.storage().clear_clinic() {
            tracing::error!("Failed to clear stored clinic selection: {}", e);
        }
        *lock(&self.state) = ClinicState::default();
    }

    fn set_loading(&self, loading: bool) {
        lock(&self.state).loading = loading;
    }

    fn set_error(&self, message: String) {
        lock(&self.state).error = Some(message);
    }
}
