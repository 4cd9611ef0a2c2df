//! Composition root
//!
//! Builds the storage, API client, cache and services once and wires the
//! auth session to the clinic service. Session expiry and navigation
//! decisions are made here rather than inside the HTTP layer.

use std::sync::Arc;

use shared::{is_auth_route, GuardOutcome, RouteGuard, LOGIN_ROUTE};
use tokio::task::JoinHandle;

use crate::config::{ApiConfig, Config};
use crate::error::{ClientError, ClientResult};
use crate::http::ApiClient;
use crate::query::QueryCache;
use crate::services::{
    AppointmentService, AuthService, ClinicService, DashboardService, HealthService,
    InventoryService, InvoiceService, LeadService, MedicalRecordService, PatientService,
    PaymentService, PayrollService, TestCategoryService, TrainingService, TurnaroundTimeService,
};
use crate::storage::{FileBackend, SessionStorage};

/// Where the UI should navigate next
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub to: String,
    /// Route the user was on, so they can be sent back after signing in
    pub from: Option<String>,
}

/// Application services
pub struct ClinicApp {
    storage: SessionStorage,
    api: ApiClient,
    cache: QueryCache,
    auth: AuthService,
    clinic: ClinicService,
    pub patients: PatientService,
    pub medical_records: MedicalRecordService,
    pub appointments: AppointmentService,
    pub invoices: InvoiceService,
    pub payments: PaymentService,
    pub payroll: PayrollService,
    pub inventory: InventoryService,
    pub leads: LeadService,
    pub test_categories: TestCategoryService,
    pub turnaround_times: TurnaroundTimeService,
    pub training: TrainingService,
    pub dashboard: DashboardService,
    pub health: HealthService,
    auth_sync: Option<JoinHandle<()>>,
}

impl ClinicApp {
    pub fn new(config: &ApiConfig, storage: SessionStorage) -> ClientResult<Self> {
        let api = ApiClient::new(config, storage.clone())?;
        let cache = QueryCache::new();

        // A rejected session may belong to another user next time; drop its data
        let expired_cache = cache.clone();
        api.on_session_expired(move || expired_cache.clear());

        Ok(Self {
            auth: AuthService::new(api.clone()),
            clinic: ClinicService::new(api.clone()),
            patients: PatientService::new(api.clone(), cache.clone()),
            medical_records: MedicalRecordService::new(api.clone(), cache.clone()),
            appointments: AppointmentService::new(api.clone(), cache.clone()),
            invoices: InvoiceService::new(api.clone(), cache.clone()),
            payments: PaymentService::new(api.clone(), cache.clone()),
            payroll: PayrollService::new(api.clone(), cache.clone()),
            inventory: InventoryService::new(api.clone(), cache.clone()),
            leads: LeadService::new(api.clone(), cache.clone()),
            test_categories: TestCategoryService::new(api.clone(), cache.clone()),
            turnaround_times: TurnaroundTimeService::new(api.clone(), cache.clone()),
            training: TrainingService::new(api.clone(), cache.clone()),
            dashboard: DashboardService::new(api.clone(), cache.clone()),
            health: HealthService::new(api.clone(), cache.clone()),
            storage,
            api,
            cache,
            auth_sync: None,
        })
    }

    /// Build from loaded configuration with a file-backed session store
    pub fn from_config(config: &Config) -> ClientResult<Self> {
        let backend = Arc::new(FileBackend::new(&config.storage.path));
        Self::new(&config.api, SessionStorage::open(backend))
    }

    /// Start following auth changes and restore any persisted session
    pub async fn start(&mut self) {
        if self.auth_sync.is_none() {
            let receiver = self.auth.subscribe();
            self.auth_sync = Some(tokio::spawn(self.clinic.clone().run_auth_sync(receiver)));
        }
        self.auth.initialize().await;
    }

    /// Restore the persisted session and load tenant state in the foreground,
    /// for callers that do not run the background sync
    pub async fn restore(&self) {
        self.auth.initialize().await;
        self.clinic.on_auth_changed(&self.auth.snapshot()).await;
    }

    pub fn auth(&self) -> &AuthService {
        &self.auth
    }

    pub fn clinic(&self) -> &ClinicService {
        &self.clinic
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn storage(&self) -> &SessionStorage {
        &self.storage
    }

    /// Handle an error from any service call.
    ///
    /// An authentication failure ends the session and drops all cached data;
    /// the user is sent to the login page unless already on an auth page.
    pub fn handle_error(&self, err: &ClientError, current_route: &str) -> Option<Redirect> {
        if !matches!(err, ClientError::Unauthenticated) {
            return None;
        }

        self.auth.expire_session();
        self.clinic.clear_tenant_data();
        self.cache.clear();

        if is_auth_route(current_route) {
            return None;
        }

        tracing::info!(from = current_route, "Redirecting to login");
        Some(Redirect {
            to: LOGIN_ROUTE.to_string(),
            from: Some(current_route.to_string()),
        })
    }

    pub fn guard(&self, guard: &RouteGuard) -> GuardOutcome {
        let snapshot = self.auth.snapshot();
        guard.check(snapshot.status, snapshot.user.map(|u| u.role))
    }

    pub async fn login(&self, email: &str, password: &str) -> bool {
        let ok = self.auth.login(email, password).await;
        if ok {
            self.cache.clear();
        }
        ok
    }

    pub fn logout(&self) {
        self.auth.logout();
        self.clinic.clear_tenant_data();
        self.cache.clear();
    }

    /// Select another clinic; cached data belongs to the previous tenant
    pub async fn switch_clinic(&self, clinic_id: &str) -> bool {
        let ok = self.clinic.switch_clinic(clinic_id).await;
        if ok {
            self.cache.clear();
        }
        ok
    }

    pub async fn clear_clinic_selection(&self) -> bool {
        let ok = self.clinic.clear_clinic_selection().await;
        if ok {
            self.cache.clear();
        }
        ok
    }
}

impl Drop for ClinicApp {
    fn drop(&mut self) {
        if let Some(handle) = self.auth_sync.take() {
            handle.abort();
        }
    }
}
