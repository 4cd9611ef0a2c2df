//! Client services for the clinic backend

pub mod appointments;
pub mod auth;
pub mod billing;
pub mod clinic;
pub mod dashboard;
pub mod inventory;
pub mod lab;
pub mod patients;
pub mod resource;
pub mod training;

pub use appointments::{AppointmentService, Appointments};
pub use auth::{AuthService, AuthSnapshot};
pub use billing::{InvoiceService, Invoices, PaymentService, Payments, Payroll, PayrollService};
pub use clinic::{ClinicService, ClinicState};
pub use dashboard::{DashboardService, HealthService};
pub use inventory::{Inventory, InventoryService, LeadService, Leads};
pub use lab::{TestCategories, TestCategoryService, TurnaroundTimeService, TurnaroundTimes};
pub use patients::{MedicalRecordService, MedicalRecords, PatientService, Patients};
pub use resource::{Resource, ResourceService};
pub use training::TrainingService;
