//! Clinic Management Client
//!
//! Session, tenant and data-access layer for the clinic REST backend: the
//! authenticated HTTP client, auth and clinic-selection services, a keyed
//! query cache and one service per backend resource.

pub mod app;
pub mod config;
pub mod error;
pub mod http;
pub mod query;
pub mod services;
pub mod storage;
pub mod token;

pub use app::{ClinicApp, Redirect};
pub use config::Config;
pub use error::{ClientError, ClientResult};
pub use http::ApiClient;
pub use query::{QueryCache, QueryKey, QueryOptions, QueryState, QuerySubscription};
pub use storage::{FileBackend, MemoryBackend, PersistedState, SessionStorage, StorageBackend};
