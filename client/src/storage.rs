//! Persisted client state
//!
//! The session token, the serialized session user and the clinic selection
//! live in one small document so they survive a restart. `SessionStorage`
//! keeps the in-memory copy and writes every mutation through to its backend
//! before returning.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use shared::SessionUser;

use crate::error::{ClientError, ClientResult};

/// Everything the client persists between runs
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PersistedState {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub user: Option<SessionUser>,
    #[serde(default)]
    pub clinic_id: Option<String>,
    #[serde(default)]
    pub clinic_token: Option<String>,
}

/// Where persisted state is kept
pub trait StorageBackend: Send + Sync {
    fn load(&self) -> ClientResult<PersistedState>;
    fn save(&self, state: &PersistedState) -> ClientResult<()>;
}

/// Process-local backend, used in tests and for throwaway sessions
#[derive(Default)]
pub struct MemoryBackend {
    document: Mutex<PersistedState>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryBackend {
    fn load(&self) -> ClientResult<PersistedState> {
        Ok(lock(&self.document).clone())
    }

    fn save(&self, state: &PersistedState) -> ClientResult<()> {
        *lock(&self.document) = state.clone();
        Ok(())
    }
}

/// JSON file backend
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl StorageBackend for FileBackend {
    fn load(&self) -> ClientResult<PersistedState> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(PersistedState::default()),
            Ok(raw) => serde_json::from_str(&raw).map_err(|e| {
                ClientError::Storage(format!("{} is corrupt: {}", self.path.display(), e))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(PersistedState::default()),
            Err(e) => Err(ClientError::Storage(format!(
                "Failed to read {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    fn save(&self, state: &PersistedState) -> ClientResult<()> {
        let raw = serde_json::to_string_pretty(state)?;
        std::fs::write(&self.path, raw).map_err(|e| {
            ClientError::Storage(format!("Failed to write {}: {}", self.path.display(), e))
        })
    }
}

/// Typed access to the persisted session and tenant keys
#[derive(Clone)]
pub struct SessionStorage {
    backend: Arc<dyn StorageBackend>,
    state: Arc<Mutex<PersistedState>>,
}

impl SessionStorage {
    /// Open storage, starting empty if the persisted document is unreadable
    pub fn open(backend: Arc<dyn StorageBackend>) -> Self {
        let state = match backend.load() {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!("Discarding persisted session state: {}", e);
                PersistedState::default()
            }
        };

        Self {
            backend,
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn in_memory() -> Self {
        Self::open(Arc::new(MemoryBackend::new()))
    }

    pub fn snapshot(&self) -> PersistedState {
        lock(&self.state).clone()
    }

    pub fn token(&self) -> Option<String> {
        lock(&self.state).token.clone()
    }

    pub fn user(&self) -> Option<SessionUser> {
        lock(&self.state).user.clone()
    }

    pub fn clinic_id(&self) -> Option<String> {
        lock(&self.state).clinic_id.clone()
    }

    pub fn clinic_token(&self) -> Option<String> {
        lock(&self.state).clinic_token.clone()
    }

    /// Token to present on requests: the tenant-scoped one when a clinic is selected
    pub fn bearer_token(&self) -> Option<String> {
        let state = lock(&self.state);
        match (&state.clinic_id, &state.clinic_token) {
            (Some(_), Some(clinic_token)) => Some(clinic_token.clone()),
            _ => state.token.clone(),
        }
    }

    pub fn set_token(&self, token: impl Into<String>) -> ClientResult<()> {
        let token = token.into();
        self.update(|s| s.token = Some(token))
    }

    pub fn set_user(&self, user: &SessionUser) -> ClientResult<()> {
        self.update(|s| s.user = Some(user.clone()))
    }

    pub fn set_session(&self, token: impl Into<String>, user: &SessionUser) -> ClientResult<()> {
        let token = token.into();
        self.update(|s| {
            s.token = Some(token);
            s.user = Some(user.clone());
        })
    }

    pub fn set_clinic(
        &self,
        clinic_id: impl Into<String>,
        clinic_token: impl Into<String>,
    ) -> ClientResult<()> {
        let clinic_id = clinic_id.into();
        let clinic_token = clinic_token.into();
        self.update(|s| {
            s.clinic_id = Some(clinic_id);
            s.clinic_token = Some(clinic_token);
        })
    }

    /// Remove the session token and user
    pub fn clear_session(&self) -> ClientResult<()> {
        self.update(|s| {
            s.token = None;
            s.user = None;
        })
    }

    /// Remove the clinic id and tenant token
    pub fn clear_clinic(&self) -> ClientResult<()> {
        self.update(|s| {
            s.clinic_id = None;
            s.clinic_token = None;
        })
    }

    /// Apply `f` to a copy, persist it, and only then make it current
    fn update(&self, f: impl FnOnce(&mut PersistedState)) -> ClientResult<()> {
        let mut state = lock(&self.state);
        let mut next = state.clone();
        f(&mut next);
        self.backend.save(&next)?;
        *state = next;
        Ok(())
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
