//! Common types used across the client

use serde::{Deserialize, Serialize};

/// Pagination and search parameters accepted by list endpoints
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            page: Some(1),
            limit: Some(10),
            search: None,
        }
    }
}

impl ListParams {
    pub fn page(page: u32, limit: u32) -> Self {
        Self {
            page: Some(page),
            limit: Some(limit),
            search: None,
        }
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }
}

/// Paginated response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub pagination: PaginationMeta,
}

/// Pagination metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaginationMeta {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub limit: u32,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub pages: u32,
}

/// A reference field the backend sends either as a bare id or as the
/// expanded document, e.g. `patient_id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum EntityRef<T> {
    Id(String),
    Expanded(T),
}

/// Anything with a backend identifier
pub trait HasId {
    fn id(&self) -> &str;
}

impl<T: HasId> EntityRef<T> {
    pub fn id(&self) -> &str {
        match self {
            EntityRef::Id(id) => id,
            EntityRef::Expanded(entity) => entity.id(),
        }
    }

    pub fn expanded(&self) -> Option<&T> {
        match self {
            EntityRef::Id(_) => None,
            EntityRef::Expanded(entity) => Some(entity),
        }
    }
}
