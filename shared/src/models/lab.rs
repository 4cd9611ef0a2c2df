//! Lab test catalogue models

use serde::{Deserialize, Serialize};

use crate::types::HasId;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestCategory {
    #[serde(alias = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl HasId for TestCategory {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCategoryInput {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TurnaroundPriority {
    Routine,
    Urgent,
    Stat,
}

/// Expected time to result for a class of lab tests
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TurnaroundTime {
    #[serde(alias = "_id")]
    pub id: String,
    pub name: String,
    pub duration_hours: u32,
    pub priority: TurnaroundPriority,
    #[serde(default)]
    pub description: Option<String>,
}

impl HasId for TurnaroundTime {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnaroundTimeInput {
    pub name: String,
    pub duration_hours: u32,
    pub priority: TurnaroundPriority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}
