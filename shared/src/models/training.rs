//! Staff training progress models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModuleProgress {
    pub module_id: String,
    pub title: String,
    pub completed: bool,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub score: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrainingProgress {
    pub user_id: String,
    #[serde(default)]
    pub modules: Vec<ModuleProgress>,
}

impl TrainingProgress {
    /// Share of completed modules, 0-100
    pub fn percent_complete(&self) -> u32 {
        if self.modules.is_empty() {
            return 0;
        }
        let done = self.modules.iter().filter(|m| m.completed).count();
        ((done * 100) / self.modules.len()) as u32
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CompleteModuleInput {
    pub module_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<u32>,
}
