//! Staff training progress service

use std::sync::Arc;

use serde_json::Value;
use shared::{CompleteModuleInput, TrainingProgress};

use crate::error::{ClientError, ClientResult};
use crate::http::ApiClient;
use crate::query::{minutes, QueryCache, QueryKey, QueryOptions};

const SCOPE: &str = "training";
const OPTIONS: QueryOptions = QueryOptions::fresh_for(minutes(15));

/// Training service
#[derive(Clone)]
pub struct TrainingService {
    api: ApiClient,
    cache: QueryCache,
}

impl TrainingService {
    pub fn new(api: ApiClient, cache: QueryCache) -> Self {
        Self { api, cache }
    }

    /// Progress of the signed-in user
    pub async fn progress(&self) -> ClientResult<Arc<TrainingProgress>> {
        self.cache
            .fetch(&QueryKey::new(SCOPE, "progress"), &OPTIONS, || {
                self.api.get("/training/progress")
            })
            .await
    }

    pub async fn complete_module(&self, module_id: &str, score: Option<u32>) -> ClientResult<()> {
        if module_id.trim().is_empty() {
            return Err(ClientError::validation("module_id", "Module is required"));
        }

        let input = CompleteModuleInput {
            module_id: module_id.to_string(),
            score,
        };
        let _: Value = self.api.post("/training/complete-module", &input).await?;
        tracing::info!(%module_id, "Training module completed");
        self.cache.invalidate(SCOPE);
        Ok(())
    }
}
