//! Generic CRUD service over a backend collection
//!
//! Each collection is described by a [`Resource`] marker type; the service
//! caches reads through the shared [`QueryCache`] and invalidates the
//! collection's scope after every successful write.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use shared::{validate_entity_id, PaginatedResponse};

use crate::error::{ClientError, ClientResult};
use crate::http::ApiClient;
use crate::query::{QueryCache, QueryKey, QueryOptions};

/// A backend collection
pub trait Resource: Send + Sync + 'static {
    /// Cache scope; also used in log lines
    const NAME: &'static str;
    /// Collection path relative to the API base URL
    const PATH: &'static str;
    /// How long reads are served from cache
    const STALE_TIME: Duration;

    type Item: DeserializeOwned + Send + Sync + 'static;
    type Filter: Serialize + Send + Sync;
    type Create: Serialize + Send + Sync;
    type Update: Serialize + Send + Sync;

    /// Local checks run before a create request is sent
    fn validate_create(_input: &Self::Create) -> ClientResult<()> {
        Ok(())
    }

    /// Other scopes whose data changes when this collection does
    fn related_scopes() -> &'static [&'static str] {
        &[]
    }

    fn query_options() -> QueryOptions {
        QueryOptions::fresh_for(Self::STALE_TIME)
    }
}

/// CRUD service for one [`Resource`]
pub struct ResourceService<R> {
    api: ApiClient,
    cache: QueryCache,
    _resource: PhantomData<fn() -> R>,
}

impl<R> Clone for ResourceService<R> {
    fn clone(&self) -> Self {
        Self {
            api: self.api.clone(),
            cache: self.cache.clone(),
            _resource: PhantomData,
        }
    }
}

impl<R: Resource> ResourceService<R> {
    pub fn new(api: ApiClient, cache: QueryCache) -> Self {
        Self {
            api,
            cache,
            _resource: PhantomData,
        }
    }

    pub fn list_key(filter: &R::Filter) -> QueryKey {
        QueryKey::new(R::NAME, filter)
    }

    pub fn detail_key(id: &str) -> QueryKey {
        QueryKey::detail(R::NAME, id)
    }

    /// One page of the collection
    pub async fn list(&self, filter: &R::Filter) -> ClientResult<Arc<PaginatedResponse<R::Item>>> {
        let key = Self::list_key(filter);
        self.cache
            .fetch(&key, &R::query_options(), || {
                self.api.get_with_query(R::PATH, filter)
            })
            .await
    }

    pub async fn get(&self, id: &str) -> ClientResult<Arc<R::Item>> {
        let id = Self::checked_id(id)?;
        let path = Self::item_path(id)?;
        let key = Self::detail_key(id);
        self.cache
            .fetch(&key, &R::query_options(), || self.api.get(&path))
            .await
    }

    pub async fn create(&self, input: &R::Create) -> ClientResult<R::Item> {
        R::validate_create(input)?;
        let created = self.api.post(R::PATH, input).await?;
        tracing::info!(resource = R::NAME, "Created record");
        self.invalidate();
        Ok(created)
    }

    pub async fn update(&self, id: &str, input: &R::Update) -> ClientResult<R::Item> {
        let id = Self::checked_id(id)?;
        let path = Self::item_path(id)?;
        let updated = self.api.put(&path, input).await?;
        tracing::info!(resource = R::NAME, %id, "Updated record");
        self.invalidate();
        Ok(updated)
    }

    pub async fn delete(&self, id: &str) -> ClientResult<()> {
        let id = Self::checked_id(id)?;
        let path = Self::item_path(id)?;
        self.api.delete(&path).await?;
        tracing::info!(resource = R::NAME, %id, "Deleted record");
        self.invalidate();
        Ok(())
    }

    /// Mark every cached read of this collection (and related ones) stale
    pub fn invalidate(&self) {
        self.cache.invalidate(R::NAME);
        for scope in R::related_scopes() {
            self.cache.invalidate(scope);
        }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub(crate) fn item_path(id: &str) -> ClientResult<String> {
        Ok(format!("{}/{}", R::PATH, Self::checked_id(id)?))
    }

    /// The id with surrounding whitespace removed, if well-formed
    fn checked_id(id: &str) -> ClientResult<&str> {
        let id = id.trim();
        validate_entity_id(id).map_err(|m| ClientError::validation("id", m))?;
        Ok(id)
    }
}
