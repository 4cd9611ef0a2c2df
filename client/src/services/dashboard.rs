//! Dashboard analytics and backend health

use std::sync::Arc;
use std::time::Duration;

use shared::{DashboardOverview, HealthStatus, RevenuePoint, RevenueQuery};

use crate::error::ClientResult;
use crate::http::ApiClient;
use crate::query::{minutes, QueryCache, QueryKey, QueryOptions, QuerySubscription};

const DASHBOARD_SCOPE: &str = "dashboard";
const ANALYTICS_SCOPE: &str = "analytics";
const HEALTH_SCOPE: &str = "health";

const OVERVIEW_OPTIONS: QueryOptions =
    QueryOptions::fresh_for(minutes(1)).with_refetch_interval(minutes(5));
const REVENUE_OPTIONS: QueryOptions = QueryOptions::fresh_for(minutes(5));
const HEALTH_OPTIONS: QueryOptions =
    QueryOptions::fresh_for(Duration::from_secs(30)).with_retry(3, Duration::from_secs(1));

/// Dashboard analytics service
#[derive(Clone)]
pub struct DashboardService {
    api: ApiClient,
    cache: QueryCache,
}

impl DashboardService {
    pub fn new(api: ApiClient, cache: QueryCache) -> Self {
        Self { api, cache }
    }

    pub fn overview_key() -> QueryKey {
        QueryKey::new(DASHBOARD_SCOPE, "overview")
    }

    pub async fn overview(&self) -> ClientResult<Arc<DashboardOverview>> {
        self.cache
            .fetch(&Self::overview_key(), &OVERVIEW_OPTIONS, || {
                self.api.get("/dashboard/overview")
            })
            .await
    }

    /// Keep the overview refreshed in the background until the subscription is dropped
    pub fn watch_overview(&self) -> QuerySubscription<DashboardOverview> {
        self.watch_overview_every(OVERVIEW_OPTIONS)
    }

    pub fn watch_overview_every(&self, options: QueryOptions) -> QuerySubscription<DashboardOverview> {
        let api = self.api.clone();
        self.cache.poll(Self::overview_key(), options, move || {
            let api = api.clone();
            async move { api.get("/dashboard/overview").await }
        })
    }

    pub async fn revenue(&self, query: &RevenueQuery) -> ClientResult<Arc<Vec<RevenuePoint>>> {
        self.cache
            .fetch(&QueryKey::new(ANALYTICS_SCOPE, query), &REVENUE_OPTIONS, || {
                self.api.get_with_query("/analytics/revenue", query)
            })
            .await
    }
}

/// Backend health probe
#[derive(Clone)]
pub struct HealthService {
    api: ApiClient,
    cache: QueryCache,
    options: QueryOptions,
}

impl HealthService {
    pub fn new(api: ApiClient, cache: QueryCache) -> Self {
        Self {
            api,
            cache,
            options: HEALTH_OPTIONS,
        }
    }

    /// Override the retry policy, e.g. for a shorter delay in tests
    pub fn with_options(mut self, options: QueryOptions) -> Self {
        self.options = options;
        self
    }

    pub async fn check(&self) -> ClientResult<Arc<HealthStatus>> {
        self.cache
            .fetch(&QueryKey::scope(HEALTH_SCOPE), &self.options, || {
                self.api.get("/health")
            })
            .await
    }
}
