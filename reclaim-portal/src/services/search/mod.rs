//! Ownership-scoped resource search across the tenancy's subscribed regions.

pub mod client;
pub mod filter;
pub mod query;

pub use client::{ResourceSummary, SearchClient, SearchPage};
pub use filter::{ExpiryFilter, PassThrough, ResultFilter};

use reqwest::StatusCode;
use serde::Deserialize;
use std::sync::Arc;

use crate::config::OwnershipSettings;
use crate::models::ResourceDescriptor;
use crate::services::cloud::identity::list_region_subscriptions;
use crate::services::cloud::{ClientRegistry, CloudError, CloudTransport, Credentials, Service};
use query::{identifier_query, owned_resources_query, ALL_RESOURCES};

pub const DEFAULT_PAGE_SIZE: u32 = 25;
pub const MAX_PAGE_SIZE: u32 = 1000;

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("search bootstrap failed: {0}")]
    Bootstrap(#[source] CloudError),

    #[error("search failed with status {0}")]
    SearchFailure(StatusCode),

    #[error("resource {0} not found")]
    NotFound(String),

    #[error("unknown region {0}")]
    UnknownRegion(String),

    #[error("unknown resource type {0}")]
    UnknownResourceType(String),

    #[error("invalid value for {field}")]
    InvalidQueryValue { field: &'static str },

    #[error(transparent)]
    Cloud(CloudError),
}

impl From<CloudError> for SearchError {
    fn from(err: CloudError) -> Self {
        match err {
            CloudError::Status { status, body } => {
                tracing::warn!(%status, %body, "Search request rejected by provider");
                SearchError::SearchFailure(status)
            }
            CloudError::UnknownRegion(region) => SearchError::UnknownRegion(region),
            other => SearchError::Cloud(other),
        }
    }
}

/// Query parameters of a search page; everything defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchRequest {
    pub region: Option<String>,
    pub resource_type: Option<String>,
    pub page: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct ResourcePage {
    pub region: String,
    pub resource_type: String,
    /// Page size actually requested from the provider.
    pub limit: u32,
    pub resources: Vec<ResourceDescriptor>,
    pub next_page: Option<String>,
}

#[derive(Debug)]
pub struct Search {
    tag_namespace: String,
    tag_key: String,
    home_region: String,
    regions: Vec<String>,
    resource_types: Vec<String>,
    clients: ClientRegistry<SearchClient>,
    filter: Arc<dyn ResultFilter>,
}

impl Search {
    /// Discover regions and searchable types. Any failure here is fatal.
    pub async fn initialize(
        ownership: &OwnershipSettings,
        credentials: &Credentials,
        transport: &CloudTransport,
    ) -> Result<Self, SearchError> {
        let subscriptions =
            list_region_subscriptions(transport, &credentials.tenancy, &credentials.region)
                .await
                .map_err(SearchError::Bootstrap)?;

        let mut regions: Vec<String> = subscriptions
            .iter()
            .filter(|s| s.is_ready())
            .map(|s| s.region_name.clone())
            .collect();
        regions.sort();

        let home_region = subscriptions
            .iter()
            .find(|s| s.is_home_region)
            .map(|s| s.region_name.clone())
            .unwrap_or_else(|| {
                tracing::warn!(
                    region = %credentials.region,
                    "No home region subscription reported, using credential region"
                );
                credentials.region.clone()
            });

        let clients = ClientRegistry::build(&regions, |region| {
            transport
                .regional(Service::Query, region)
                .map(SearchClient::new)
        })
        .map_err(SearchError::Bootstrap)?;

        let resource_types = clients
            .get(&home_region)
            .map_err(SearchError::Bootstrap)?
            .list_resource_types()
            .await
            .map_err(SearchError::Bootstrap)?;

        tracing::info!(
            home_region = %home_region,
            regions = regions.len(),
            resource_types = resource_types.len(),
            "Search initialized"
        );

        Ok(Self {
            tag_namespace: ownership.tag_namespace.clone(),
            tag_key: ownership.tag_key.clone(),
            home_region,
            regions,
            resource_types,
            clients,
            filter: Arc::new(PassThrough),
        })
    }

    pub fn with_filter(mut self, filter: Arc<dyn ResultFilter>) -> Self {
        self.filter = filter;
        self
    }

    pub fn home_region(&self) -> &str {
        &self.home_region
    }

    pub fn regions(&self) -> &[String] {
        &self.regions
    }

    pub fn resource_types(&self) -> &[String] {
        &self.resource_types
    }

    fn resolve_resource_type(&self, requested: Option<&str>) -> Result<String, SearchError> {
        let requested = requested.filter(|t| !t.is_empty()).unwrap_or(ALL_RESOURCES);
        if requested.eq_ignore_ascii_case(ALL_RESOURCES) {
            return Ok(ALL_RESOURCES.to_string());
        }

        self.resource_types
            .iter()
            .find(|t| t.eq_ignore_ascii_case(requested))
            .cloned()
            .ok_or_else(|| SearchError::UnknownResourceType(requested.to_string()))
    }

    /// One page of the user's live resources in a region, after the filter.
    #[tracing::instrument(
        skip(self, request),
        fields(region = tracing::field::Empty, resource_type = tracing::field::Empty)
    )]
    pub async fn search_owned_resources(
        &self,
        user: &str,
        request: &SearchRequest,
    ) -> Result<ResourcePage, SearchError> {
        let region = request
            .region
            .as_deref()
            .filter(|r| !r.is_empty())
            .unwrap_or(&self.home_region)
            .to_string();
        let resource_type = self.resolve_resource_type(request.resource_type.as_deref())?;
        let limit = request
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);

        tracing::Span::current()
            .record("region", region.as_str())
            .record("resource_type", resource_type.as_str());

        let client = self.clients.get(&region)?;
        let query = owned_resources_query(&resource_type, &self.tag_namespace, &self.tag_key, user)?;

        let page = match client
            .search_resources(&query, Some(limit), request.page.as_deref())
            .await
        {
            Ok(page) => page,
            Err(err) => {
                metrics::counter!("portal_searches_total", "outcome" => "failure").increment(1);
                return Err(err.into());
            }
        };

        let owned: Vec<ResourceDescriptor> = page
            .items
            .into_iter()
            .map(|item| item.into_descriptor(&region))
            .filter(|resource| {
                let owned = resource.is_owned_by(&self.tag_namespace, &self.tag_key, user);
                if !owned {
                    tracing::warn!(
                        identifier = %resource.identifier,
                        "Dropping search result without matching ownership tag"
                    );
                }
                owned
            })
            .collect();

        let resources = self.filter.apply(owned);
        metrics::counter!("portal_searches_total", "outcome" => "success").increment(1);
        tracing::debug!(count = resources.len(), "Search completed");

        Ok(ResourcePage {
            region,
            resource_type,
            limit,
            resources,
            next_page: page.next_page,
        })
    }

    /// The resource with `identifier`, whoever owns it.
    pub async fn lookup_by_id(
        &self,
        identifier: &str,
        region: &str,
    ) -> Result<ResourceDescriptor, SearchError> {
        let client = self.clients.get(region)?;
        let query = identifier_query(identifier)?;

        let page = client.search_resources(&query, None, None).await?;
        if page.items.len() > 1 {
            tracing::error!(
                %identifier,
                count = page.items.len(),
                "Identifier lookup returned more than one resource"
            );
        }

        page.items
            .into_iter()
            .next()
            .map(|item| item.into_descriptor(region))
            .ok_or_else(|| SearchError::NotFound(identifier.to_string()))
    }

    /// The resource if `user` owns it; missing and foreign resources are both `None`.
    pub async fn owned_resource(
        &self,
        user: &str,
        identifier: &str,
        region: &str,
    ) -> Result<Option<ResourceDescriptor>, SearchError> {
        match self.lookup_by_id(identifier, region).await {
            Ok(resource) => Ok(resource
                .is_owned_by(&self.tag_namespace, &self.tag_key, user)
                .then_some(resource)),
            Err(SearchError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Whether `user` owns `identifier`; a missing resource is simply not owned.
    pub async fn validate_ownership(
        &self,
        user: &str,
        identifier: &str,
        region: &str,
    ) -> Result<bool, SearchError> {
        Ok(self.owned_resource(user, identifier, region).await?.is_some())
    }
}
