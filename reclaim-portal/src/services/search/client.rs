use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{DefinedTags, ResourceDescriptor};
use crate::services::cloud::{CloudError, RegionalClient};

const API_VERSION: &str = "20180409";
const NEXT_PAGE_HEADER: &str = "opc-next-page";

#[derive(Serialize)]
struct StructuredSearch<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    query: &'a str,
}

/// A search hit as the query service returns it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSummary {
    pub resource_type: String,
    pub identifier: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub compartment_id: Option<String>,
    #[serde(default)]
    pub lifecycle_state: Option<String>,
    #[serde(default)]
    pub time_created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub defined_tags: DefinedTags,
}

impl ResourceSummary {
    pub fn into_descriptor(self, region: &str) -> ResourceDescriptor {
        ResourceDescriptor {
            resource_type: self.resource_type,
            identifier: self.identifier,
            display_name: self.display_name,
            compartment_id: self.compartment_id,
            region: region.to_string(),
            defined_tags: self.defined_tags,
            lifecycle_state: self.lifecycle_state,
            time_created: self.time_created,
        }
    }
}

#[derive(Deserialize)]
struct ResourceSummaryCollection {
    #[serde(default)]
    items: Vec<ResourceSummary>,
}

#[derive(Deserialize)]
struct ResourceType {
    name: String,
}

#[derive(Debug)]
pub struct SearchPage {
    pub items: Vec<ResourceSummary>,
    pub next_page: Option<String>,
}

/// Query service client for one region.
#[derive(Debug, Clone)]
pub struct SearchClient {
    client: RegionalClient,
}

impl SearchClient {
    pub fn new(client: RegionalClient) -> Self {
        Self { client }
    }

    pub async fn search_resources(
        &self,
        query: &str,
        limit: Option<u32>,
        page: Option<&str>,
    ) -> Result<SearchPage, CloudError> {
        let mut url = self.client.url(&[API_VERSION, "resources"])?;
        {
            let mut pairs = url.query_pairs_mut();
            if let Some(limit) = limit {
                pairs.append_pair("limit", &limit.to_string());
            }
            if let Some(page) = page {
                pairs.append_pair("page", page);
            }
        }

        let body = StructuredSearch {
            kind: "Structured",
            query,
        };
        let response = self.client.send(self.client.post(url).json(&body)).await?;
        let next_page = next_page(&response);
        let collection: ResourceSummaryCollection = response
            .json()
            .await
            .map_err(|e| CloudError::Decode(format!("search results: {}", e)))?;

        Ok(SearchPage {
            items: collection.items,
            next_page,
        })
    }

    /// Names of every searchable resource type, following pagination to the end.
    pub async fn list_resource_types(&self) -> Result<Vec<String>, CloudError> {
        let mut names = Vec::new();
        let mut page: Option<String> = None;

        loop {
            let mut url = self.client.url(&[API_VERSION, "resourceTypes"])?;
            if let Some(page) = &page {
                url.query_pairs_mut().append_pair("page", page);
            }

            let response = self.client.send(self.client.get(url)).await?;
            page = next_page(&response);
            let types: Vec<ResourceType> = response
                .json()
                .await
                .map_err(|e| CloudError::Decode(format!("resource types: {}", e)))?;
            names.extend(types.into_iter().map(|t| t.name));

            if page.is_none() {
                break;
            }
        }

        Ok(names)
    }
}

fn next_page(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get(NEXT_PAGE_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
