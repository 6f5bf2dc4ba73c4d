use chrono::{NaiveDate, Utc};
use std::sync::Arc;

use crate::config::{FilterKind, FilterSettings, OwnershipSettings};
use crate::models::ResourceDescriptor;

const DEFAULT_EXPIRY_KEY: &str = "Expiry";
const EXPIRY_DATE_FORMAT: &str = "%Y-%m-%d";

/// Post-processing applied to every page of search results.
pub trait ResultFilter: Send + Sync + std::fmt::Debug {
    fn apply(&self, results: Vec<ResourceDescriptor>) -> Vec<ResourceDescriptor>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PassThrough;

impl ResultFilter for PassThrough {
    fn apply(&self, results: Vec<ResourceDescriptor>) -> Vec<ResourceDescriptor> {
        results
    }
}

/// Hides resources whose expiry tag date is today or earlier.
///
/// Missing, non-string and unparsable tag values are kept.
#[derive(Debug, Clone)]
pub struct ExpiryFilter {
    namespace: String,
    key: String,
}

impl ExpiryFilter {
    pub fn new(namespace: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            key: key.into(),
        }
    }

    pub fn apply_on(
        &self,
        results: Vec<ResourceDescriptor>,
        today: NaiveDate,
    ) -> Vec<ResourceDescriptor> {
        results
            .into_iter()
            .filter(|resource| !self.is_expired(resource, today))
            .collect()
    }

    fn is_expired(&self, resource: &ResourceDescriptor, today: NaiveDate) -> bool {
        let Some(value) = resource
            .tag_value(&self.namespace, &self.key)
            .and_then(|v| v.as_str())
        else {
            return false;
        };

        match NaiveDate::parse_from_str(value, EXPIRY_DATE_FORMAT) {
            Ok(expires) => expires <= today,
            Err(_) => {
                tracing::debug!(
                    identifier = %resource.identifier,
                    value,
                    "Ignoring unparsable expiry tag"
                );
                false
            }
        }
    }
}

impl ResultFilter for ExpiryFilter {
    fn apply(&self, results: Vec<ResourceDescriptor>) -> Vec<ResourceDescriptor> {
        self.apply_on(results, Utc::now().date_naive())
    }
}

/// Filter selected by `filter.kind`; the namespace defaults to the ownership one.
pub fn from_settings(
    settings: &FilterSettings,
    ownership: &OwnershipSettings,
) -> Arc<dyn ResultFilter> {
    match settings.kind {
        FilterKind::None => Arc::new(PassThrough),
        FilterKind::Expiry => {
            let filter = ExpiryFilter::new(
                settings
                    .namespace
                    .clone()
                    .unwrap_or_else(|| ownership.tag_namespace.clone()),
                settings
                    .key
                    .clone()
                    .unwrap_or_else(|| DEFAULT_EXPIRY_KEY.to_string()),
            );
            tracing::info!(?filter, "Using expiry filter");
            Arc::new(filter)
        }
    }
}
