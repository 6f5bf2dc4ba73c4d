//! Dispatches a delete to the provider API that owns the resource type.
//!
//! The provider's answer is reported as-is. There is no retry, no waiting for
//! the resource to reach a terminal state and no cleanup of dependants.

pub mod bundle;
pub mod kind;

pub use bundle::ClientBundle;
pub use kind::{DeleteRoute, ResourceKind};

use async_trait::async_trait;
use reqwest::StatusCode;
use std::collections::HashMap;

use crate::services::cloud::{ClientRegistry, CloudError, CloudTransport};

/// Issues the delete call for one resource kind.
#[async_trait]
pub trait TerminateHandler: Send + Sync {
    async fn terminate(&self, bundle: &ClientBundle, identifier: &str)
        -> Result<StatusCode, CloudError>;
}

/// `DELETE <service>/<version>/<collection>/<identifier>` on the region's bundle.
pub struct RestDelete {
    route: DeleteRoute,
}

impl RestDelete {
    pub fn new(route: DeleteRoute) -> Self {
        Self { route }
    }
}

#[async_trait]
impl TerminateHandler for RestDelete {
    async fn terminate(
        &self,
        bundle: &ClientBundle,
        identifier: &str,
    ) -> Result<StatusCode, CloudError> {
        let client = bundle.client(self.route.service)?;
        let mut url = client.url(&[self.route.version, self.route.collection, identifier])?;
        if !self.route.query.is_empty() {
            url.query_pairs_mut().extend_pairs(self.route.query.iter().copied());
        }

        match client.send(client.delete(url)).await {
            Ok(response) => Ok(response.status()),
            Err(CloudError::Status { status, body }) => {
                tracing::warn!(%status, %body, "Provider rejected delete");
                Ok(status)
            }
            Err(err) => Err(err),
        }
    }
}

pub struct Deleter {
    bundles: ClientRegistry<ClientBundle>,
    handlers: HashMap<ResourceKind, Box<dyn TerminateHandler>>,
}

impl std::fmt::Debug for Deleter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deleter")
            .field("regions", &self.bundles.regions().collect::<Vec<_>>())
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

impl Deleter {
    /// Build a client bundle for every region and the kind → handler table.
    pub fn new(transport: &CloudTransport, regions: &[String]) -> Result<Self, CloudError> {
        let bundles = ClientRegistry::build(regions, |region| ClientBundle::new(transport, region))?;

        let handlers = ResourceKind::ALL
            .into_iter()
            .map(|kind| {
                let handler: Box<dyn TerminateHandler> = Box::new(RestDelete::new(kind.delete_route()));
                (kind, handler)
            })
            .collect();

        Ok(Self { bundles, handlers })
    }

    /// Delete `identifier` and return the provider's status.
    ///
    /// Unknown resource types answer `501 Not Implemented` without any provider call.
    #[tracing::instrument(skip(self))]
    pub async fn terminate(
        &self,
        resource_type: &str,
        identifier: &str,
        region: &str,
    ) -> Result<StatusCode, CloudError> {
        let handler = match resource_type
            .parse::<ResourceKind>()
            .ok()
            .and_then(|kind| self.handlers.get(&kind))
        {
            Some(handler) => handler,
            None => {
                tracing::warn!("No delete handler for resource type");
                metrics::counter!(
                    "portal_deletions_total",
                    "resource_type" => "unsupported",
                    "status" => StatusCode::NOT_IMPLEMENTED.as_u16().to_string()
                )
                .increment(1);
                return Ok(StatusCode::NOT_IMPLEMENTED);
            }
        };

        let bundle = self.bundles.get(region)?;
        let status = handler.terminate(bundle, identifier).await?;

        tracing::info!(%status, "Delete request completed");
        metrics::counter!(
            "portal_deletions_total",
            "resource_type" => resource_type.to_string(),
            "status" => status.as_u16().to_string()
        )
        .increment(1);

        Ok(status)
    }
}
