use portal_core::observability::TracedRequestExt;
use reqwest::{RequestBuilder, Response, Url};
use std::sync::Arc;

use super::signer::RequestSigner;
use super::{ensure_success, CloudError};

/// Provider services the portal calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    Identity,
    Query,
    Iaas,
    Database,
    Analytics,
    Integration,
    Bastion,
    DigitalAssistant,
    Auth,
}

impl Service {
    fn public_endpoint(self, region: &str) -> String {
        match self {
            Service::Identity => format!("https://identity.{}.oci.oraclecloud.com", region),
            Service::Query => format!("https://query.{}.oci.oraclecloud.com", region),
            Service::Iaas => format!("https://iaas.{}.oraclecloud.com", region),
            Service::Database => format!("https://database.{}.oraclecloud.com", region),
            Service::Analytics => format!("https://analytics.{}.ocp.oraclecloud.com", region),
            Service::Integration => format!("https://integration.{}.ocp.oraclecloud.com", region),
            Service::Bastion => format!("https://bastion.{}.oci.oraclecloud.com", region),
            Service::DigitalAssistant => {
                format!("https://digitalassistant-api.{}.oci.oraclecloud.com", region)
            }
            Service::Auth => format!("https://auth.{}.oraclecloud.com", region),
        }
    }
}

/// How service base URLs are derived from a region.
#[derive(Debug, Clone)]
pub enum Endpoints {
    Public,
    /// Every service in a region is served from `<base>/<region>`.
    Override(String),
}

impl Endpoints {
    pub fn from_override(endpoint_override: Option<&str>) -> Self {
        match endpoint_override {
            Some(base) if !base.is_empty() => Endpoints::Override(base.trim_end_matches('/').to_string()),
            _ => Endpoints::Public,
        }
    }

    pub fn base_url(&self, service: Service, region: &str) -> String {
        match self {
            Endpoints::Public => service.public_endpoint(region),
            Endpoints::Override(base) => format!("{}/{}", base, region),
        }
    }
}

/// Shared HTTP client plus the credential that signs every call.
#[derive(Clone)]
pub struct CloudTransport {
    http: reqwest::Client,
    signer: Arc<dyn RequestSigner>,
    endpoints: Endpoints,
}

impl CloudTransport {
    pub fn new(http: reqwest::Client, signer: Arc<dyn RequestSigner>, endpoints: Endpoints) -> Self {
        Self {
            http,
            signer,
            endpoints,
        }
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Client bound to one service in one region.
    pub fn regional(&self, service: Service, region: &str) -> Result<RegionalClient, CloudError> {
        let base = self.endpoints.base_url(service, region);
        let base_url =
            Url::parse(&base).map_err(|e| CloudError::Decode(format!("endpoint {}: {}", base, e)))?;

        Ok(RegionalClient {
            transport: self.clone(),
            service,
            region: region.to_string(),
            base_url,
        })
    }

    /// Sign and execute; non-2xx answers become [`CloudError::Status`].
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response, CloudError> {
        let mut request = builder.with_trace_context().build()?;
        self.signer.sign(&mut request).await?;

        let method = request.method().clone();
        let url = request.url().clone();
        let response = self.http.execute(request).await?;
        tracing::debug!(%method, url = %url, status = %response.status(), "Cloud API call");

        ensure_success(response).await
    }
}

#[derive(Clone)]
pub struct RegionalClient {
    transport: CloudTransport,
    service: Service,
    region: String,
    base_url: Url,
}

impl std::fmt::Debug for RegionalClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegionalClient")
            .field("service", &self.service)
            .field("region", &self.region)
            .field("base_url", &self.base_url.as_str())
            .finish()
    }
}

impl RegionalClient {
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Base URL with `segments` appended, each percent-encoded as one segment.
    pub fn url(&self, segments: &[&str]) -> Result<Url, CloudError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| CloudError::Decode(format!("endpoint {} cannot take a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub fn get(&self, url: Url) -> RequestBuilder {
        self.transport.http.get(url)
    }

    pub fn post(&self, url: Url) -> RequestBuilder {
        self.transport.http.post(url)
    }

    pub fn delete(&self, url: Url) -> RequestBuilder {
        self.transport.http.delete(url)
    }

    pub async fn send(&self, builder: RequestBuilder) -> Result<Response, CloudError> {
        self.transport.send(builder).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Leaves requests untouched.
    pub(crate) struct NoopSigner;

    #[async_trait]
    impl RequestSigner for NoopSigner {
        async fn sign(&self, _request: &mut reqwest::Request) -> Result<(), CloudError> {
            Ok(())
        }
    }

    fn transport(endpoints: Endpoints) -> CloudTransport {
        CloudTransport::new(reqwest::Client::new(), Arc::new(NoopSigner), endpoints)
    }

    #[test]
    fn public_endpoints_follow_service_templates() {
        let endpoints = Endpoints::Public;

        assert_eq!(
            endpoints.base_url(Service::Query, "us-ashburn-1"),
            "https://query.us-ashburn-1.oci.oraclecloud.com"
        );
        assert_eq!(
            endpoints.base_url(Service::Iaas, "us-ashburn-1"),
            "https://iaas.us-ashburn-1.oraclecloud.com"
        );
        assert_eq!(
            endpoints.base_url(Service::Analytics, "eu-frankfurt-1"),
            "https://analytics.eu-frankfurt-1.ocp.oraclecloud.com"
        );
        assert_eq!(
            endpoints.base_url(Service::DigitalAssistant, "eu-frankfurt-1"),
            "https://digitalassistant-api.eu-frankfurt-1.oci.oraclecloud.com"
        );
    }

    #[test]
    fn override_routes_by_region() {
        let endpoints = Endpoints::from_override(Some("http://localhost:9000/"));

        assert_eq!(
            endpoints.base_url(Service::Database, "us-phoenix-1"),
            "http://localhost:9000/us-phoenix-1"
        );
        assert!(matches!(Endpoints::from_override(Some("")), Endpoints::Public));
    }

    #[test]
    fn url_segments_are_encoded() {
        let client = transport(Endpoints::Public)
            .regional(Service::Iaas, "us-ashburn-1")
            .unwrap();
        assert_eq!(client.region(), "us-ashburn-1");

        let url = client.url(&["20160918", "volumes", "ocid1.volume/../x y"]).unwrap();

        assert_eq!(
            url.as_str(),
            "https://iaas.us-ashburn-1.oraclecloud.com/20160918/volumes/ocid1.volume%2F..%2Fx%20y"
        );
    }
}
