//! Federated credentials for compute instances and Kubernetes workloads.
//!
//! Instance principals exchange the instance's metadata-service certificate
//! for a session token at the regional auth service. Workload principals ask
//! the cluster-local proxy for a resource principal session token using the
//! pod's service-account token.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::sync::Arc;

use super::signer::{
    parse_private_key, sign_request_with, Credentials, SessionTokenSigner, SessionTokenSource,
    SignerError,
};
use super::transport::{Endpoints, Service};
use super::{ensure_success, CloudError};
use crate::config::CloudSettings;
use crate::utils::jwt::decode_claims_unverified;

const METADATA_AUTHORIZATION: &str = "Bearer Oracle";
const TENANT_MARKERS: [&str; 2] = ["opc-tenant:", "opc-identity:"];
const SESSION_TOKEN_PREFIX: &str = "ST$";

const DEFAULT_SA_TOKEN_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";
const DEFAULT_SA_CERT_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/ca.crt";
const PROXYMUX_PORT: u16 = 12250;

/// Small client for the instance metadata service (v2).
#[derive(Clone)]
pub struct MetadataClient {
    http: reqwest::Client,
    base_url: String,
}

impl MetadataClient {
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn text(&self, path: &str) -> Result<String, CloudError> {
        let response = self
            .http
            .get(format!("{}/{}", self.base_url, path))
            .header(reqwest::header::AUTHORIZATION, METADATA_AUTHORIZATION)
            .send()
            .await?;
        let body = ensure_success(response).await?.text().await?;
        Ok(body.trim().to_string())
    }
}

pub async fn instance_principal(
    settings: &CloudSettings,
    http: &reqwest::Client,
    endpoints: &Endpoints,
    obo_token: Option<String>,
) -> Result<Credentials, SignerError> {
    let metadata = MetadataClient::new(http.clone(), &settings.metadata_url);
    let region = metadata.text("instance/canonicalRegionName").await?;

    let tenancy = match &settings.tenancy {
        Some(tenancy) => tenancy.clone(),
        None => {
            let certificate = metadata.text("identity/cert.pem").await?;
            tenancy_from_certificate(&certificate)?
        }
    };
    tracing::info!(%region, %tenancy, "Resolved instance principal");

    let source = X509FederationSource {
        http: http.clone(),
        metadata,
        federation_url: format!("{}/v1/x509", endpoints.base_url(Service::Auth, &region)),
        tenancy: tenancy.clone(),
    };
    let signer = SessionTokenSigner::new(Box::new(source), obo_token)?;

    Ok(Credentials {
        tenancy,
        region,
        signer: Arc::new(signer),
    })
}

/// Read the delegation token named by `OCI_CONFIG_FILE`/`OCI_CONFIG_PROFILE`.
pub fn read_delegation_token() -> Result<String, SignerError> {
    let config_file = std::env::var("OCI_CONFIG_FILE")
        .map_err(|_| SignerError::Config("OCI_CONFIG_FILE must be set for delegation tokens".into()))?;
    let profile_name = std::env::var("OCI_CONFIG_PROFILE")
        .map_err(|_| SignerError::Config("OCI_CONFIG_PROFILE must be set for delegation tokens".into()))?;

    let path = super::profile::expand_home(&config_file);
    let token_file = delegation_token_file(&path, &profile_name)?;
    let token_path = super::profile::expand_home(&token_file);

    std::fs::read_to_string(&token_path)
        .map(|token| token.trim().to_string())
        .map_err(|source| SignerError::Io {
            path: token_path.display().to_string(),
            source,
        })
}

fn delegation_token_file(path: &std::path::Path, profile: &str) -> Result<String, SignerError> {
    let config = config::Config::builder()
        .add_source(config::File::from(path).format(config::FileFormat::Ini))
        .build()
        .map_err(|e| SignerError::Config(format!("{}: {}", path.display(), e)))?;

    [profile.to_string(), profile.to_lowercase()]
        .iter()
        .find_map(|section| {
            config
                .get_string(&format!("{}.delegation_token_file", section))
                .ok()
        })
        .ok_or_else(|| {
            SignerError::Config(format!("profile {} has no delegation_token_file", profile))
        })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct X509FederationRequest {
    certificate: String,
    public_key: String,
    intermediate_certificates: Vec<String>,
    purpose: &'static str,
}

#[derive(Deserialize)]
struct TokenResponse {
    token: String,
}

/// Exchanges the instance leaf certificate for a session token.
struct X509FederationSource {
    http: reqwest::Client,
    metadata: MetadataClient,
    federation_url: String,
    tenancy: String,
}

#[async_trait]
impl SessionTokenSource for X509FederationSource {
    async fn fetch(&self, session_public_key: &str) -> Result<String, CloudError> {
        // Certificates rotate, so fetch them fresh for every federation.
        let leaf_certificate = self.metadata.text("identity/cert.pem").await?;
        let leaf_key = self.metadata.text("identity/key.pem").await?;
        let intermediate = self.metadata.text("identity/intermediate.pem").await?;

        let leaf_key = parse_private_key(&leaf_key)
            .map_err(|e| CloudError::Signing(format!("instance key: {}", e)))?;
        let key_id = format!(
            "{}/fed-x509/{}",
            self.tenancy,
            certificate_fingerprint(&leaf_certificate)?
        );

        let body = X509FederationRequest {
            certificate: pem_body(&leaf_certificate),
            public_key: session_public_key.to_string(),
            intermediate_certificates: vec![pem_body(&intermediate)],
            purpose: "DEFAULT",
        };

        let mut request = self.http.post(&self.federation_url).json(&body).build()?;
        sign_request_with(&mut request, &key_id, leaf_key)?;

        let response = ensure_success(self.http.execute(request).await?).await?;
        let token: TokenResponse = response.json().await?;
        Ok(token.token)
    }
}

/// Where to find the cluster-local token proxy and the pod's credentials.
#[derive(Debug, Clone)]
pub struct WorkloadEnvironment {
    pub region: String,
    pub proxymux_url: String,
    pub service_account_token_path: String,
    pub service_account_cert_path: Option<String>,
}

impl WorkloadEnvironment {
    pub fn from_env() -> Result<Self, SignerError> {
        let host = std::env::var("KUBERNETES_SERVICE_HOST")
            .map_err(|_| SignerError::Config("KUBERNETES_SERVICE_HOST is not set".into()))?;
        let region = std::env::var("OCI_RESOURCE_PRINCIPAL_REGION")
            .map_err(|_| SignerError::Config("OCI_RESOURCE_PRINCIPAL_REGION is not set".into()))?;

        Ok(Self {
            region,
            proxymux_url: format!(
                "https://{}:{}/resourcePrincipalSessionTokens",
                host, PROXYMUX_PORT
            ),
            service_account_token_path: std::env::var(
                "OCI_KUBERNETES_SERVICE_ACCOUNT_TOKEN_PATH",
            )
            .unwrap_or_else(|_| DEFAULT_SA_TOKEN_PATH.to_string()),
            service_account_cert_path: Some(
                std::env::var("OCI_KUBERNETES_SERVICE_ACCOUNT_CERT_PATH")
                    .unwrap_or_else(|_| DEFAULT_SA_CERT_PATH.to_string()),
            ),
        })
    }
}

#[derive(Deserialize)]
struct ResourcePrincipalClaims {
    res_tenant: String,
}

pub async fn workload_principal(
    environment: WorkloadEnvironment,
) -> Result<Credentials, SignerError> {
    let mut builder = reqwest::Client::builder();
    if let Some(cert_path) = &environment.service_account_cert_path {
        let pem = std::fs::read(cert_path).map_err(|source| SignerError::Io {
            path: cert_path.clone(),
            source,
        })?;
        let certificate = reqwest::Certificate::from_pem(&pem).map_err(CloudError::from)?;
        builder = builder.add_root_certificate(certificate);
    }
    let http = builder.build().map_err(CloudError::from)?;

    let region = environment.region.clone();
    let source = ProxymuxSource { http, environment };
    let signer = SessionTokenSigner::new(Box::new(source), None)?;

    let token = signer.current_token().await?;
    let claims: ResourcePrincipalClaims = decode_claims_unverified(&token)
        .map_err(|e| SignerError::Federation(format!("resource principal token: {}", e)))?;
    tracing::info!(%region, tenancy = %claims.res_tenant, "Resolved workload principal");

    Ok(Credentials {
        tenancy: claims.res_tenant,
        region,
        signer: Arc::new(signer),
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PodKeyRequest<'a> {
    pod_key: &'a str,
}

struct ProxymuxSource {
    http: reqwest::Client,
    environment: WorkloadEnvironment,
}

#[async_trait]
impl SessionTokenSource for ProxymuxSource {
    async fn fetch(&self, session_public_key: &str) -> Result<String, CloudError> {
        let path = &self.environment.service_account_token_path;
        let sa_token = std::fs::read_to_string(path)
            .map_err(|e| CloudError::Signing(format!("service account token {}: {}", path, e)))?;

        let response = self
            .http
            .post(&self.environment.proxymux_url)
            .bearer_auth(sa_token.trim())
            .json(&PodKeyRequest {
                pod_key: session_public_key,
            })
            .send()
            .await?;
        let body = ensure_success(response).await?.text().await?;

        decode_proxymux_token(&body)
    }
}

/// The proxy answers with a base64 JSON document wrapping an `ST$` token.
fn decode_proxymux_token(body: &str) -> Result<String, CloudError> {
    let encoded = body.trim().trim_matches('"');
    let decoded = STANDARD
        .decode(encoded)
        .map_err(|e| CloudError::Decode(format!("proxymux response: {}", e)))?;
    let token: TokenResponse = serde_json::from_slice(&decoded)
        .map_err(|e| CloudError::Decode(format!("proxymux response: {}", e)))?;

    Ok(token
        .token
        .strip_prefix(SESSION_TOKEN_PREFIX)
        .unwrap_or(&token.token)
        .to_string())
}

/// Base64 body of a PEM document with the armour lines and newlines removed.
pub fn pem_body(pem: &str) -> String {
    pem.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("-----"))
        .collect()
}

fn certificate_der(pem: &str) -> Result<Vec<u8>, CloudError> {
    STANDARD
        .decode(pem_body(pem))
        .map_err(|e| CloudError::Decode(format!("certificate: {}", e)))
}

/// Upper-case, colon separated SHA-1 of the certificate DER.
pub fn certificate_fingerprint(pem: &str) -> Result<String, CloudError> {
    let digest = Sha1::digest(certificate_der(pem)?);
    Ok(digest
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(":"))
}

/// Find the tenancy OCID the certificate subject carries as `opc-tenant:` or `opc-identity:`.
pub fn tenancy_from_certificate(pem: &str) -> Result<String, SignerError> {
    let der = certificate_der(pem)?;
    let (_, certificate) = x509_parser::parse_x509_certificate(&der)
        .map_err(|e| CloudError::Decode(format!("certificate: {}", e)))?;

    let subject: Vec<&str> = certificate
        .subject()
        .iter_attributes()
        .filter_map(|attribute| attribute.as_str().ok())
        .collect();

    TENANT_MARKERS
        .iter()
        .find_map(|marker| {
            subject
                .iter()
                .filter_map(|value| value.strip_prefix(marker))
                .find(|ocid| !ocid.is_empty())
        })
        .map(str::to_string)
        .ok_or_else(|| {
            SignerError::Federation(
                "instance certificate names no tenancy; set cloud.tenancy".into(),
            )
        })
}
