//! Signed REST access to the cloud provider.
//!
//! The provider has no Rust SDK, so each API the portal touches is a single
//! signed HTTP call. Nothing here interprets provider semantics beyond
//! decoding the few response bodies the portal reads.

pub mod identity;
pub mod principal;
pub mod profile;
pub mod registry;
pub mod signer;
pub mod transport;

pub use registry::ClientRegistry;
pub use signer::{create_signer, ApiKeySigner, AuthType, Credentials, RequestSigner, SignerError};
pub use transport::{CloudTransport, Endpoints, RegionalClient, Service};

use reqwest::{Response, StatusCode};

#[derive(Debug, thiserror::Error)]
pub enum CloudError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("request signing failed: {0}")]
    Signing(String),

    #[error("provider returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("unexpected provider response: {0}")]
    Decode(String),

    #[error("unknown region {0}")]
    UnknownRegion(String),
}

/// Pass 2xx responses through; turn anything else into [`CloudError::Status`].
pub(crate) async fn ensure_success(response: Response) -> Result<Response, CloudError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(CloudError::Status { status, body })
}
