use serde::Deserialize;

use super::transport::{CloudTransport, Service};
use super::CloudError;

const API_VERSION: &str = "20160918";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RegionSubscription {
    pub region_key: String,
    pub region_name: String,
    pub status: String,
    pub is_home_region: bool,
}

impl RegionSubscription {
    pub fn is_ready(&self) -> bool {
        self.status.eq_ignore_ascii_case("READY")
    }
}

/// Regions the tenancy is subscribed to, asked of the credential's own region.
pub async fn list_region_subscriptions(
    transport: &CloudTransport,
    tenancy: &str,
    region: &str,
) -> Result<Vec<RegionSubscription>, CloudError> {
    let client = transport.regional(Service::Identity, region)?;
    let url = client.url(&[API_VERSION, "tenancies", tenancy, "regionSubscriptions"])?;

    let response = client.send(client.get(url)).await?;
    response
        .json()
        .await
        .map_err(|e| CloudError::Decode(format!("region subscriptions: {}", e)))
}
