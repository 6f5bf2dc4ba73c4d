use std::collections::HashMap;

use crate::services::cloud::{CloudError, CloudTransport, RegionalClient, Service};

const BUNDLED_SERVICES: [Service; 6] = [
    Service::Iaas,
    Service::Database,
    Service::Analytics,
    Service::Integration,
    Service::Bastion,
    Service::DigitalAssistant,
];

/// Every delete-capable service client for one region.
#[derive(Debug, Clone)]
pub struct ClientBundle {
    region: String,
    clients: HashMap<Service, RegionalClient>,
}

impl ClientBundle {
    pub fn new(transport: &CloudTransport, region: &str) -> Result<Self, CloudError> {
        let clients = BUNDLED_SERVICES
            .iter()
            .map(|service| Ok((*service, transport.regional(*service, region)?)))
            .collect::<Result<HashMap<_, _>, CloudError>>()?;

        Ok(Self {
            region: region.to_string(),
            clients,
        })
    }

    pub fn client(&self, service: Service) -> Result<&RegionalClient, CloudError> {
        self.clients.get(&service).ok_or_else(|| {
            CloudError::Decode(format!("no {:?} client in region {}", service, self.region))
        })
    }
}
