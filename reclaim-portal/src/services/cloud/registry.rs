use std::collections::BTreeMap;

use super::CloudError;

/// One client per subscribed region, built once at startup.
#[derive(Debug, Clone)]
pub struct ClientRegistry<T> {
    clients: BTreeMap<String, T>,
}

impl<T> ClientRegistry<T> {
    /// Build a client for every region up front; the first failure aborts.
    pub fn build<E>(
        regions: &[String],
        mut make: impl FnMut(&str) -> Result<T, E>,
    ) -> Result<Self, E> {
        let mut clients = BTreeMap::new();
        for region in regions {
            clients.insert(region.clone(), make(region)?);
        }
        Ok(Self { clients })
    }

    pub fn get(&self, region: &str) -> Result<&T, CloudError> {
        self.clients
            .get(region)
            .ok_or_else(|| CloudError::UnknownRegion(region.to_string()))
    }

    pub fn regions(&self) -> impl Iterator<Item = &str> {
        self.clients.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
