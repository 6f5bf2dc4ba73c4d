use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// `namespace -> key -> value` as the search service reports defined tags.
pub type DefinedTags = BTreeMap<String, BTreeMap<String, serde_json::Value>>;

const CONSOLE_BASE_URL: &str = "https://cloud.oracle.com";

/// One resource returned by a search, normalised for display and deletion.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ResourceDescriptor {
    pub resource_type: String,
    pub identifier: String,
    pub display_name: Option<String>,
    pub compartment_id: Option<String>,
    pub region: String,
    pub defined_tags: DefinedTags,
    pub lifecycle_state: Option<String>,
    pub time_created: Option<DateTime<Utc>>,
}

impl ResourceDescriptor {
    pub fn tag_value(&self, namespace: &str, key: &str) -> Option<&serde_json::Value> {
        self.defined_tags.get(namespace)?.get(key)
    }

    /// True when `namespace.key` holds exactly `user`.
    pub fn is_owned_by(&self, namespace: &str, key: &str, user: &str) -> bool {
        self.tag_value(namespace, key).and_then(|v| v.as_str()) == Some(user)
    }

    pub fn name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.identifier)
    }

    pub fn console_url(&self) -> Option<String> {
        let prefix = match self.resource_type.as_str() {
            "Instance" => "compute/instances/",
            "Volume" => "block-storage/volumes/",
            "Bucket" => "object-storage/buckets/",
            _ => return None,
        };
        Some(format!(
            "{}/{}{}?region={}",
            CONSOLE_BASE_URL, prefix, self.identifier, self.region
        ))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn descriptor(resource_type: &str, identifier: &str, tags: serde_json::Value) -> ResourceDescriptor {
        ResourceDescriptor {
            resource_type: resource_type.to_string(),
            identifier: identifier.to_string(),
            display_name: None,
            compartment_id: None,
            region: "us-ashburn-1".to_string(),
            defined_tags: serde_json::from_value(tags).unwrap(),
            lifecycle_state: Some("AVAILABLE".to_string()),
            time_created: None,
        }
    }

    #[test]
    fn ownership_requires_exact_string_match() {
        let resource = descriptor(
            "Instance",
            "ocid1.instance.a",
            serde_json::json!({"Owner": {"Creator": "alice", "Count": 3}}),
        );

        assert!(resource.is_owned_by("Owner", "Creator", "alice"));
        assert!(!resource.is_owned_by("Owner", "Creator", "Alice"));
        assert!(!resource.is_owned_by("Owner", "Count", "3"));
        assert!(!resource.is_owned_by("Other", "Creator", "alice"));
    }

    #[test]
    fn console_links_for_known_types_only() {
        let instance = descriptor("Instance", "ocid1.instance.a", serde_json::json!({}));
        assert_eq!(
            instance.console_url().as_deref(),
            Some("https://cloud.oracle.com/compute/instances/ocid1.instance.a?region=us-ashburn-1")
        );

        let bucket = descriptor("Bucket", "ocid1.bucket.b", serde_json::json!({}));
        assert!(bucket.console_url().unwrap().contains("/object-storage/buckets/"));

        let db = descriptor("AutonomousDatabase", "ocid1.adb.c", serde_json::json!({}));
        assert!(db.console_url().is_none());
    }

    #[test]
    fn name_falls_back_to_identifier() {
        let mut resource = descriptor("Volume", "ocid1.volume.v", serde_json::json!({}));
        assert_eq!(resource.name(), "ocid1.volume.v");
        resource.display_name = Some("scratch".into());
        assert_eq!(resource.name(), "scratch");
    }
}
