use portal_core::config::{configuration_directory, load_layered};
use portal_core::observability::LoggingSettings;
use secrecy::Secret;
use serde::Deserialize;

/// Prefix for environment overrides, e.g. `PORTAL_OIDC__CLIENT_ID`.
pub const ENV_PREFIX: &str = "PORTAL";

#[derive(Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub oidc: OidcSettings,
    pub ownership: OwnershipSettings,
    #[serde(default)]
    pub filter: FilterSettings,
    #[serde(default)]
    pub cloud: CloudSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Browser-facing base URL; the OIDC callback and post-logout URIs hang off it.
    pub public_url: String,
    #[serde(default = "default_cookie_name")]
    pub session_cookie_name: String,
    #[serde(default = "default_session_timeout")]
    pub session_timeout_seconds: i64,
    /// Set to true in production with HTTPS.
    #[serde(default)]
    pub secure_cookie: bool,
}

fn default_cookie_name() -> String {
    "omid".to_string()
}

fn default_session_timeout() -> i64 {
    900
}

impl ServerSettings {
    pub fn callback_url(&self) -> String {
        format!("{}/callback", self.public_url.trim_end_matches('/'))
    }

    pub fn post_logout_url(&self) -> String {
        format!("{}/", self.public_url.trim_end_matches('/'))
    }
}

#[derive(Deserialize, Clone)]
pub struct OidcSettings {
    /// Issuer base URL; discovery is read from `/.well-known/openid-configuration`.
    pub provider_url: String,
    pub client_id: String,
    pub client_secret: Secret<String>,
    #[serde(default = "default_scope")]
    pub scope: String,
}

fn default_scope() -> String {
    "openid email".to_string()
}

#[derive(Deserialize, Clone, Debug)]
pub struct OwnershipSettings {
    pub tag_namespace: String,
    pub tag_key: String,
}

#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    #[default]
    None,
    Expiry,
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct FilterSettings {
    #[serde(default)]
    pub kind: FilterKind,
    /// Defaults to the ownership namespace.
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct CloudSettings {
    /// profile | instance_principal | delegation_token | workload_principal
    #[serde(default = "default_auth_type")]
    pub auth_type: String,
    #[serde(default = "default_config_file")]
    pub config_file: String,
    #[serde(default = "default_profile")]
    pub profile: String,
    /// Tenancy OCID for principals whose certificate does not name one.
    #[serde(default)]
    pub tenancy: Option<String>,
    /// Route every service call to `<override>/<region>` instead of the public endpoints.
    #[serde(default)]
    pub endpoint_override: Option<String>,
    #[serde(default = "default_metadata_url")]
    pub metadata_url: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

fn default_auth_type() -> String {
    "profile".to_string()
}

fn default_config_file() -> String {
    "~/.oci/config".to_string()
}

fn default_profile() -> String {
    "DEFAULT".to_string()
}

fn default_metadata_url() -> String {
    "http://169.254.169.254/opc/v2".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for CloudSettings {
    fn default() -> Self {
        Self {
            auth_type: default_auth_type(),
            config_file: default_config_file(),
            profile: default_profile(),
            tenancy: None,
            endpoint_override: None,
            metadata_url: default_metadata_url(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let configuration_directory = configuration_directory("reclaim-portal")?;
    load_layered(&configuration_directory, ENV_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> serde_json::Value {
        serde_json::json!({
            "server": { "host": "127.0.0.1", "port": 5000, "public_url": "http://localhost:5000/" },
            "oidc": { "provider_url": "https://idp.example", "client_id": "portal", "client_secret": "s3cret" },
            "ownership": { "tag_namespace": "Owner", "tag_key": "CreatedBy" }
        })
    }

    #[test]
    fn defaults_fill_optional_sections() {
        let settings: Settings = serde_json::from_value(minimal()).unwrap();

        assert_eq!(settings.server.session_cookie_name, "omid");
        assert_eq!(settings.server.session_timeout_seconds, 900);
        assert_eq!(settings.oidc.scope, "openid email");
        assert_eq!(settings.filter.kind, FilterKind::None);
        assert_eq!(settings.cloud.auth_type, "profile");
        assert_eq!(settings.cloud.profile, "DEFAULT");
    }

    #[test]
    fn callback_urls_ignore_trailing_slash() {
        let settings: Settings = serde_json::from_value(minimal()).unwrap();

        assert_eq!(
            settings.server.callback_url(),
            "http://localhost:5000/callback"
        );
        assert_eq!(settings.server.post_logout_url(), "http://localhost:5000/");
    }
}
