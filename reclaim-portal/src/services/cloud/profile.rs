//! Reading API-key profiles from the provider's INI config file.

use config::{Config, File, FileFormat, Map, Value};
use std::path::{Path, PathBuf};

use super::signer::{ApiKeySigner, SignerError};

const DEFAULT_SECTION: &str = "DEFAULT";

#[derive(Debug, Clone)]
pub struct OciProfile {
    pub tenancy: String,
    pub user: String,
    pub fingerprint: String,
    pub region: String,
    pub key_file: Option<String>,
    pub key_content: Option<String>,
    pub pass_phrase: Option<String>,
    pub delegation_token_file: Option<String>,
}

impl OciProfile {
    pub fn private_key_pem(&self) -> Result<String, SignerError> {
        if let Some(content) = &self.key_content {
            return Ok(content.clone());
        }

        let key_file = self
            .key_file
            .as_deref()
            .ok_or_else(|| SignerError::Config("profile has neither key_file nor key_content".into()))?;
        let path = expand_home(key_file);
        std::fs::read_to_string(&path).map_err(|source| SignerError::Io {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn api_key_signer(&self) -> Result<ApiKeySigner, SignerError> {
        if self.pass_phrase.is_some() {
            return Err(SignerError::Key(
                "encrypted private keys (pass_phrase) are not supported".into(),
            ));
        }

        ApiKeySigner::from_pem(
            &self.tenancy,
            &self.user,
            &self.fingerprint,
            &self.private_key_pem()?,
        )
    }
}

/// Replace a leading `~` with `$HOME`.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return Path::new(&home).join(rest);
        }
    }
    PathBuf::from(path)
}

/// Load `profile` from the INI file at `path`, layered over `[DEFAULT]`.
pub fn load_profile(path: &Path, profile: &str) -> Result<OciProfile, SignerError> {
    let config = Config::builder()
        .add_source(File::from(path).format(FileFormat::Ini).required(true))
        .build()
        .map_err(|e| SignerError::Config(format!("{}: {}", path.display(), e)))?;

    let mut merged = section(&config, DEFAULT_SECTION).unwrap_or_default();
    if profile != DEFAULT_SECTION {
        let named = section(&config, profile)
            .ok_or_else(|| SignerError::Config(format!("profile {} not found", profile)))?;
        merged.extend(named);
    } else if merged.is_empty() {
        return Err(SignerError::Config(format!("profile {} not found", profile)));
    }

    Ok(OciProfile {
        tenancy: required(&merged, "tenancy")?,
        user: required(&merged, "user")?,
        fingerprint: required(&merged, "fingerprint")?,
        region: required(&merged, "region")?,
        key_file: optional(&merged, "key_file"),
        key_content: optional(&merged, "key_content"),
        pass_phrase: optional(&merged, "pass_phrase"),
        delegation_token_file: optional(&merged, "delegation_token_file"),
    })
}

// Section names may come back lowercased from the INI source.
fn section(config: &Config, name: &str) -> Option<Map<String, Value>> {
    config
        .get_table(name)
        .ok()
        .or_else(|| config.get_table(&name.to_lowercase()).ok())
}

fn optional(values: &Map<String, Value>, key: &str) -> Option<String> {
    values
        .get(key)
        .cloned()
        .and_then(|v| v.into_string().ok())
        .filter(|v| !v.is_empty())
}

fn required(values: &Map<String, Value>, key: &str) -> Result<String, SignerError> {
    optional(values, key).ok_or_else(|| SignerError::Config(format!("profile is missing {}", key)))
}
