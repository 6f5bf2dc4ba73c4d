//! OpenID Connect relying party.
//!
//! Discovery happens once at startup and the metadata never changes after
//! that. The JWKS is fetched lazily and refreshed once when an ID token names
//! a `kid` the cache does not know, which covers provider key rotation.

use jsonwebtoken::jwk::{Jwk, JwkSet};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use portal_core::observability::TracedRequestExt;
use reqwest::Url;
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::config::OidcSettings;

const DISCOVERY_PATH: &str = "/.well-known/openid-configuration";
const FALLBACK_LOGOUT_PATH: &str = "/oauth2/v1/userlogout";

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("provider discovery failed: {0}")]
    Discovery(String),

    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    #[error("invalid id token: {0}")]
    InvalidToken(String),

    #[error("nonce mismatch")]
    NonceMismatch,

    #[error("state mismatch")]
    StateMismatch,

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

/// The subset of the discovery document the portal uses.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderMetadata {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub jwks_uri: String,
    #[serde(default)]
    pub id_token_signing_alg_values_supported: Vec<String>,
    #[serde(default)]
    pub userinfo_endpoint: Option<String>,
    #[serde(default)]
    pub end_session_endpoint: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdTokenClaims {
    pub sub: String,
    #[serde(default)]
    pub nonce: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub preferred_username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    pub exp: i64,
    #[serde(default)]
    pub iat: Option<i64>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    id_token: String,
}

/// Tokens from a successful code exchange; `claims` are verified.
#[derive(Debug, Clone)]
pub struct TokenSet {
    pub access_token: String,
    pub id_token: String,
    pub claims: IdTokenClaims,
}

pub struct Authenticator {
    http: reqwest::Client,
    client_id: String,
    client_secret: Secret<String>,
    scope: String,
    redirect_uri: String,
    metadata: ProviderMetadata,
    authorization_endpoint: Url,
    logout_endpoint: Url,
    jwks: RwLock<Option<JwkSet>>,
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("client_id", &self.client_id)
            .field("issuer", &self.metadata.issuer)
            .field("redirect_uri", &self.redirect_uri)
            .finish_non_exhaustive()
    }
}

fn parse_endpoint(name: &str, value: &str) -> Result<Url, AuthError> {
    Url::parse(value).map_err(|e| AuthError::Discovery(format!("{} {:?}: {}", name, value, e)))
}

impl Authenticator {
    /// Fetch the provider's discovery document.
    ///
    /// `redirect_uri` is the portal's callback URL and must be registered
    /// with the provider.
    pub async fn discover(
        settings: &OidcSettings,
        redirect_uri: String,
        http: reqwest::Client,
    ) -> Result<Self, AuthError> {
        let provider_url = settings.provider_url.trim_end_matches('/');
        let discovery_url = format!("{}{}", provider_url, DISCOVERY_PATH);

        let response = http
            .get(&discovery_url)
            .with_trace_context()
            .send()
            .await
            .map_err(|e| AuthError::Discovery(e.to_string()))?;
        if !response.status().is_success() {
            return Err(AuthError::Discovery(format!(
                "{} returned {}",
                discovery_url,
                response.status()
            )));
        }
        let metadata: ProviderMetadata = response
            .json()
            .await
            .map_err(|e| AuthError::Discovery(e.to_string()))?;

        let authorization_endpoint =
            parse_endpoint("authorization_endpoint", &metadata.authorization_endpoint)?;
        parse_endpoint("token_endpoint", &metadata.token_endpoint)?;
        parse_endpoint("jwks_uri", &metadata.jwks_uri)?;
        let logout_endpoint = match &metadata.end_session_endpoint {
            Some(endpoint) => parse_endpoint("end_session_endpoint", endpoint)?,
            None => parse_endpoint(
                "logout endpoint",
                &format!("{}{}", provider_url, FALLBACK_LOGOUT_PATH),
            )?,
        };

        tracing::info!(issuer = %metadata.issuer, "Discovered OIDC provider");

        Ok(Self {
            http,
            client_id: settings.client_id.clone(),
            client_secret: settings.client_secret.clone(),
            scope: settings.scope.clone(),
            redirect_uri,
            metadata,
            authorization_endpoint,
            logout_endpoint,
            jwks: RwLock::new(None),
        })
    }

    pub fn metadata(&self) -> &ProviderMetadata {
        &self.metadata
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Authorization request URL for the code flow.
    pub fn build_login_redirect(&self, callback_url: &str, nonce: &str, state: &str) -> Url {
        let mut url = self.authorization_endpoint.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", callback_url)
            .append_pair("scope", &self.scope)
            .append_pair("nonce", nonce)
            .append_pair("state", state);
        url
    }

    /// Trade an authorization code for tokens and verify the ID token.
    pub async fn exchange_code(
        &self,
        code: &str,
        expected_nonce: Option<&str>,
    ) -> Result<TokenSet, AuthError> {
        let response = self
            .http
            .post(&self.metadata.token_endpoint)
            .basic_auth(&self.client_id, Some(self.client_secret.expose_secret()))
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.redirect_uri.as_str()),
            ])
            .with_trace_context()
            .send()
            .await
            .map_err(|e| AuthError::TokenExchange(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(%status, %body, "Token endpoint rejected authorization code");
            return Err(AuthError::TokenExchange(format!("token endpoint returned {}", status)));
        }

        let tokens: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::TokenExchange(e.to_string()))?;
        let claims = self.verify_id_token(&tokens.id_token).await?;

        if let Some(expected) = expected_nonce {
            if claims.nonce.as_deref() != Some(expected) {
                return Err(AuthError::NonceMismatch);
            }
        }

        Ok(TokenSet {
            access_token: tokens.access_token,
            id_token: tokens.id_token,
            claims,
        })
    }

    /// Check signature, issuer, audience and expiry of an ID token.
    pub async fn verify_id_token(&self, token: &str) -> Result<IdTokenClaims, AuthError> {
        let header = decode_header(token).map_err(|e| AuthError::InvalidToken(e.to_string()))?;

        if !self.is_advertised(header.alg) {
            return Err(AuthError::InvalidToken(format!(
                "algorithm {:?} is not advertised by the provider",
                header.alg
            )));
        }

        let kid = header
            .kid
            .as_deref()
            .ok_or_else(|| AuthError::InvalidToken("token header has no kid".into()))?;
        let jwk = self.signing_key(kid).await?;
        let key = DecodingKey::from_jwk(&jwk).map_err(|e| AuthError::InvalidToken(e.to_string()))?;

        let mut validation = Validation::new(header.alg);
        validation.set_issuer(&[&self.metadata.issuer]);
        validation.set_audience(&[&self.client_id]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);

        decode::<IdTokenClaims>(token, &key, &validation)
            .map(|data| data.claims)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))
    }

    // OIDC defaults to RS256 when the provider advertises nothing.
    fn is_advertised(&self, alg: Algorithm) -> bool {
        let name = match serde_json::to_value(alg) {
            Ok(serde_json::Value::String(name)) => name,
            _ => return false,
        };

        if self.metadata.id_token_signing_alg_values_supported.is_empty() {
            return name == "RS256";
        }
        self.metadata
            .id_token_signing_alg_values_supported
            .iter()
            .any(|advertised| *advertised == name)
    }

    async fn signing_key(&self, kid: &str) -> Result<Jwk, AuthError> {
        if let Some(jwk) = self
            .jwks
            .read()
            .await
            .as_ref()
            .and_then(|set| set.find(kid))
        {
            return Ok(jwk.clone());
        }

        tracing::debug!(kid, "Key id not cached, refreshing JWKS");
        let set = self.fetch_jwks().await?;
        let jwk = set.find(kid).cloned();
        *self.jwks.write().await = Some(set);

        jwk.ok_or_else(|| AuthError::InvalidToken(format!("no signing key with kid {}", kid)))
    }

    async fn fetch_jwks(&self) -> Result<JwkSet, AuthError> {
        let response = self
            .http
            .get(&self.metadata.jwks_uri)
            .with_trace_context()
            .send()
            .await
            .map_err(|e| AuthError::InvalidToken(format!("jwks fetch failed: {}", e)))?;
        if !response.status().is_success() {
            return Err(AuthError::InvalidToken(format!(
                "jwks fetch returned {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AuthError::InvalidToken(format!("jwks decode failed: {}", e)))
    }

    /// Provider logout URL that returns the browser to `post_logout_uri`.
    pub fn build_logout_redirect(&self, id_token: &str, post_logout_uri: &str) -> Url {
        let mut url = self.logout_endpoint.clone();
        url.query_pairs_mut()
            .append_pair("id_token_hint", id_token)
            .append_pair("post_logout_redirect_uri", post_logout_uri);
        url
    }

    pub async fn fetch_userinfo(&self, access_token: &str) -> Result<serde_json::Value, AuthError> {
        let endpoint = self
            .metadata
            .userinfo_endpoint
            .as_deref()
            .ok_or_else(|| AuthError::Discovery("provider has no userinfo endpoint".into()))?;

        let response = self
            .http
            .get(endpoint)
            .bearer_auth(access_token)
            .with_trace_context()
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    /// `name`, then `preferred_username`, then userinfo, then the subject.
    pub async fn resolve_display_name(&self, tokens: &TokenSet) -> String {
        let claims = &tokens.claims;
        if let Some(name) = claims.name.clone().or_else(|| claims.preferred_username.clone()) {
            return name;
        }

        match self.fetch_userinfo(&tokens.access_token).await {
            Ok(info) => ["name", "preferred_username"]
                .iter()
                .find_map(|field| info.get(*field).and_then(|v| v.as_str()))
                .map(str::to_string)
                .unwrap_or_else(|| claims.sub.clone()),
            Err(err) => {
                tracing::warn!(error = %err, "Userinfo lookup failed, using subject as display name");
                claims.sub.clone()
            }
        }
    }
}
