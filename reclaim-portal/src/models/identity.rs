use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::error::PortalError;

pub const IDENTITY_KEY: &str = "identity";
pub const OIDC_STATE_KEY: &str = "oidc_state";
pub const OIDC_NONCE_KEY: &str = "oidc_nonce";
pub const CSRF_TOKEN_KEY: &str = "csrf_token";

/// The signed-in user, stored in the session after a verified callback.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Identity {
    /// ID token `sub`; this is the value ownership tags are compared with.
    pub subject: String,
    pub display_name: String,
    pub email: Option<String>,
    /// Raw ID token, sent back as `id_token_hint` at logout.
    pub issued_token: String,
}

/// The session's identity; a store failure is an error, not an anonymous visitor.
pub async fn current_identity(session: &Session) -> Result<Option<Identity>, PortalError> {
    Ok(session.get(IDENTITY_KEY).await?)
}

impl Identity {
    pub fn initials(&self) -> String {
        let initials: String = self
            .display_name
            .split_whitespace()
            .filter_map(|word| word.chars().next())
            .take(2)
            .collect::<String>()
            .to_uppercase();

        if initials.is_empty() {
            "U".to_string()
        } else {
            initials
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|_| {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to extract session",
                )
                    .into_response()
            })?;

        match current_identity(&session).await {
            Ok(Some(identity)) => Ok(identity),
            Ok(None) => Err(PortalError::NotSignedIn.into_response()),
            Err(err) => Err(err.into_response()),
        }
    }
}
