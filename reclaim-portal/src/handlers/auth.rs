use axum::{
    extract::{Query, State},
    response::Redirect,
};
use serde::Deserialize;
use subtle::ConstantTimeEq;
use tower_sessions::Session;

use crate::error::PortalError;
use crate::models::identity::{
    current_identity, Identity, CSRF_TOKEN_KEY, IDENTITY_KEY, OIDC_NONCE_KEY, OIDC_STATE_KEY,
};
use crate::services::authenticator::AuthError;
use crate::utils::token_urlsafe;
use crate::AppState;

/// Start the code flow: remember state and nonce, then send the browser to the provider.
pub async fn login(State(app): State<AppState>, session: Session) -> Result<Redirect, PortalError> {
    if current_identity(&session).await?.is_some() {
        return Ok(Redirect::to("/resources"));
    }

    let state = token_urlsafe();
    let nonce = token_urlsafe();
    session.insert(OIDC_STATE_KEY, &state).await?;
    session.insert(OIDC_NONCE_KEY, &nonce).await?;

    let url = app
        .authenticator
        .build_login_redirect(&app.callback_url, &nonce, &state);

    tracing::debug!("Redirecting to identity provider");
    Ok(Redirect::to(url.as_str()))
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

pub async fn callback(
    State(app): State<AppState>,
    session: Session,
    Query(params): Query<CallbackParams>,
) -> Result<Redirect, PortalError> {
    // The pending login is consumed whatever happens next.
    let expected_state: Option<String> = session.remove(OIDC_STATE_KEY).await?;
    let nonce: Option<String> = session.remove(OIDC_NONCE_KEY).await?;

    if let Some(error) = params.error {
        tracing::warn!(
            %error,
            description = params.error_description.as_deref().unwrap_or(""),
            "Identity provider returned an error"
        );
        return Err(PortalError::BadRequest(format!(
            "identity provider returned {}",
            error
        )));
    }

    let state_matches = match (&expected_state, &params.state) {
        (Some(expected), Some(received)) => bool::from(expected.as_bytes().ct_eq(received.as_bytes())),
        _ => false,
    };
    if !state_matches {
        return Err(AuthError::StateMismatch.into());
    }

    let code = params
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| PortalError::BadRequest("missing authorization code".into()))?;

    let tokens = app
        .authenticator
        .exchange_code(&code, nonce.as_deref())
        .await?;
    let display_name = app.authenticator.resolve_display_name(&tokens).await;

    let identity = Identity {
        subject: tokens.claims.sub.clone(),
        display_name,
        email: tokens.claims.email.clone(),
        issued_token: tokens.id_token,
    };

    session.cycle_id().await?;
    session.insert(IDENTITY_KEY, &identity).await?;
    session.insert(CSRF_TOKEN_KEY, token_urlsafe()).await?;

    tracing::info!(subject = %identity.subject, "User signed in");
    Ok(Redirect::to("/resources"))
}

/// End the local session and hand the browser to the provider's logout.
pub async fn logout(State(app): State<AppState>, session: Session) -> Result<Redirect, PortalError> {
    let identity = current_identity(&session).await?;
    session.flush().await?;

    match identity {
        Some(identity) => {
            tracing::info!(subject = %identity.subject, "User signed out");
            let url = app
                .authenticator
                .build_logout_redirect(&identity.issued_token, &app.post_logout_url);
            Ok(Redirect::to(url.as_str()))
        }
        None => Ok(Redirect::to("/")),
    }
}
