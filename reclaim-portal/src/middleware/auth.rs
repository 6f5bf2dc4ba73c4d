use axum::{
    body::Body,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tower_sessions::Session;

use crate::error::PortalError;
use crate::models::identity::current_identity;

/// Send anonymous visitors to `/login` before the handler runs.
pub async fn require_identity(session: Session, request: Request<Body>, next: Next) -> Response {
    match current_identity(&session).await {
        Ok(Some(_)) => next.run(request).await,
        Ok(None) => PortalError::NotSignedIn.into_response(),
        Err(err) => err.into_response(),
    }
}
