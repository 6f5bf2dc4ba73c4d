use askama::Template;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use thiserror::Error;

use crate::services::authenticator::AuthError;
use crate::services::cloud::CloudError;
use crate::services::search::SearchError;

#[derive(Debug, Error)]
pub enum PortalError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Search(#[from] SearchError),

    #[error(transparent)]
    Cloud(#[from] CloudError),

    #[error("Not signed in")]
    NotSignedIn,

    #[error("Form token mismatch")]
    CsrfMismatch,

    #[error("You do not own resource {0}")]
    NotOwner(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub status: u16,
    pub reason: String,
    pub message: String,
}

impl PortalError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            PortalError::Auth(AuthError::Http(_)) => StatusCode::BAD_GATEWAY,
            PortalError::Auth(_) => StatusCode::BAD_REQUEST,
            PortalError::Search(err) => match err {
                SearchError::NotFound(_) => StatusCode::NOT_FOUND,
                SearchError::InvalidQueryValue { .. }
                | SearchError::UnknownRegion(_)
                | SearchError::UnknownResourceType(_) => StatusCode::BAD_REQUEST,
                SearchError::SearchFailure(_) | SearchError::Cloud(_) => StatusCode::BAD_GATEWAY,
                SearchError::Bootstrap(_) => StatusCode::SERVICE_UNAVAILABLE,
            },
            PortalError::Cloud(CloudError::UnknownRegion(_)) => StatusCode::BAD_REQUEST,
            PortalError::Cloud(_) => StatusCode::BAD_GATEWAY,
            PortalError::NotSignedIn => StatusCode::UNAUTHORIZED,
            PortalError::CsrfMismatch | PortalError::NotOwner(_) => StatusCode::FORBIDDEN,
            PortalError::BadRequest(_) | PortalError::Validation(_) => StatusCode::BAD_REQUEST,
            PortalError::Session(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    // Upstream details stay in the logs.
    fn public_message(&self) -> String {
        match self {
            PortalError::Search(SearchError::SearchFailure(_))
            | PortalError::Search(SearchError::Cloud(_))
            | PortalError::Cloud(_)
                if self.status_code() == StatusCode::BAD_GATEWAY =>
            {
                "The cloud provider could not complete the request.".to_string()
            }
            PortalError::Auth(_) => format!("Sign-in failed: {}", self),
            PortalError::Session(_) => "Session storage failed.".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for PortalError {
    fn into_response(self) -> Response {
        if matches!(self, PortalError::NotSignedIn) {
            return Redirect::to("/login").into_response();
        }

        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, %status, "Request failed");
        } else {
            tracing::warn!(error = %self, %status, "Request rejected");
        }

        let page = ErrorTemplate {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.public_message(),
        };
        (status, page).into_response()
    }
}
