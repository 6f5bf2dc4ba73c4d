use askama::Template;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Form,
};
use serde::Deserialize;
use subtle::ConstantTimeEq;
use tower_sessions::Session;
use validator::Validate;

use crate::error::PortalError;
use crate::models::identity::{Identity, CSRF_TOKEN_KEY};
use crate::models::ResourceDescriptor;
use crate::services::search::SearchRequest;
use crate::AppState;

#[derive(Template)]
#[template(path = "resources.html")]
pub struct ResourcesTemplate {
    pub identity: Identity,
    pub csrf_token: String,
    pub regions: Vec<String>,
    pub resource_types: Vec<String>,
    pub region: String,
    pub resource_type: String,
    pub resources: Vec<ResourceDescriptor>,
    pub next_page_href: Option<String>,
}

#[derive(Template)]
#[template(path = "result.html")]
pub struct DeleteResultTemplate {
    pub identity: Identity,
    pub identifier: String,
    pub resource_type: String,
    pub region: String,
    pub status: u16,
    pub accepted: bool,
}

pub async fn list_resources(
    State(app): State<AppState>,
    identity: Identity,
    session: Session,
    Query(request): Query<SearchRequest>,
) -> Result<ResourcesTemplate, PortalError> {
    let page = app
        .search
        .search_owned_resources(&identity.subject, &request)
        .await?;

    let limit = page.limit.to_string();
    let next_page_href = match &page.next_page {
        Some(token) => {
            let query = serde_urlencoded::to_string([
                ("region", page.region.as_str()),
                ("resource_type", page.resource_type.as_str()),
                ("page", token.as_str()),
                ("limit", limit.as_str()),
            ])
            .map_err(|e| PortalError::BadRequest(e.to_string()))?;
            Some(format!("/resources?{}", query))
        }
        None => None,
    };

    let csrf_token: String = session.get(CSRF_TOKEN_KEY).await?.unwrap_or_default();

    Ok(ResourcesTemplate {
        identity,
        csrf_token,
        regions: app.search.regions().to_vec(),
        resource_types: app.search.resource_types().to_vec(),
        region: page.region,
        resource_type: page.resource_type,
        resources: page.resources,
        next_page_href,
    })
}

#[derive(Debug, Deserialize, Validate)]
pub struct DeleteForm {
    #[validate(length(min = 1, max = 255))]
    pub identifier: String,
    #[validate(length(min = 1, max = 64))]
    pub region: String,
    pub csrf_token: String,
}

/// Delete one resource after the CSRF and ownership checks pass.
pub async fn delete_resource(
    State(app): State<AppState>,
    identity: Identity,
    session: Session,
    Form(form): Form<DeleteForm>,
) -> Result<impl IntoResponse, PortalError> {
    let expected: Option<String> = session.get(CSRF_TOKEN_KEY).await?;
    let token_matches = expected
        .map(|expected| bool::from(expected.as_bytes().ct_eq(form.csrf_token.as_bytes())))
        .unwrap_or(false);
    if !token_matches {
        return Err(PortalError::CsrfMismatch);
    }

    form.validate()?;

    let Some(resource) = app
        .search
        .owned_resource(&identity.subject, &form.identifier, &form.region)
        .await?
    else {
        tracing::warn!(
            subject = %identity.subject,
            identifier = %form.identifier,
            "Refusing delete of resource not owned by user"
        );
        return Err(PortalError::NotOwner(form.identifier));
    };

    // The provider's record picks the delete route.
    let status = app
        .deleter
        .terminate(&resource.resource_type, &resource.identifier, &form.region)
        .await?;
    tracing::info!(
        subject = %identity.subject,
        identifier = %resource.identifier,
        resource_type = %resource.resource_type,
        status = status.as_u16(),
        "Delete requested"
    );

    // 2xx bodies are rendered with 200; anything else keeps the provider's status.
    let accepted = status.is_success();
    let response_status = if accepted { StatusCode::OK } else { status };

    Ok((
        response_status,
        DeleteResultTemplate {
            identity,
            identifier: resource.identifier,
            resource_type: resource.resource_type,
            region: form.region,
            status: status.as_u16(),
            accepted,
        },
    ))
}
