use askama::Template;
use tower_sessions::Session;

use crate::error::PortalError;
use crate::models::identity::{current_identity, Identity};

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub identity: Option<Identity>,
}

pub async fn index(session: Session) -> Result<IndexTemplate, PortalError> {
    let identity = current_identity(&session).await?;
    Ok(IndexTemplate { identity })
}

pub async fn health_check() -> &'static str {
    "OK"
}
