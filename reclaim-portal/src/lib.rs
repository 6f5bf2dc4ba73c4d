pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;
pub mod utils;

use config::ServerSettings;
use services::{authenticator::Authenticator, deleter::Deleter, search::Search};
use std::sync::Arc;

/// Shared, read-only application state.
#[derive(Clone)]
pub struct AppState {
    pub authenticator: Arc<Authenticator>,
    pub search: Arc<Search>,
    pub deleter: Arc<Deleter>,
    pub callback_url: String,
    pub post_logout_url: String,
}

impl AppState {
    pub fn new(
        authenticator: Arc<Authenticator>,
        search: Arc<Search>,
        deleter: Arc<Deleter>,
        server: &ServerSettings,
    ) -> Self {
        Self {
            authenticator,
            search,
            deleter,
            callback_url: server.callback_url(),
            post_logout_url: server.post_logout_url(),
        }
    }
}
