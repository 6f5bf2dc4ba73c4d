use axum::{
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use portal_core::middleware::{
    metrics_middleware, request_id_middleware, security_headers_middleware, REQUEST_ID_HEADER,
};
use time::Duration;
use tower_http::trace::TraceLayer;
use tower_sessions::cookie::SameSite;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

use crate::config::ServerSettings;
use crate::handlers::{
    app::{health_check, index},
    auth::{callback, login, logout},
    metrics::metrics,
    resources::{delete_resource, list_resources},
};
use crate::middleware::auth::require_identity;
use crate::AppState;

pub fn build_router(state: AppState, server: &ServerSettings) -> Router {
    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_name(server.session_cookie_name.clone())
        .with_same_site(SameSite::Lax)
        .with_http_only(true)
        .with_secure(server.secure_cookie)
        .with_expiry(Expiry::OnInactivity(Duration::seconds(
            server.session_timeout_seconds,
        )));

    let protected = Router::new()
        .route("/resources", get(list_resources))
        .route("/resources/delete", post(delete_resource))
        .layer(from_fn(require_identity));

    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .route("/login", get(login))
        .route("/callback", get(callback))
        .route("/logout", get(logout))
        .merge(protected)
        .layer(session_layer)
        .layer(from_fn(security_headers_middleware))
        .layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}
