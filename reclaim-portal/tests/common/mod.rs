//! Test helpers: a mock identity provider, a mock cloud API and a portal
//! router wired to both.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, Response, StatusCode},
    Router,
};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reclaim_portal::config::{OidcSettings, OwnershipSettings, ServerSettings};
use reclaim_portal::services::authenticator::Authenticator;
use reclaim_portal::services::cloud::{
    CloudError, CloudTransport, Credentials, Endpoints, RequestSigner,
};
use reclaim_portal::services::deleter::Deleter;
use reclaim_portal::services::search::Search;
use reclaim_portal::startup::build_router;
use reclaim_portal::AppState;
use secrecy::Secret;
use std::sync::Arc;
use tower::util::ServiceExt;
use wiremock::matchers::{body_string_contains, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Test RSA private key the mock provider signs ID tokens with
pub const TEST_PRIVATE_KEY: &str = include_str!("../fixtures/test_key.pem");

/// A key the provider does not publish
pub const OTHER_PRIVATE_KEY: &str = include_str!("../fixtures/other_key.pem");

/// Base64url modulus of `TEST_PRIVATE_KEY`
pub const TEST_KEY_MODULUS: &str = "qKmXIcel36yBsC1whEJfJ1W9qdL3fUakoBG-8jVreKIThvpv9Wi9pFmr0oAFL40aHGvXwQHB786Xc3xosANvnbF_t5RFTXfxU0Km3J9Sl-ebUSUhfsuUUIUM4s6rQp0_Ghi8scxWZlWCpfAmjvenIpWCWHcXWzgNmYdPrDq8gcAiwRBW8a5UlxJ6xQ09F50iGBufgB9Q03WsaIV4jRxXQO4qNe98tq4RRkDvRbx_IMLbtBKhXpgA2qZ1654HywnaesicI6GPAAMmvm4ueUtvPiBnIuRo6roYvSU14G2i86Zlc4TazqSg8XlGDK8GwR94JxmJAM0yv-ewMqLNKyMngQ";

pub const TEST_KID: &str = "portal-test-key";
pub const CLIENT_ID: &str = "reclaim-portal";
pub const TENANCY: &str = "ocid1.tenancy.oc1..test";
pub const HOME_REGION: &str = "us-ashburn-1";
pub const OTHER_REGION: &str = "eu-frankfurt-1";
pub const TAG_NAMESPACE: &str = "Owner";
pub const TAG_KEY: &str = "Creator";
pub const COOKIE_NAME: &str = "omid";
pub const PUBLIC_URL: &str = "http://portal.test";

/// Sends cloud requests unsigned.
pub struct UnsignedSigner;

#[async_trait]
impl RequestSigner for UnsignedSigner {
    async fn sign(&self, _request: &mut reqwest::Request) -> Result<(), CloudError> {
        Ok(())
    }
}

pub fn jwks() -> serde_json::Value {
    serde_json::json!({
        "keys": [{
            "kty": "RSA",
            "kid": TEST_KID,
            "use": "sig",
            "alg": "RS256",
            "n": TEST_KEY_MODULUS,
            "e": "AQAB"
        }]
    })
}

pub fn mint_token(claims: &serde_json::Value, key_pem: &str, kid: &str) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(kid.to_string());
    encode(
        &header,
        claims,
        &EncodingKey::from_rsa_pem(key_pem.as_bytes()).unwrap(),
    )
    .unwrap()
}

pub fn oidc_settings(idp: &MockServer) -> OidcSettings {
    OidcSettings {
        provider_url: idp.uri(),
        client_id: CLIENT_ID.to_string(),
        client_secret: Secret::new("test-secret".to_string()),
        scope: "openid email".to_string(),
    }
}

pub fn server_settings() -> ServerSettings {
    ServerSettings {
        host: "127.0.0.1".to_string(),
        port: 0,
        public_url: PUBLIC_URL.to_string(),
        session_cookie_name: COOKIE_NAME.to_string(),
        session_timeout_seconds: 900,
        secure_cookie: false,
    }
}

pub fn ownership() -> OwnershipSettings {
    OwnershipSettings {
        tag_namespace: TAG_NAMESPACE.to_string(),
        tag_key: TAG_KEY.to_string(),
    }
}

/// Mount discovery and JWKS on `idp`, advertising `algorithms`.
pub async fn mount_provider(idp: &MockServer, algorithms: &[&str]) {
    Mock::given(method("GET"))
        .and(path("/.well-known/openid-configuration"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "issuer": idp.uri(),
            "authorization_endpoint": format!("{}/oauth2/v1/authorize", idp.uri()),
            "token_endpoint": format!("{}/oauth2/v1/token", idp.uri()),
            "jwks_uri": format!("{}/oauth2/v1/keys", idp.uri()),
            "userinfo_endpoint": format!("{}/oauth2/v1/userinfo", idp.uri()),
            "id_token_signing_alg_values_supported": algorithms,
        })))
        .mount(idp)
        .await;

    Mock::given(method("GET"))
        .and(path("/oauth2/v1/keys"))
        .respond_with(ResponseTemplate::new(200).set_body_json(jwks()))
        .mount(idp)
        .await;
}

pub async fn discover(idp: &MockServer) -> Authenticator {
    Authenticator::discover(
        &oidc_settings(idp),
        format!("{}/callback", PUBLIC_URL),
        reqwest::Client::new(),
    )
    .await
    .unwrap()
}

/// Region subscriptions and a two-page resource type listing.
pub async fn mount_cloud_bootstrap(cloud: &MockServer) {
    Mock::given(method("GET"))
        .and(path(format!(
            "/{}/20160918/tenancies/{}/regionSubscriptions",
            HOME_REGION, TENANCY
        )))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"regionKey": "IAD", "regionName": HOME_REGION, "status": "READY", "isHomeRegion": true},
            {"regionKey": "FRA", "regionName": OTHER_REGION, "status": "READY", "isHomeRegion": false},
            {"regionKey": "NRT", "regionName": "ap-tokyo-1", "status": "IN_PROGRESS", "isHomeRegion": false}
        ])))
        .mount(cloud)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/{}/20180409/resourceTypes", HOME_REGION)))
        .and(query_param_is_missing("page"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("opc-next-page", "types-2")
                .set_body_json(serde_json::json!([
                    {"name": "Instance"}, {"name": "Volume"}, {"name": "Bucket"}
                ])),
        )
        .mount(cloud)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/{}/20180409/resourceTypes", HOME_REGION)))
        .and(query_param("page", "types-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"name": "AutonomousDatabase"}
        ])))
        .mount(cloud)
        .await;
}

pub fn credentials() -> Credentials {
    Credentials {
        tenancy: TENANCY.to_string(),
        region: HOME_REGION.to_string(),
        signer: Arc::new(UnsignedSigner),
    }
}

pub fn transport(cloud: &MockServer) -> CloudTransport {
    CloudTransport::new(
        reqwest::Client::new(),
        Arc::new(UnsignedSigner),
        Endpoints::Override(cloud.uri()),
    )
}

pub fn resource_json(resource_type: &str, identifier: &str, owner: &str) -> serde_json::Value {
    serde_json::json!({
        "resourceType": resource_type,
        "identifier": identifier,
        "displayName": format!("{}-name", identifier),
        "compartmentId": "ocid1.compartment.oc1..test",
        "lifecycleState": "AVAILABLE",
        "timeCreated": "2024-05-01T08:00:00.000Z",
        "definedTags": { TAG_NAMESPACE: { TAG_KEY: owner } }
    })
}

/// Answer searches in `region` whose query text contains `needle`.
pub async fn mount_search(
    cloud: &MockServer,
    region: &str,
    needle: &str,
    items: Vec<serde_json::Value>,
    next_page: Option<&str>,
) {
    let mut response =
        ResponseTemplate::new(200).set_body_json(serde_json::json!({ "items": items }));
    if let Some(next_page) = next_page {
        response = response.insert_header("opc-next-page", next_page);
    }

    Mock::given(method("POST"))
        .and(path(format!("/{}/20180409/resources", region)))
        .and(body_string_contains(needle))
        .respond_with(response)
        .mount(cloud)
        .await;
}

pub struct TestPortal {
    pub idp: MockServer,
    pub cloud: MockServer,
    pub state: AppState,
    pub router: Router,
}

impl TestPortal {
    pub async fn spawn() -> Self {
        let idp = MockServer::start().await;
        let cloud = MockServer::start().await;
        mount_provider(&idp, &["RS256"]).await;
        mount_cloud_bootstrap(&cloud).await;

        let transport = transport(&cloud);
        let search = Search::initialize(&ownership(), &credentials(), &transport)
            .await
            .unwrap();
        let deleter = Deleter::new(&transport, search.regions()).unwrap();
        let authenticator = discover(&idp).await;

        let server = server_settings();
        let state = AppState::new(
            Arc::new(authenticator),
            Arc::new(search),
            Arc::new(deleter),
            &server,
        );
        let router = build_router(state.clone(), &server);

        Self {
            idp,
            cloud,
            state,
            router,
        }
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response<Body> {
        let mut request = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        self.router
            .clone()
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    pub async fn post_form(&self, uri: &str, cookie: &str, form: &[(&str, &str)]) -> Response<Body> {
        let body = serde_urlencoded::to_string(form).unwrap();
        self.router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header(header::COOKIE, cookie)
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    pub fn id_claims(&self, subject: &str, nonce: &str) -> serde_json::Value {
        let now = chrono::Utc::now().timestamp();
        serde_json::json!({
            "iss": self.idp.uri(),
            "aud": CLIENT_ID,
            "sub": subject,
            "nonce": nonce,
            "name": format!("{} Example", subject),
            "email": format!("{}@example.com", subject),
            "iat": now,
            "exp": now + 600,
        })
    }

    /// Serve an ID token for `code` from the token endpoint.
    pub async fn mount_token(&self, code: &str, id_token: &str) {
        Mock::given(method("POST"))
            .and(path("/oauth2/v1/token"))
            .and(body_string_contains(format!("code={}", code)))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": format!("access-{}", code),
                "token_type": "Bearer",
                "expires_in": 3600,
                "id_token": id_token,
            })))
            .mount(&self.idp)
            .await;
    }

    /// Start a login; returns the session cookie and the `(state, nonce)` sent to the provider.
    pub async fn begin_login(&self) -> (String, String, String) {
        let response = self.get("/login", None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let cookie = session_cookie(&response).expect("login sets a session cookie");
        let location = reqwest::Url::parse(location(&response)).unwrap();
        let param = |name: &str| {
            location
                .query_pairs()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.into_owned())
                .unwrap()
        };

        (cookie, param("state"), param("nonce"))
    }

    /// Complete a full login as `subject` and return the authenticated cookie.
    pub async fn sign_in(&self, subject: &str) -> String {
        let (cookie, state, nonce) = self.begin_login().await;
        let code = format!("code-{}", subject);
        let token = mint_token(&self.id_claims(subject, &nonce), TEST_PRIVATE_KEY, TEST_KID);
        self.mount_token(&code, &token).await;

        let response = self
            .get(&format!("/callback?code={}&state={}", code, state), Some(&cookie))
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/resources");

        session_cookie(&response).unwrap_or(cookie)
    }

    /// The CSRF token rendered into the delete forms of `/resources`.
    pub async fn csrf_token(&self, cookie: &str) -> String {
        let response = self.get("/resources", Some(cookie)).await;
        let html = body_text(response).await;
        let marker = "name=\"csrf_token\" value=\"";
        let start = html.find(marker).expect("resources page has a delete form") + marker.len();
        let end = html[start..].find('"').unwrap() + start;
        html[start..end].to_string()
    }
}

pub fn session_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with(&format!("{}=", COOKIE_NAME)))
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

pub fn location(response: &Response<Body>) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
