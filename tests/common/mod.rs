//! Test utilities: app builder, request builders, cookie and body helpers.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, header};
use axum::response::Response;
use serde_json::Value;
use session_tracker::config::Config;
use session_tracker::profile::memory::InMemoryProfileStore;
use session_tracker::profile::{AnyProfileStore, ProfileStore, UserProfile};
use session_tracker::session::AnyStore;
use session_tracker::session::memory::InMemoryStore;
use session_tracker::{AppState, create_app};
use std::sync::Arc;
use tower::ServiceExt;

/// Build a test app with in-memory session and profile stores.
pub fn build_test_app() -> (axum::Router, Arc<AppState>) {
    build_test_app_with_config(Config::test_default())
}

/// Build a test app with a custom Config.
pub fn build_test_app_with_config(config: Config) -> (axum::Router, Arc<AppState>) {
    build_test_app_with_store(config, AnyStore::Memory(InMemoryStore::new()))
}

/// Build a test app over the given session store.
pub fn build_test_app_with_store(config: Config, store: AnyStore) -> (axum::Router, Arc<AppState>) {
    let state = Arc::new(AppState::new(
        config,
        store,
        AnyProfileStore::Memory(InMemoryProfileStore::new()),
    ));
    let app = create_app(state.clone());
    (app, state)
}

/// Build a request with optional `Cookie` header and JSON body.
pub fn request(method: &str, uri: &str, cookie: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    builder.body(body).unwrap()
}

/// Send a request through the router.
pub async fn send(app: &axum::Router, req: Request<Body>) -> Response {
    app.clone().oneshot(req).await.unwrap()
}

/// The `name=value` pair from the response's `Set-Cookie` for `name`.
pub fn set_cookie_pair(response: &Response, name: &str) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|s| s.split(';').next())
        .find(|pair| pair.starts_with(&format!("{name}=")))
        .map(String::from)
}

/// Full `Set-Cookie` header for `name`, attributes included.
pub fn set_cookie_header(response: &Response, name: &str) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|s| s.starts_with(&format!("{name}=")))
        .map(String::from)
}

/// Read response body as JSON.
pub async fn body_json(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

/// Insert a profile directly, hashing the password with the app's service.
pub async fn seed_profile(state: &AppState, username: &str, email: &str, password: &str) -> UserProfile {
    let digest = state.credentials.hash(password).unwrap();
    let profile = UserProfile::new(username.into(), email.into(), digest);
    assert!(state.profiles.insert(&profile).await.unwrap());
    profile
}

/// POST /session and return the session cookie pair.
pub async fn start_session(app: &axum::Router) -> String {
    let resp = send(app, request("POST", "/api/session", None, None)).await;
    set_cookie_pair(&resp, "tracker_sid").expect("session cookie")
}
