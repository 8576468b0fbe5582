#![allow(dead_code)]

// Shared helpers for integration tests.
//
// Tests drive the store through an Axum router behind `CookieManagerLayer`,
// so cookies flow exactly as they would between a browser and a real
// application: responses are parsed for `Set-Cookie` and the cookie is sent
// back in a `Cookie` header. Backend state is asserted through a shared
// `MemoryBackend` handle.
#[cfg(feature = "signed")]
use std::sync::Arc;

use axum::body::Body;
#[cfg(feature = "signed")]
use axum::{Router, extract::State, routing::get};
use http::{HeaderMap, header};
use http_body_util::BodyExt as _;
use tower_cookies::Cookie;

use redis_http_sessions::Error;
#[cfg(feature = "signed")]
use redis_http_sessions::{
    CookieManagerLayer, Cookies, Key, MemoryBackend, SessionConfig, SessionStore, SignedCookie,
};

#[cfg(feature = "signed")]
#[derive(Clone)]
pub struct TestState {
    pub store: SessionStore<SignedCookie>,
    pub backend: Arc<MemoryBackend>,
}

#[cfg(feature = "signed")]
pub fn make_state(config: SessionConfig) -> (Key, TestState) {
    let key = Key::generate();
    let backend = Arc::new(MemoryBackend::new());
    let store = SessionStore::signed(backend.clone(), key.clone()).with_config(config);
    (key, TestState { store, backend })
}

/// Router with the routes most tests need, already layered for cookies.
#[cfg(feature = "signed")]
pub fn app(state: TestState) -> Router {
    base_router(state).layer(CookieManagerLayer::new())
}

/// The common routes without the cookie layer, for tests that merge in
/// routes of their own before layering.
#[cfg(feature = "signed")]
pub fn base_router(state: TestState) -> Router {
    Router::new()
        .route("/insert", get(insert))
        .route("/get", get(get_user))
        .route("/status", get(status))
        .route("/signout", get(signout))
        .with_state(state)
}

// Writes a couple of values into the session and returns the assigned id.
#[cfg(feature = "signed")]
async fn insert(State(state): State<TestState>, cookies: Cookies) -> String {
    let (mut session, err) = state.store.load_session(&cookies).await;
    assert!(err.is_none(), "load_session reports no error");

    session.insert("user", "alice").expect("session insert succeeds");
    session.insert("n", 42).expect("session insert succeeds");
    state
        .store
        .save(&cookies, &mut session)
        .await
        .expect("session save succeeds");

    session.id().to_string()
}

// Reads back the stored user. Tolerates a decode error: the returned fresh
// session is still usable and simply holds nothing.
#[cfg(feature = "signed")]
async fn get_user(State(state): State<TestState>, cookies: Cookies) -> String {
    let (session, _err) = state.store.load_session(&cookies).await;
    session
        .get::<String>("user")
        .expect("session get succeeds")
        .unwrap_or_else(|| "none".to_string())
}

// Reports the load outcome without saving, so no cookie is touched.
#[cfg(feature = "signed")]
async fn status(State(state): State<TestState>, cookies: Cookies) -> String {
    let (session, err) = state.store.load_session(&cookies).await;
    format!(
        "new={} err={} id={}",
        session.is_new(),
        err_kind(&err),
        session.id()
    )
}

#[cfg(feature = "signed")]
async fn signout(State(state): State<TestState>, cookies: Cookies) -> String {
    let (mut session, _) = state.store.load_session(&cookies).await;
    session.set_max_age(-1);
    state
        .store
        .save(&cookies, &mut session)
        .await
        .expect("session save succeeds");
    "bye".to_string()
}

pub fn error_kind(err: &Error) -> &'static str {
    match err {
        Error::CookieDecode(_) => "cookie-decode",
        Error::Backend(_) => "backend",
        Error::Serialize(_) => "serialize",
        Error::Deserialize(_) => "deserialize",
        Error::SizeLimit { .. } => "size-limit",
    }
}

pub fn err_kind(err: &Option<Error>) -> &'static str {
    err.as_ref().map_or("none", error_kind)
}

pub async fn body_string(body: Body) -> String {
    // Collect an Axum body into a UTF-8 string for assertions.
    let bytes = body
        .collect()
        .await
        .expect("body collects successfully")
        .to_bytes();
    String::from_utf8_lossy(&bytes).into_owned()
}

pub fn get_session_cookie_from_headers(headers: &HeaderMap) -> Cookie<'static> {
    // Parse the `Set-Cookie` header into a `Cookie` structure.
    let set_cookie = headers
        .get(header::SET_COOKIE)
        .expect("response includes set-cookie header");
    let set_cookie = set_cookie
        .to_str()
        .expect("set-cookie header is valid utf-8");
    Cookie::parse_encoded(set_cookie)
        .expect("set-cookie parses successfully")
        .into_owned()
}

pub fn cookie_header_value(cookie: &Cookie<'_>) -> String {
    // Encode a cookie for use in a `Cookie` request header.
    cookie.encoded().to_string()
}

pub fn tamper_cookie_value(cookie: &mut Cookie<'_>) {
    let mut value = cookie.value().to_string();
    let last = value
        .pop()
        .expect("cookie value has at least one character");
    let replacement = if last == 'A' { 'B' } else { 'A' };
    value.push(replacement);
    cookie.set_value(value);
}
