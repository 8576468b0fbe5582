#![cfg(feature = "private")]

// Tests for the encrypted (private) cookie controller.
mod common;

use std::sync::Arc;

use axum::{Router, body::Body, extract::State, routing::get};
use http::{Request, header};
use tower::ServiceExt as _;

use redis_http_sessions::{
    CookieManagerLayer, Cookies, Error, Key, MemoryBackend, PrivateCookie, SessionConfig,
    SessionStore,
};

#[derive(Clone)]
struct PrivateState {
    store: SessionStore<PrivateCookie>,
}

fn app() -> Router {
    let key = Key::generate();
    let backend = Arc::new(MemoryBackend::new());
    let store = SessionStore::private(backend, key).with_config(SessionConfig::default());

    Router::new()
        .route("/set-user", get(set_user))
        .route("/get-user", get(get_user))
        .with_state(PrivateState { store })
        .layer(CookieManagerLayer::new())
}

async fn set_user(State(state): State<PrivateState>, cookies: Cookies) -> String {
    let (mut session, err) = state.store.load_session(&cookies).await;
    assert!(err.is_none(), "load_session reports no error");

    session.insert("user", "alice").expect("session insert succeeds");
    state
        .store
        .save(&cookies, &mut session)
        .await
        .expect("session save succeeds");
    session.id().to_string()
}

async fn get_user(State(state): State<PrivateState>, cookies: Cookies) -> String {
    let (session, err) = state.store.load_session(&cookies).await;
    let err = err.map(|err| matches!(err, Error::CookieDecode(_)));
    format!(
        "user={} decode-error={:?}",
        session
            .get::<String>("user")
            .expect("session get succeeds")
            .unwrap_or_else(|| "none".to_string()),
        err
    )
}

#[tokio::test]
async fn private_cookie_round_trips() {
    // Exercise: store a value behind an encrypted cookie, read it back.
    // Expectation: the value round-trips and the cookie value does not
    // contain the identifier in the clear.
    let app = app();

    let req = Request::builder()
        .uri("/set-user")
        .body(Body::empty())
        .expect("request builds successfully");
    let res = app
        .clone()
        .oneshot(req)
        .await
        .expect("service call succeeds");
    let session_cookie = common::get_session_cookie_from_headers(res.headers());
    let id = common::body_string(res.into_body()).await;

    assert!(!session_cookie.value().contains(&id));

    let req = Request::builder()
        .uri("/get-user")
        .header(header::COOKIE, common::cookie_header_value(&session_cookie))
        .body(Body::empty())
        .expect("request builds successfully");
    let res = app.oneshot(req).await.expect("service call succeeds");

    assert_eq!(
        common::body_string(res.into_body()).await,
        "user=alice decode-error=None"
    );
}

#[tokio::test]
async fn private_cookie_rejects_tampering() {
    // Exercise: flip a character of the encrypted cookie value.
    // Expectation: decryption fails, the decode error is reported, and no
    // stored data leaks.
    let app = app();

    let req = Request::builder()
        .uri("/set-user")
        .body(Body::empty())
        .expect("request builds successfully");
    let res = app
        .clone()
        .oneshot(req)
        .await
        .expect("service call succeeds");
    let mut session_cookie = common::get_session_cookie_from_headers(res.headers());

    common::tamper_cookie_value(&mut session_cookie);

    let req = Request::builder()
        .uri("/get-user")
        .header(header::COOKIE, common::cookie_header_value(&session_cookie))
        .body(Body::empty())
        .expect("request builds successfully");
    let res = app.oneshot(req).await.expect("service call succeeds");

    assert_eq!(
        common::body_string(res.into_body()).await,
        "user=none decode-error=Some(true)"
    );
}
