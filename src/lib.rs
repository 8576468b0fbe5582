//! Redis/Redis-Sentinel backed HTTP session persistence.
//!
//! This crate maps a client-held cookie to session state in an external
//! key-value backend: the cookie carries an authenticated session
//! identifier, the backend holds the serialized value map under a
//! namespaced, TTL'd key. [`SessionStore::load_session`] rebuilds a
//! [`Session`] from an incoming request's cookies; handler logic mutates it;
//! one explicit [`SessionStore::save`] per request persists it, refreshes
//! its TTL, and re-issues the cookie.
//!
//! Backends: [`RedisBackend`] (single instance), [`SentinelBackend`]
//! (master resolved through a Sentinel quorum), and [`MemoryBackend`]
//! (tests and local development). The store treats all of them as one
//! logical endpoint and never retries or caches around failures.
//!
//! # Security
//! The default cookie format is signed (`signed` feature); the `private`
//! feature encrypts the identifier instead.
//!
//! The `dangerous-plaintext` feature enables a plaintext cookie controller.
//! This offers **no tamper resistance** and should only be used for
//! **testing and debugging**. Never enable or use this in a real
//! application: a client can trivially edit the cookie to impersonate other
//! users (including staff/admin).
//!
//! # Concurrency
//! Sessions are per-request objects; the backend is the only shared state.
//! Load → mutate → save is not transactional, so concurrent requests
//! carrying the same identifier race and the last save wins.

mod backend;
mod config;
mod controller;
mod error;
mod id;
mod serializer;
mod session;
mod store;

pub use tower_cookies::cookie::SameSite;
pub use tower_cookies::{CookieManagerLayer, Cookies};

#[cfg(any(feature = "signed", feature = "private"))]
pub use tower_cookies::Key;

pub use crate::backend::{MemoryBackend, RedisBackend, SentinelBackend, SessionBackend};
pub use crate::config::{DEFAULT_COOKIE_NAME, SessionConfig};
pub use crate::controller::CookieController;
pub use crate::error::{Error, Result};
pub use crate::serializer::{JsonSerializer, SessionSerializer};
pub use crate::session::Session;
pub use crate::store::SessionStore;

#[cfg(feature = "signed")]
pub use crate::controller::SignedCookie;

#[cfg(feature = "private")]
pub use crate::controller::PrivateCookie;

#[cfg(feature = "dangerous-plaintext")]
pub use crate::controller::PlaintextCookie;
