use std::fmt;
use std::sync::Arc;

use tower_cookies::{Cookie, Cookies};

use crate::backend::SessionBackend;
use crate::config::SessionConfig;
use crate::controller::CookieController;
use crate::error::{Error, Result};
use crate::id;
use crate::serializer::{JsonSerializer, SessionSerializer};
use crate::session::Session;

/// Maps between HTTP-level session identity (a cookie) and backend-level
/// session state (a keyed, TTL'd payload).
///
/// The cookie carries only an authenticated session identifier; the value
/// map lives in the backend under `<prefix><identifier>`. Backend
/// unreachability surfaces as an error from every operation — there is no
/// retry, no cache of prior state, and no partial write: a failed save
/// leaves both the backend entry and the client's cookie unchanged.
pub struct SessionStore<C: CookieController> {
    backend: Arc<dyn SessionBackend>,
    serializer: Arc<dyn SessionSerializer>,
    controller: C,
    config: SessionConfig,
}

impl<C: CookieController> Clone for SessionStore<C> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            serializer: self.serializer.clone(),
            controller: self.controller.clone(),
            config: self.config.clone(),
        }
    }
}

impl<C: CookieController> fmt::Debug for SessionStore<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("controller", &self.controller)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(feature = "signed")]
impl SessionStore<crate::SignedCookie> {
    /// A store whose session cookie is signed with `key`.
    pub fn signed(backend: Arc<dyn SessionBackend>, key: crate::Key) -> Self {
        Self::new(backend, crate::SignedCookie::new(key))
    }
}

#[cfg(feature = "private")]
impl SessionStore<crate::PrivateCookie> {
    /// A store whose session cookie is encrypted with `key`.
    pub fn private(backend: Arc<dyn SessionBackend>, key: crate::Key) -> Self {
        Self::new(backend, crate::PrivateCookie::new(key))
    }
}

#[cfg(feature = "dangerous-plaintext")]
impl SessionStore<crate::PlaintextCookie> {
    /// A store whose session cookie is neither signed nor encrypted.
    ///
    /// Only for testing and debugging — see the crate-level security note.
    pub fn dangerous_plaintext(backend: Arc<dyn SessionBackend>) -> Self {
        Self::new(backend, crate::PlaintextCookie)
    }
}

impl<C: CookieController> SessionStore<C> {
    pub fn new(backend: Arc<dyn SessionBackend>, controller: C) -> Self {
        Self {
            backend,
            serializer: Arc::new(JsonSerializer),
            controller,
            config: SessionConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_serializer(mut self, serializer: Arc<dyn SessionSerializer>) -> Self {
        self.serializer = serializer;
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Builds this request's session from the cookie jar.
    ///
    /// Always returns a usable session. The error slot is populated when
    /// something went wrong on the way:
    ///
    /// - no cookie → fresh session, no error;
    /// - cookie fails authentication or carries a malformed identifier →
    ///   fresh session AND [`Error::CookieDecode`];
    /// - authenticated identifier with no backend entry (expired, or never
    ///   written) → `is_new` session keeping the identifier, no error;
    /// - backend failure → fresh session AND [`Error::Backend`];
    /// - stored payload fails to decode → fresh session AND
    ///   [`Error::Deserialize`] — fatal for the request; do not treat the
    ///   session as cleanly new.
    ///
    /// Callers must check both the session and the error.
    pub async fn load_session(&self, cookies: &Cookies) -> (Session, Option<Error>) {
        let max_age = self.config.session_max_age;

        if cookies.get(&self.config.name).is_none() {
            return (Session::fresh(max_age), None);
        }

        let Some(cookie) = self.controller.get(cookies, &self.config.name) else {
            let err = Error::CookieDecode("cookie failed authentication".to_string());
            tracing::warn!(err = %err, "session cookie rejected");
            return (Session::fresh(max_age), Some(err));
        };

        let session_id = cookie.value();
        if !id::is_valid(session_id) {
            let err = Error::CookieDecode("cookie carries a malformed identifier".to_string());
            tracing::warn!(err = %err, "session cookie rejected");
            return (Session::fresh(max_age), Some(err));
        }

        let key = self.config.backend_key(session_id);
        let payload = match self.backend.get(&key).await {
            Ok(payload) => payload,
            Err(err) => return (Session::fresh(max_age), Some(err)),
        };

        match payload {
            None => (Session::unbacked(session_id, max_age), None),
            Some(bytes) => match self.serializer.deserialize(&bytes) {
                Ok(values) => (Session::restored(session_id, values, max_age), None),
                Err(err) => (Session::fresh(max_age), Some(err)),
            },
        }
    }

    /// Persists the session and (re)issues its cookie.
    ///
    /// With `max_age < 0` the backend entry is deleted (idempotently) and a
    /// removal cookie is emitted instead. Otherwise the values are
    /// serialized, size-checked, written with TTL = `max_age` when positive
    /// or the store default when `max_age == 0`, and only after a
    /// successful write is the authenticated cookie added to the jar. Any
    /// failure aborts before the cookie is touched.
    pub async fn save(&self, cookies: &Cookies, session: &mut Session) -> Result<()> {
        if session.max_age() < 0 {
            if !session.id().is_empty() {
                self.backend
                    .delete(&self.config.backend_key(session.id()))
                    .await?;
            }

            let mut cookie = Cookie::new(self.config.name.clone(), "");
            self.config.apply_removal_attributes(&mut cookie);
            self.controller.remove(cookies, cookie);
            return Ok(());
        }

        if session.id().is_empty() {
            session.set_id(id::generate());
        }

        let payload = self.serializer.serialize(session.values())?;
        if self.config.max_payload_bytes != 0 && payload.len() > self.config.max_payload_bytes {
            return Err(Error::SizeLimit {
                size: payload.len(),
                limit: self.config.max_payload_bytes,
            });
        }

        let ttl_seconds = if session.max_age() > 0 {
            session.max_age() as u64
        } else {
            self.config.default_ttl
        };

        self.backend
            .set(&self.config.backend_key(session.id()), &payload, ttl_seconds)
            .await?;

        let cookie = self
            .config
            .build_cookie(session.id().to_string(), session.max_age());
        self.controller.add(cookies, cookie);

        Ok(())
    }
}
