use std::borrow::Cow;

use time::Duration;
use tower_cookies::Cookie;

use crate::SameSite;

/// Default name of the session cookie.
pub const DEFAULT_COOKIE_NAME: &str = "session";

/// Cookie attributes and store options for a [`SessionStore`](crate::SessionStore).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub(crate) name: Cow<'static, str>,
    pub(crate) path: Cow<'static, str>,
    pub(crate) domain: Option<Cow<'static, str>>,
    pub(crate) http_only: bool,
    pub(crate) same_site: SameSite,
    pub(crate) secure: bool,
    pub(crate) key_prefix: Cow<'static, str>,
    pub(crate) default_ttl: u64,
    pub(crate) max_payload_bytes: usize,
    pub(crate) session_max_age: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_COOKIE_NAME.into(),
            path: "/".into(),
            domain: None,
            http_only: true,
            same_site: SameSite::Strict,
            secure: true,
            key_prefix: "session_".into(),
            default_ttl: 3600,
            max_payload_bytes: 4096,
            session_max_age: 86400 * 30,
        }
    }
}

impl SessionConfig {
    #[must_use]
    pub fn with_name<N: Into<Cow<'static, str>>>(mut self, name: N) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn with_path<P: Into<Cow<'static, str>>>(mut self, path: P) -> Self {
        self.path = path.into();
        self
    }

    #[must_use]
    pub fn with_domain<D: Into<Cow<'static, str>>>(mut self, domain: D) -> Self {
        self.domain = Some(domain.into());
        self
    }

    #[must_use]
    pub fn without_domain(mut self) -> Self {
        self.domain = None;
        self
    }

    #[must_use]
    pub fn with_http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    #[must_use]
    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = same_site;
        self
    }

    #[must_use]
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Namespace prefix for backend keys: entries are stored under
    /// `<prefix><identifier>`.
    #[must_use]
    pub fn with_key_prefix<P: Into<Cow<'static, str>>>(mut self, key_prefix: P) -> Self {
        self.key_prefix = key_prefix.into();
        self
    }

    /// Backend TTL, in seconds, applied to sessions saved with
    /// `max_age == 0`. A session saved this way still expires after this
    /// many seconds of inactivity; `0` here means entries are written
    /// without an expiry.
    #[must_use]
    pub fn with_default_ttl(mut self, default_ttl: u64) -> Self {
        self.default_ttl = default_ttl;
        self
    }

    /// Maximum serialized payload size in bytes. `0` disables the limit;
    /// use with caution.
    #[must_use]
    pub fn with_max_payload_bytes(mut self, max_payload_bytes: usize) -> Self {
        self.max_payload_bytes = max_payload_bytes;
        self
    }

    /// Initial `max_age` for sessions produced by
    /// [`load_session`](crate::SessionStore::load_session).
    #[must_use]
    pub fn with_session_max_age(mut self, session_max_age: i64) -> Self {
        self.session_max_age = session_max_age;
        self
    }

    pub(crate) fn backend_key(&self, id: &str) -> String {
        format!("{}{}", self.key_prefix, id)
    }

    pub(crate) fn build_cookie(&self, value: String, max_age: i64) -> Cookie<'static> {
        let mut cookie_builder = Cookie::build((self.name.clone(), value))
            .http_only(self.http_only)
            .same_site(self.same_site)
            .secure(self.secure)
            .path(self.path.clone());

        // max_age == 0 leaves Max-Age off: the cookie lives for the browser
        // session while the backend entry carries the default TTL.
        if max_age > 0 {
            cookie_builder = cookie_builder.max_age(Duration::seconds(max_age));
        }

        if let Some(domain) = self.domain.clone() {
            cookie_builder = cookie_builder.domain(domain);
        }

        cookie_builder.build()
    }

    pub(crate) fn apply_removal_attributes(&self, cookie: &mut Cookie<'static>) {
        cookie.set_path(self.path.clone());
        if let Some(domain) = self.domain.clone() {
            cookie.set_domain(domain);
        }
    }
}
