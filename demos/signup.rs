//! Demo web application: signup/signin/profile/signout flows backed by the
//! session store.
//!
//! Credentials live in a `user:password`-per-line file behind the
//! [`CredentialStore`] trait; they are demo glue and entirely decoupled from
//! the session lifecycle. Request logging goes through `tracing` with
//! per-request fields rather than any process-global buffer.
//!
//! Run against a local Redis:
//!
//! ```text
//! cargo run --example signup --features key-expansion -- --cookie-key <32+ bytes>
//! ```
//!
//! or against a Sentinel deployment with `--sentinel-mode
//! --master-name mymaster --sentinel-addrs redis://10.0.0.1:26379,...`,
//! or with no Redis at all via `--memory-backend`.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use async_trait::async_trait;
use axum::{
    Form, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
};
use clap::Parser;
use serde::{Deserialize, Serialize};

use redis_http_sessions::{
    CookieManagerLayer, Cookies, Error, Key, MemoryBackend, RedisBackend, SentinelBackend,
    Session, SessionBackend, SessionConfig, SessionStore, SignedCookie,
};

#[derive(Parser, Debug)]
#[command(name = "signup", about = "Session store demo web application")]
struct Args {
    /// Resolve the Redis master through Sentinel instead of connecting to a
    /// single instance.
    #[arg(long)]
    sentinel_mode: bool,

    /// Redis address, ignored in sentinel mode.
    #[arg(long, default_value = "redis://127.0.0.1:6379")]
    redis_addr: String,

    /// Redis Sentinel master name.
    #[arg(long, default_value = "mymaster")]
    master_name: String,

    /// Sentinel failover addresses.
    #[arg(long, value_delimiter = ',', default_value = "redis://127.0.0.1:26379")]
    sentinel_addrs: Vec<String>,

    /// Keep sessions in process memory (no Redis required).
    #[arg(long)]
    memory_backend: bool,

    #[arg(long, default_value_t = 8080)]
    port: u16,

    /// Master key material (at least 32 bytes) for the signed session
    /// cookie. A random key is generated when omitted, so sessions will not
    /// survive a restart.
    #[arg(long)]
    cookie_key: Option<String>,

    /// Backend TTL in seconds for sessions saved with `max_age == 0`.
    #[arg(long, default_value_t = 3600)]
    default_ttl: u64,

    #[arg(long, default_value = "session_")]
    key_prefix: String,

    #[arg(long, default_value_t = 4096)]
    max_payload_bytes: usize,

    /// Credential file, one `user:password` per line.
    #[arg(long, default_value = "secret/baseauth.txt")]
    credentials: PathBuf,

    /// Set the Secure flag on session cookies (disable for local HTTP).
    #[arg(long)]
    secure_cookies: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct Person {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct Credentials {
    user: String,
    password: String,
}

#[async_trait]
trait CredentialStore: Send + Sync {
    async fn authenticate(&self, user: &str, password: &str) -> anyhow::Result<bool>;
    /// Returns `false` when the user name is already taken.
    async fn register(&self, user: &str, password: &str) -> anyhow::Result<bool>;
}

/// `user:password` lines in a flat file, in the spirit of the classic
/// basic-auth secret file.
struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    fn new(path: PathBuf) -> Self {
        Self { path }
    }

    async fn lines(&self) -> anyhow::Result<Vec<String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => Ok(contents.lines().map(str::to_string).collect()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(err).context("reading credential file"),
        }
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn authenticate(&self, user: &str, password: &str) -> anyhow::Result<bool> {
        let expected = format!("{user}:{password}");
        Ok(self.lines().await?.iter().any(|line| line == &expected))
    }

    async fn register(&self, user: &str, password: &str) -> anyhow::Result<bool> {
        let prefix = format!("{user}:");
        if self.lines().await?.iter().any(|line| line.starts_with(&prefix)) {
            return Ok(false);
        }

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("creating credential directory")?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .context("opening credential file")?;
        tokio::io::AsyncWriteExt::write_all(&mut file, format!("{user}:{password}\n").as_bytes())
            .await
            .context("appending credential")?;
        Ok(true)
    }
}

#[derive(Clone)]
struct App {
    sessions: SessionStore<SignedCookie>,
    credentials: Arc<FileCredentialStore>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();

    let backend: Arc<dyn SessionBackend> = if args.memory_backend {
        tracing::warn!("using the in-memory backend; sessions die with the process");
        Arc::new(MemoryBackend::new())
    } else if args.sentinel_mode {
        Arc::new(SentinelBackend::connect(
            args.sentinel_addrs.clone(),
            &args.master_name,
        )?)
    } else {
        Arc::new(
            RedisBackend::connect(&args.redis_addr)
                .await
                .context("connecting to redis")?,
        )
    };

    let key = match &args.cookie_key {
        Some(material) => {
            anyhow::ensure!(
                material.len() >= 32,
                "--cookie-key needs at least 32 bytes of material"
            );
            Key::derive_from(material.as_bytes())
        }
        None => {
            tracing::warn!("generated a random cookie key; sessions will not survive a restart");
            Key::generate()
        }
    };

    let config = SessionConfig::default()
        .with_name("session-name")
        .with_secure(args.secure_cookies)
        .with_default_ttl(args.default_ttl)
        .with_key_prefix(args.key_prefix.clone())
        .with_max_payload_bytes(args.max_payload_bytes);

    let app = App {
        sessions: SessionStore::signed(backend, key).with_config(config),
        credentials: Arc::new(FileCredentialStore::new(args.credentials.clone())),
    };

    let router = Router::new()
        .route("/", get(|| async { Redirect::to("/index.html") }))
        .route("/index.html", get(index))
        .route("/signup/{page}", get(signup_form).post(signup_submit))
        .route("/signin/{page}", get(signin_page).post(signin_submit))
        .route("/profile/{page}", get(profile))
        .route("/signout/{page}", get(signout_page).post(signout_submit))
        .layer(CookieManagerLayer::new())
        .with_state(app);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("binding listener")?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, router).await.context("serving")
}

/// Decides what to do with the error slot of `load_session`: an
/// unauthenticated cookie is logged and the fresh session used as-is, while
/// backend and payload failures abort the request.
fn check_load(err: Option<Error>) -> Result<(), Response> {
    match err {
        None => Ok(()),
        Some(Error::CookieDecode(reason)) => {
            tracing::warn!(%reason, "ignoring unauthenticated session cookie");
            Ok(())
        }
        Some(err) => Err(error_page(&err)),
    }
}

fn error_page(err: &dyn std::fmt::Display) -> Response {
    tracing::error!(%err, "request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        page("Something went wrong", &format!("<p>{err}</p>")),
    )
        .into_response()
}

fn page(title: &str, body: &str) -> Html<String> {
    Html(format!(
        "<!doctype html>\n<html><head><title>{title}</title></head>\n\
         <body><h1>{title}</h1>\n{body}\n</body></html>"
    ))
}

fn flash_title(session: &mut Session, fallback: &str) -> String {
    session
        .take_flashes_from("trace")
        .first()
        .and_then(|value| value.as_str().map(str::to_string))
        .unwrap_or_else(|| fallback.to_string())
}

fn signout_form() -> &'static str {
    r#"<form method="post" action="/signout/baseauth"><button>Sign out</button></form>"#
}

fn credentials_form(action: &str, submit: &str) -> String {
    format!(
        r#"<form method="post" action="{action}">
<label>User <input name="user"></label>
<label>Password <input name="password" type="password"></label>
<button>{submit}</button>
</form>"#
    )
}

async fn index(State(app): State<App>, cookies: Cookies) -> Response {
    let (mut session, err) = app.sessions.load_session(&cookies).await;
    if let Err(response) = check_load(err) {
        return response;
    }
    tracing::info!(path = "/index.html", new = session.is_new(), "request");

    let person = match session.get::<Person>("person") {
        Ok(person) => person,
        Err(err) => return error_page(&err),
    };

    let (title, body) = match &person {
        Some(person) => (
            person.name.clone(),
            format!(
                "<p>You are signed in.</p><p><a href=\"/profile/baseauth\">Profile</a></p>{}",
                signout_form()
            ),
        ),
        None => (
            flash_title(&mut session, "Welcome!"),
            "<p><a href=\"/signup/baseauth\">Sign up</a> or \
             <a href=\"/signin/baseauth\">sign in</a>.</p>"
                .to_string(),
        ),
    };

    // Refresh the TTL before the response goes out.
    if let Err(err) = app.sessions.save(&cookies, &mut session).await {
        return error_page(&err);
    }
    page(&title, &body).into_response()
}

async fn signup_form(
    State(app): State<App>,
    Path(page_name): Path<String>,
    cookies: Cookies,
) -> Response {
    let (mut session, err) = app.sessions.load_session(&cookies).await;
    if let Err(response) = check_load(err) {
        return response;
    }
    tracing::info!(path = %format!("/signup/{page_name}"), new = session.is_new(), "request");

    let title = flash_title(&mut session, "Sign up");
    let body = credentials_form("/signup/baseauth", "Sign up");

    if let Err(err) = app.sessions.save(&cookies, &mut session).await {
        return error_page(&err);
    }
    page(&title, &body).into_response()
}

async fn signup_submit(
    State(app): State<App>,
    Path(page_name): Path<String>,
    cookies: Cookies,
    Form(form): Form<Credentials>,
) -> Response {
    let (mut session, err) = app.sessions.load_session(&cookies).await;
    if let Err(response) = check_load(err) {
        return response;
    }
    tracing::info!(path = %format!("/signup/{page_name}"), user = %form.user, "signup");

    if form.user.is_empty() || form.user.contains(':') {
        return flash_and_redirect(&app, &cookies, session, "invalid user name, try another!", "/signup/baseauth").await;
    }

    match app.credentials.register(&form.user, &form.password).await {
        Err(err) => error_page(&err),
        Ok(false) => {
            flash_and_redirect(&app, &cookies, session, "invalid user name, try another!", "/signup/baseauth").await
        }
        Ok(true) => {
            let person = Person {
                id: "staging".to_string(),
                name: form.user.clone(),
            };
            if let Err(err) = session.insert("person", &person) {
                return error_page(&err);
            }
            if let Err(err) = session.add_flash_to("trace", "Welcome aboard!") {
                return error_page(&err);
            }
            if let Err(err) = app.sessions.save(&cookies, &mut session).await {
                return error_page(&err);
            }
            Redirect::to("/profile/baseauth").into_response()
        }
    }
}

async fn signin_page(
    State(app): State<App>,
    Path(page_name): Path<String>,
    cookies: Cookies,
) -> Response {
    if page_name == "redir" {
        return Redirect::to("/profile/baseauth").into_response();
    }

    let (mut session, err) = app.sessions.load_session(&cookies).await;
    if let Err(response) = check_load(err) {
        return response;
    }
    tracing::info!(path = %format!("/signin/{page_name}"), new = session.is_new(), "request");

    let flashes = session.take_flashes_from("trace");
    let person = match session.get::<Person>("person") {
        Ok(person) => person,
        Err(err) => return error_page(&err),
    };

    let title = flashes
        .first()
        .and_then(|value| value.as_str().map(str::to_string))
        .or_else(|| person.map(|person| format!("Are you {}?", person.name)))
        .unwrap_or_else(|| "Sign in".to_string());
    let body = credentials_form("/signin/action", "Sign in");

    if let Err(err) = app.sessions.save(&cookies, &mut session).await {
        return error_page(&err);
    }
    page(&title, &body).into_response()
}

async fn signin_submit(
    State(app): State<App>,
    Path(page_name): Path<String>,
    cookies: Cookies,
    Form(form): Form<Credentials>,
) -> Response {
    if page_name != "action" {
        return StatusCode::NOT_FOUND.into_response();
    }

    let (mut session, err) = app.sessions.load_session(&cookies).await;
    if let Err(response) = check_load(err) {
        return response;
    }
    tracing::info!(path = "/signin/action", user = %form.user, "signin");

    // Signing in as somebody else drops the previous principal.
    match session.get::<Person>("person") {
        Ok(Some(person)) if person.name != form.user => {
            session.remove("person");
        }
        Ok(_) => {}
        Err(err) => return error_page(&err),
    }

    match app.credentials.authenticate(&form.user, &form.password).await {
        Err(err) => error_page(&err),
        Ok(false) => {
            flash_and_redirect(&app, &cookies, session, "Sign in failed, try again!", "/signin/baseauth").await
        }
        Ok(true) => {
            let person = Person {
                id: "staging".to_string(),
                name: form.user.clone(),
            };
            if let Err(err) = session.insert("person", &person) {
                return error_page(&err);
            }
            if let Err(err) = app.sessions.save(&cookies, &mut session).await {
                return error_page(&err);
            }
            Redirect::to("/signin/redir").into_response()
        }
    }
}

async fn profile(
    State(app): State<App>,
    Path(page_name): Path<String>,
    cookies: Cookies,
) -> Response {
    let (mut session, err) = app.sessions.load_session(&cookies).await;
    if let Err(response) = check_load(err) {
        return response;
    }
    tracing::info!(path = %format!("/profile/{page_name}"), new = session.is_new(), "request");

    if session.is_new() {
        // Expired or never signed in; either way there is nothing to show.
        return Redirect::to("/signout/bye").into_response();
    }

    let person = match session.get::<Person>("person") {
        Ok(Some(person)) => person,
        Ok(None) => return Redirect::to("/signout/bye").into_response(),
        Err(err) => return error_page(&err),
    };

    let body = format!("<p>Account: {}</p>{}", person.id, signout_form());
    if let Err(err) = app.sessions.save(&cookies, &mut session).await {
        return error_page(&err);
    }
    page(&person.name, &body).into_response()
}

async fn signout_page(
    State(app): State<App>,
    Path(page_name): Path<String>,
    cookies: Cookies,
) -> Response {
    if page_name != "bye" {
        return StatusCode::NOT_FOUND.into_response();
    }

    let (mut session, err) = app.sessions.load_session(&cookies).await;
    if let Err(response) = check_load(err) {
        return response;
    }

    let title = flash_title(&mut session, "See you!");
    page(&title, "<p><a href=\"/index.html\">Home</a></p>").into_response()
}

async fn signout_submit(
    State(app): State<App>,
    Path(page_name): Path<String>,
    cookies: Cookies,
) -> Response {
    if page_name != "baseauth" {
        return StatusCode::NOT_FOUND.into_response();
    }

    let (mut session, err) = app.sessions.load_session(&cookies).await;
    if let Err(response) = check_load(err) {
        return response;
    }
    tracing::info!(path = "/signout/baseauth", new = session.is_new(), "signout");

    if !session.is_new() {
        session.remove("person");
        // Delete the backend entry and the cookie in one save.
        session.set_max_age(-1);
        if let Err(err) = app.sessions.save(&cookies, &mut session).await {
            return error_page(&err);
        }
    }

    Redirect::to("/signout/bye").into_response()
}

async fn flash_and_redirect(
    app: &App,
    cookies: &Cookies,
    mut session: Session,
    message: &str,
    target: &str,
) -> Response {
    if let Err(err) = session.add_flash_to("trace", message) {
        return error_page(&err);
    }
    if let Err(err) = app.sessions.save(cookies, &mut session).await {
        return error_page(&err);
    }
    Redirect::to(target).into_response()
}
