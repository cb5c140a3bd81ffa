//! Router tests against the in-memory user store.
//!
//! Requests go through the full middleware stack with `oneshot`; cookies are
//! carried by hand between requests.
//!
//! Run with: `cargo test --test router_tests`
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::header::{CONTENT_TYPE, COOKIE, HOST, LOCATION, SET_COOKIE};
use axum::http::{Request, Response, StatusCode};
use tower::ServiceExt;

use portico::auth::SessionBackend;
use portico::auth::password::hash_password;
use portico::db::{MemoryUserStore, NewUser, UserStore};
use portico::{AppState, Config, build_router};

const FORM: &str = "application/x-www-form-urlencoded";
const EMAIL: &str = "ada@example.com";
const PASSWORD: &str = "correct horse";

// =============================================================================
// Helpers
// =============================================================================

struct TestApp {
    router: Router,
    users: MemoryUserStore,
}

impl TestApp {
    async fn new() -> Self {
        Self::with_config(Config::default()).await
    }

    async fn with_config(config: Config) -> Self {
        let users = MemoryUserStore::new();
        users
            .create(NewUser {
                email: EMAIL.to_string(),
                hashed_password: hash_password(PASSWORD).unwrap(),
                first_name: "Ada".to_string(),
                last_name: "Lovelace".to_string(),
            })
            .await
            .unwrap();

        let state =
            AppState::new(Arc::new(users.clone()), SessionBackend::memory(), config).unwrap();
        let router = build_router(state).unwrap();

        Self { router, users }
    }

    async fn send(&self, req: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(req).await.unwrap()
    }

    async fn get(&self, uri: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::get(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    async fn post_form(&self, uri: &str, cookie: Option<&str>, body: String) -> Response<Body> {
        let mut builder = Request::post(uri).header(CONTENT_TYPE, FORM);
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        self.send(builder.body(Body::from(body)).unwrap()).await
    }

    /// Load the login page; returns the session cookie and the CSRF token.
    async fn login_page(&self) -> (String, String) {
        let res = self.get("/auth/login", None).await;
        assert_eq!(res.status(), StatusCode::OK);
        let cookie = session_cookie(&res).expect("login page sets a session cookie");
        let token = csrf_token(&body_text(res).await);
        (cookie, token)
    }

    /// Log in and return the cookie of the authenticated session.
    async fn login(&self) -> String {
        let (cookie, token) = self.login_page().await;
        let res = self
            .post_form("/auth/login", Some(&cookie), login_body(&token, EMAIL, PASSWORD))
            .await;
        assert_eq!(res.status(), StatusCode::FOUND);
        session_cookie(&res).unwrap_or(cookie)
    }
}

fn login_body(token: &str, email: &str, password: &str) -> String {
    serde_urlencoded::to_string([("_csrf", token), ("email", email), ("password", password)])
        .unwrap()
}

fn session_cookie(res: &Response<Body>) -> Option<String> {
    res.headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("session="))
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

fn csrf_token(html: &str) -> String {
    let marker = r#"name="_csrf" value=""#;
    let start = html.find(marker).expect("csrf field in page") + marker.len();
    let end = html[start..].find('"').unwrap();
    html[start..start + end].to_string()
}

async fn body_text(res: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

// =============================================================================
// Login Page
// =============================================================================

#[tokio::test]
async fn test_login_page_renders_form_with_token() {
    let app = TestApp::new().await;
    let res = app.get("/auth/login", None).await;

    assert_eq!(res.status(), StatusCode::OK);
    let cookie = res.headers()[SET_COOKIE].to_str().unwrap().to_string();
    assert!(cookie.starts_with("session="));
    assert!(cookie.contains("HttpOnly"));

    let html = body_text(res).await;
    let token = csrf_token(&html);
    assert_eq!(token.len(), 43);
    assert!(html.contains(&format!(r#"<meta name="csrf-token" content="{token}""#)));
}

#[tokio::test]
async fn test_login_success_redirects_home() {
    let app = TestApp::new().await;
    let cookie = app.login().await;

    let res = app.get("/", Some(&cookie)).await;
    assert_eq!(res.status(), StatusCode::OK);
    let html = body_text(res).await;
    assert!(html.contains("Welcome, Ada Lovelace"));
}

#[tokio::test]
async fn test_login_rotates_session_cookie() {
    let app = TestApp::new().await;
    let (cookie, token) = app.login_page().await;

    let res = app
        .post_form("/auth/login", Some(&cookie), login_body(&token, EMAIL, PASSWORD))
        .await;

    assert_eq!(res.status(), StatusCode::FOUND);
    assert_eq!(res.headers()[LOCATION], "/");
    let rotated = session_cookie(&res).expect("login sets a new cookie");
    assert_ne!(rotated, cookie);
}

#[tokio::test]
async fn test_login_htmx_success_uses_hx_redirect() {
    let app = TestApp::new().await;
    let (cookie, token) = app.login_page().await;

    let req = Request::post("/auth/login")
        .header(CONTENT_TYPE, FORM)
        .header(COOKIE, &cookie)
        .header("HX-Request", "true")
        .body(Body::from(login_body(&token, EMAIL, PASSWORD)))
        .unwrap();
    let res = app.send(req).await;

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["HX-Redirect"], "/");
}

#[tokio::test]
async fn test_login_email_is_case_insensitive() {
    let app = TestApp::new().await;
    let (cookie, token) = app.login_page().await;

    let res = app
        .post_form(
            "/auth/login",
            Some(&cookie),
            login_body(&token, "  ADA@Example.com ", PASSWORD),
        )
        .await;
    assert_eq!(res.status(), StatusCode::FOUND);
}

#[tokio::test]
async fn test_login_wrong_password_rerenders_generic_error() {
    let app = TestApp::new().await;
    let (cookie, token) = app.login_page().await;

    let res = app
        .post_form("/auth/login", Some(&cookie), login_body(&token, EMAIL, "wrong-password"))
        .await;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let html = body_text(res).await;
    assert!(html.contains("Invalid email address or password"));
    assert!(html.contains(&format!(r#"value="{EMAIL}""#)));
    // Same session, same token
    assert_eq!(csrf_token(&html), token);
}

#[tokio::test]
async fn test_login_unknown_and_inactive_users_get_same_error() {
    let app = TestApp::new().await;
    let (cookie, token) = app.login_page().await;

    let unknown = app
        .post_form(
            "/auth/login",
            Some(&cookie),
            login_body(&token, "nobody@example.com", PASSWORD),
        )
        .await;
    assert_eq!(unknown.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let unknown_html = body_text(unknown).await;

    let user = app.users.get_by_email(EMAIL).await.unwrap().unwrap();
    assert!(app.users.set_active(user.id, false).await);

    let inactive = app
        .post_form("/auth/login", Some(&cookie), login_body(&token, EMAIL, PASSWORD))
        .await;
    assert_eq!(inactive.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let inactive_html = body_text(inactive).await;

    assert!(unknown_html.contains("Invalid email address or password"));
    assert!(inactive_html.contains("Invalid email address or password"));
}

// =============================================================================
// CSRF and Content Type
// =============================================================================

#[tokio::test]
async fn test_login_without_csrf_token_is_rejected() {
    let app = TestApp::new().await;
    let (cookie, _) = app.login_page().await;

    let body = serde_urlencoded::to_string([("email", EMAIL), ("password", PASSWORD)]).unwrap();
    let res = app.post_form("/auth/login", Some(&cookie), body).await;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(res).await.contains("CSRF token mismatch"));
}

#[tokio::test]
async fn test_login_with_foreign_csrf_token_is_rejected() {
    let app = TestApp::new().await;
    let (cookie, _) = app.login_page().await;
    let (_, other_token) = app.login_page().await;

    let res = app
        .post_form(
            "/auth/login",
            Some(&cookie),
            login_body(&other_token, EMAIL, PASSWORD),
        )
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_csrf_header_is_accepted() {
    let app = TestApp::new().await;
    let (cookie, token) = app.login_page().await;

    let body = serde_urlencoded::to_string([("email", EMAIL), ("password", PASSWORD)]).unwrap();
    let req = Request::post("/auth/login")
        .header(CONTENT_TYPE, FORM)
        .header(COOKIE, &cookie)
        .header("X-CSRF-Token", &token)
        .body(Body::from(body))
        .unwrap();

    assert_eq!(app.send(req).await.status(), StatusCode::FOUND);
}

#[tokio::test]
async fn test_login_rejects_json_body() {
    let app = TestApp::new().await;
    let req = Request::post("/auth/login")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"email":"ada@example.com"}"#))
        .unwrap();

    assert_eq!(
        app.send(req).await.status(),
        StatusCode::UNSUPPORTED_MEDIA_TYPE
    );
}

// =============================================================================
// Rate Limiting
// =============================================================================

#[tokio::test]
async fn test_login_rate_limited_after_burst() {
    let app = TestApp::new().await;
    let burst = Config::default().rate_limit.login_burst;

    for _ in 0..burst {
        let res = app.post_form("/auth/login", None, String::new()).await;
        assert_ne!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    let res = app.post_form("/auth/login", None, String::new()).await;
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(res.headers().contains_key("Retry-After"));
}

#[tokio::test]
async fn test_login_page_is_not_rate_limited() {
    let app = TestApp::new().await;
    for _ in 0..20 {
        assert_eq!(app.get("/auth/login", None).await.status(), StatusCode::OK);
    }
}

#[tokio::test]
async fn test_rate_limit_disabled() {
    let mut config = Config::default();
    config.rate_limit.login_rps = 0;
    let app = TestApp::with_config(config).await;

    for _ in 0..20 {
        let res = app.post_form("/auth/login", None, String::new()).await;
        assert_ne!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}

// =============================================================================
// Login Gate
// =============================================================================

#[tokio::test]
async fn test_anonymous_home_redirects_to_login() {
    let app = TestApp::new().await;
    let res = app.get("/", None).await;

    assert_eq!(res.status(), StatusCode::FOUND);
    assert_eq!(res.headers()[LOCATION], "/auth/login");
}

#[tokio::test]
async fn test_anonymous_htmx_request_gets_hx_redirect() {
    let app = TestApp::new().await;
    let req = Request::get("/auth/user-menu")
        .header("HX-Request", "true")
        .body(Body::empty())
        .unwrap();
    let res = app.send(req).await;

    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    assert_eq!(res.headers()["HX-Redirect"], "/auth/login");
}

#[tokio::test]
async fn test_user_menu_fragment() {
    let app = TestApp::new().await;
    let cookie = app.login().await;

    let closed = body_text(app.get("/auth/user-menu", Some(&cookie)).await).await;
    assert!(closed.contains("AL"));
    assert!(!closed.contains(EMAIL));

    let open = body_text(app.get("/auth/user-menu?open", Some(&cookie)).await).await;
    assert!(open.contains(EMAIL));
    assert!(open.contains("/auth/logout"));
}

#[tokio::test]
async fn test_logout_ends_session() {
    let app = TestApp::new().await;
    let cookie = app.login().await;

    let res = app.get("/auth/logout", Some(&cookie)).await;
    assert_eq!(res.status(), StatusCode::FOUND);
    assert_eq!(res.headers()[LOCATION], "/auth/login");

    let res = app.get("/", Some(&cookie)).await;
    assert_eq!(res.status(), StatusCode::FOUND);
}

#[tokio::test]
async fn test_deactivated_user_is_logged_out() {
    let app = TestApp::new().await;
    let cookie = app.login().await;

    let user = app.users.get_by_email(EMAIL).await.unwrap().unwrap();
    app.users.set_active(user.id, false).await;

    let res = app.get("/", Some(&cookie)).await;
    assert_eq!(res.status(), StatusCode::FOUND);
}

// =============================================================================
// Assets, Probes and Headers
// =============================================================================

#[tokio::test]
async fn test_ui_css() {
    let app = TestApp::new().await;
    let res = app.get("/ui.css", None).await;

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()[CONTENT_TYPE], "text/css");
    let css = body_text(res).await;
    assert!(css.contains(".ui-button"));
    assert!(css.contains("prefers-color-scheme: dark"));
}

#[tokio::test]
async fn test_health_and_ready() {
    let app = TestApp::new().await;

    let res = app.get("/health", None).await;
    assert_eq!(res.status(), StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body_text(res).await).unwrap();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));

    assert_eq!(app.get("/ready", None).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_security_headers_and_request_id() {
    let app = TestApp::new().await;
    let res = app.get("/health", None).await;

    let headers = res.headers();
    assert_eq!(headers["x-frame-options"], "DENY");
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["content-security-policy"], "default-src 'self'");
    // Plain HTTP never gets HSTS
    assert!(headers.get("strict-transport-security").is_none());
    assert!(headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn test_incoming_request_id_is_kept() {
    let app = TestApp::new().await;
    let req = Request::get("/health")
        .header("x-request-id", "abc-123")
        .body(Body::empty())
        .unwrap();

    assert_eq!(app.send(req).await.headers()["x-request-id"], "abc-123");
}

#[tokio::test]
async fn test_unlisted_host_is_forbidden() {
    let mut config = Config::default();
    config.security.allowed_hosts = vec!["app.example.com".to_string()];
    let app = TestApp::with_config(config).await;

    let req = Request::get("/health")
        .header(HOST, "evil.example.com")
        .body(Body::empty())
        .unwrap();
    assert_eq!(app.send(req).await.status(), StatusCode::FORBIDDEN);

    let req = Request::get("/health")
        .header(HOST, "app.example.com")
        .body(Body::empty())
        .unwrap();
    assert_eq!(app.send(req).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let app = TestApp::new().await;
    assert_eq!(
        app.get("/nope", None).await.status(),
        StatusCode::NOT_FOUND
    );
}
