//! Server-rendered pages and fragments.
//!
//! Templates live in `templates/` and are compiled into the binary by askama.

use askama::Template;
use axum::response::Html;

use crate::db::User;
use crate::error::AppResult;

/// Message shown for every failed login, whatever the cause.
pub const LOGIN_ERROR: &str = "Invalid email address or password";

/// Render a template into an HTML response body.
pub fn render<T: Template>(template: &T) -> AppResult<Html<String>> {
    Ok(Html(template.render()?))
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginPage {
    pub csrf_token: String,
    pub error: Option<String>,
    /// Echoed back after a failed attempt; never the password.
    pub email: String,
}

impl LoginPage {
    pub fn new(csrf_token: impl Into<String>) -> Self {
        Self {
            csrf_token: csrf_token.into(),
            error: None,
            email: String::new(),
        }
    }

    pub fn failed(csrf_token: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            csrf_token: csrf_token.into(),
            error: Some(LOGIN_ERROR.to_string()),
            email: email.into(),
        }
    }
}

#[derive(Template)]
#[template(path = "home.html")]
pub struct HomePage {
    pub csrf_token: String,
    pub display_name: String,
    pub email: String,
    pub initials: String,
    /// The header menu starts closed.
    pub open: bool,
}

impl HomePage {
    pub fn new(csrf_token: impl Into<String>, user: &User) -> Self {
        Self {
            csrf_token: csrf_token.into(),
            display_name: user.display_name(),
            email: user.email.clone(),
            initials: user.initials(),
            open: false,
        }
    }
}

/// The header user menu, swapped in place by HTMX.
#[derive(Template)]
#[template(path = "partials/user_menu.html")]
pub struct UserMenu {
    pub open: bool,
    pub email: String,
    pub initials: String,
}

impl UserMenu {
    pub fn new(user: &User, open: bool) -> Self {
        Self {
            open,
            email: user.email.clone(),
            initials: user.initials(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;

    fn user() -> User {
        User {
            id: Uuid::new_v4(),
            email: "ada@example.com".to_string(),
            hashed_password: "x".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_login_page_carries_csrf_token() {
        let html = LoginPage::new("tok-123").render().unwrap();

        assert!(html.contains(r#"name="_csrf" value="tok-123""#));
        assert!(html.contains(r#"<meta name="csrf-token" content="tok-123" />"#));
        assert!(html.contains(r#"href="/ui.css""#));
        assert!(html.contains("/static/js/main.js"));
        assert!(!html.contains(LOGIN_ERROR));
    }

    #[test]
    fn test_failed_login_shows_error_and_escapes_email() {
        let html = LoginPage::failed("t", "<b>@x.io").render().unwrap();

        assert!(html.contains(LOGIN_ERROR));
        assert!(html.contains("&lt;b&gt;@x.io"));
        assert!(!html.contains("<b>@x.io"));
    }

    #[test]
    fn test_home_page() {
        let html = HomePage::new("t", &user()).render().unwrap();

        assert!(html.contains("Welcome, Ada Lovelace"));
        assert!(html.contains(r#"hx-get="/auth/user-menu?open""#));
    }

    #[test]
    fn test_user_menu_open_and_closed() {
        let closed = UserMenu::new(&user(), false).render().unwrap();
        assert!(closed.contains("AL"));
        assert!(!closed.contains("/auth/logout"));

        let open = UserMenu::new(&user(), true).render().unwrap();
        assert!(open.contains(r#"href="/auth/logout""#));
        assert!(open.contains("ada@example.com"));
    }
}
