//! Login, logout and the header user menu.
//!
//! # Endpoints
//!
//! - `GET /auth/login` - Fresh session and the login form
//! - `POST /auth/login` - Verify credentials and start the user session
//! - `GET /auth/logout` - Drop the session and return to the login form
//! - `GET /auth/user-menu` - Header menu fragment, `?open` renders it expanded
//!
//! Every failed login looks the same to the client: `422` and the form with
//! [`LOGIN_ERROR`](crate::templates::LOGIN_ERROR), so responses do not reveal
//! which emails have accounts.

use std::collections::HashMap;

use axum::Form;
use axum::extract::{Query, State};
use axum::http::header::LOCATION;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{error, info, instrument, warn};

use crate::auth::password::verify_password_blocking;
use crate::auth::session::{end_session, start_user_session};
use crate::auth::{AuthUser, ensure_token};
use crate::error::AppResult;
use crate::htmx::{HxResponse, is_htmx_request};
use crate::metrics::{self, LoginOutcome};
use crate::middleware::LOGIN_PATH;
use crate::state::AppState;
use crate::templates::{LoginPage, UserMenu, render};
use crate::validation::{normalize_email, validate_email, validate_password};

/// Where a successful login lands.
const HOME_PATH: &str = "/";

/// Fields of the login form. Missing fields fail validation, not extraction.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Show the login form on a clean session.
#[instrument(skip_all)]
pub async fn login_form(session: Session) -> AppResult<Html<String>> {
    session.clear().await;
    let token = ensure_token(&session).await?;
    render(&LoginPage::new(token.as_str()))
}

/// Check credentials and log the user in.
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> AppResult<Response> {
    let email = normalize_email(&form.email);

    if validate_email(&email).is_err() || validate_password(&form.password).is_err() {
        metrics::record_login_attempt(LoginOutcome::Invalid);
        return login_failed(&session, &form.email).await;
    }

    let user = match state.users.get_by_email(&email).await {
        Ok(user) => user,
        Err(e) => {
            error!(error = %e, "User lookup failed during login");
            metrics::record_login_attempt(LoginOutcome::Error);
            return login_failed(&session, &form.email).await;
        }
    };

    // Unknown emails still pay for a hash verification
    let hashed = user.as_ref().map(|u| u.hashed_password.clone());
    let password_ok = verify_password_blocking(form.password, hashed).await;

    let Some(user) = user.filter(|u| u.is_active && password_ok) else {
        info!("Rejected login attempt");
        metrics::record_login_attempt(LoginOutcome::Rejected);
        return login_failed(&session, &form.email).await;
    };

    if let Err(e) = start_user_session(&session, user.id).await {
        error!(error = %e, user_id = %user.id, "Failed to store user session");
        metrics::record_login_attempt(LoginOutcome::Error);
        return login_failed(&session, &form.email).await;
    }

    info!(user_id = %user.id, "User logged in");
    metrics::record_login_attempt(LoginOutcome::Success);

    if is_htmx_request(&headers) {
        Ok((StatusCode::OK, HxResponse::new().redirect(HOME_PATH)).into_response())
    } else {
        Ok((StatusCode::FOUND, [(LOCATION, HOME_PATH)]).into_response())
    }
}

/// Re-render the form with the generic error.
async fn login_failed(session: &Session, email: &str) -> AppResult<Response> {
    let token = ensure_token(session).await?;
    let page = render(&LoginPage::failed(token.as_str(), email.trim()))?;
    Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response())
}

/// End the session and go back to the login form.
#[instrument(skip_all)]
pub async fn logout(session: Session) -> Response {
    if let Err(e) = end_session(&session).await {
        warn!(error = %e, "Failed to delete session on logout");
    }
    (StatusCode::FOUND, [(LOCATION, LOGIN_PATH)]).into_response()
}

/// The header user menu fragment.
pub async fn user_menu(
    AuthUser(user): AuthUser,
    Query(params): Query<HashMap<String, String>>,
) -> AppResult<Html<String>> {
    render(&UserMenu::new(&user, params.contains_key("open")))
}
