use axum::response::Html;
use tower_sessions::Session;

use crate::auth::{AuthUser, ensure_token};
use crate::error::AppResult;
use crate::templates::{HomePage, render};

/// Landing page for a logged-in user.
pub async fn home(AuthUser(user): AuthUser, session: Session) -> AppResult<Html<String>> {
    let token = ensure_token(&session).await?;
    render(&HomePage::new(token.as_str(), &user))
}
