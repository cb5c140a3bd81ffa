//! User hydration and the login gate.
//!
//! ```text
//!   session ──► user_id? ──► UserStore::get_by_id ──► active? ──► CurrentUser(Some)
//!                  │ no               │ missing/error       │ no
//!                  ▼                  ▼                     ▼
//!            CurrentUser(None)  CurrentUser(None)     CurrentUser(None)
//! ```
//!
//! [`CurrentUserLayer`] never rejects. [`RequireUserLayer`] short-circuits
//! anonymous requests with a redirect to the login page: `204` plus
//! `HX-Redirect` for HTMX requests, `302 Found` for everything else.

use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::header::LOCATION;
use axum::http::{Request, Response, StatusCode};
use axum::response::IntoResponse;
use tower::{Layer, Service};
use tower_sessions::Session;
use tracing::{debug, warn};

use crate::auth::CurrentUser;
use crate::auth::session::{USER_ID_KEY, session_user_id};
use crate::db::{User, UserStore};
use crate::htmx::{HxResponse, is_htmx_request};
use crate::metrics;

/// Where anonymous users are sent.
pub const LOGIN_PATH: &str = "/auth/login";

/// Ensure the request carries a [`CurrentUser`] extension.
///
/// Runs at most once per request: an existing extension is left alone.
pub async fn hydrate_user<B>(store: &dyn UserStore, req: &mut Request<B>) {
    if req.extensions().get::<CurrentUser>().is_some() {
        return;
    }

    // Cloned so no borrow of the request is held across an await
    let session = req.extensions().get::<Session>().cloned();

    let user = match session {
        Some(session) => load_session_user(store, &session).await,
        None => {
            warn!("No session on request; is the session layer installed?");
            None
        }
    };

    req.extensions_mut().insert(CurrentUser(user));
}

async fn load_session_user(store: &dyn UserStore, session: &Session) -> Option<User> {
    let user_id = match session_user_id(session).await {
        Ok(Some(id)) => id,
        Ok(None) => return None,
        Err(e) => {
            warn!(error = %e, "Failed to read user id from session, continuing anonymously");
            return None;
        }
    };

    match store.get_by_id(user_id).await {
        Ok(Some(user)) if user.is_active => Some(user),
        Ok(found) => {
            debug!(
                user_id = %user_id,
                exists = found.is_some(),
                "Session references a missing or inactive user"
            );
            // Stop looking the stale id up on every request
            if let Err(e) = session.remove::<[u8; 16]>(USER_ID_KEY).await {
                warn!(error = %e, "Failed to drop stale user id from session");
            }
            None
        }
        Err(e) => {
            warn!(user_id = %user_id, error = %e, "User lookup failed, continuing anonymously");
            None
        }
    }
}

// =============================================================================
// CurrentUserLayer
// =============================================================================

/// Attaches [`CurrentUser`] to every request.
#[derive(Clone)]
pub struct CurrentUserLayer {
    store: Arc<dyn UserStore>,
}

impl CurrentUserLayer {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }
}

impl<S> Layer<S> for CurrentUserLayer {
    type Service = CurrentUserService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CurrentUserService {
            inner,
            store: self.store.clone(),
        }
    }
}

#[derive(Clone)]
pub struct CurrentUserService<S> {
    inner: S,
    store: Arc<dyn UserStore>,
}

impl<S> Service<Request<Body>> for CurrentUserService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let store = self.store.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            hydrate_user(store.as_ref(), &mut req).await;
            inner.call(req).await
        })
    }
}

// =============================================================================
// RequireUserLayer
// =============================================================================

/// Lets only requests with an active logged-in user through.
#[derive(Clone)]
pub struct RequireUserLayer {
    store: Arc<dyn UserStore>,
}

impl RequireUserLayer {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }
}

impl<S> Layer<S> for RequireUserLayer {
    type Service = RequireUserService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequireUserService {
            inner,
            store: self.store.clone(),
        }
    }
}

#[derive(Clone)]
pub struct RequireUserService<S> {
    inner: S,
    store: Arc<dyn UserStore>,
}

impl<S> Service<Request<Body>> for RequireUserService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let store = self.store.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            hydrate_user(store.as_ref(), &mut req).await;

            let authenticated = matches!(
                req.extensions().get::<CurrentUser>(),
                Some(CurrentUser(Some(_)))
            );
            if authenticated {
                return inner.call(req).await;
            }

            let htmx = is_htmx_request(req.headers());
            debug!(path = %req.uri().path(), htmx, "Anonymous request, redirecting to login");
            metrics::record_auth_redirect(htmx);

            Ok(login_redirect(htmx))
        })
    }
}

/// Redirect to the login page in the form the client will follow.
pub fn login_redirect(htmx: bool) -> Response<Body> {
    if htmx {
        (StatusCode::NO_CONTENT, HxResponse::new().redirect(LOGIN_PATH)).into_response()
    } else {
        (StatusCode::FOUND, [(LOCATION, LOGIN_PATH)]).into_response()
    }
}
