//! CSRF verification for state-changing requests.
//!
//! Safe methods (GET, HEAD, OPTIONS, TRACE) pass untouched. Anything else
//! must present the session's token, either in the `X-CSRF-Token` header or,
//! for `application/x-www-form-urlencoded` bodies, in the `_csrf` field.
//! Mismatches get `400 Bad Request` with body `CSRF token mismatch`.
//!
//! Reading the form field means buffering the body; it is capped at the
//! configured request body limit and handed on unchanged.

use std::task::{Context, Poll};

use axum::body::{Body, Bytes};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, Method, Request, Response, StatusCode};
use axum::response::IntoResponse;
use tower::{Layer, Service};
use tower_sessions::Session;
use tracing::{error, warn};

use super::content_type::mime_essence;
use crate::auth::csrf::current_token;
use crate::auth::{CSRF_FORM_FIELD, CSRF_HEADER};
use crate::error::AppError;
use crate::metrics;

/// Body returned on verification failure.
pub const CSRF_MISMATCH: &str = "CSRF token mismatch";

const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// Layer enforcing CSRF tokens on unsafe methods.
#[derive(Debug, Clone, Copy)]
pub struct CsrfLayer {
    body_limit: usize,
}

impl CsrfLayer {
    /// `body_limit` caps how much of a form body is buffered to find the token.
    pub fn new(body_limit: usize) -> Self {
        Self { body_limit }
    }
}

impl<S> Layer<S> for CsrfLayer {
    type Service = CsrfService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CsrfService {
            inner,
            body_limit: self.body_limit,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CsrfService<S> {
    inner: S,
    body_limit: usize,
}

impl<S> Service<Request<Body>> for CsrfService<S>
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

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let mut inner = self.inner.clone();
        let body_limit = self.body_limit;

        Box::pin(async move {
            if is_safe_method(req.method()) {
                return inner.call(req).await;
            }

            let Some(session) = req.extensions().get::<Session>().cloned() else {
                error!("CSRF check without a session; is the session layer installed?");
                return Ok(StatusCode::INTERNAL_SERVER_ERROR.into_response());
            };

            let expected = match current_token(&session).await {
                Ok(token) => token,
                Err(e) => return Ok(e.into_response()),
            };

            let (submitted, req) = match submitted_token(req, body_limit).await {
                Ok(found) => found,
                Err(response) => return Ok(response),
            };

            match (expected, submitted) {
                (Some(expected), Some(submitted)) if expected.matches(&submitted) => {
                    inner.call(req).await
                }
                (expected, submitted) => {
                    warn!(
                        path = %req.uri().path(),
                        has_session_token = expected.is_some(),
                        has_submitted_token = submitted.is_some(),
                        "CSRF token mismatch"
                    );
                    metrics::record_csrf_rejection();
                    Ok((StatusCode::BAD_REQUEST, CSRF_MISMATCH).into_response())
                }
            }
        })
    }
}

fn is_safe_method(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE
    )
}

/// Find the submitted token, rebuilding the request if the body was read.
async fn submitted_token(
    req: Request<Body>,
    body_limit: usize,
) -> Result<(Option<String>, Request<Body>), Response<Body>> {
    if let Some(token) = header_token(req.headers()) {
        return Ok((Some(token), req));
    }

    if !is_form(req.headers()) {
        return Ok((None, req));
    }

    let (parts, body) = req.into_parts();
    let bytes = axum::body::to_bytes(body, body_limit).await.map_err(|e| {
        AppError::BadRequest(format!("Could not read request body: {e}")).into_response()
    })?;

    let token = form_token(&bytes);
    Ok((token, Request::from_parts(parts, Body::from(bytes))))
}

fn header_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(CSRF_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| mime_essence(value) == FORM_URLENCODED)
}

fn form_token(body: &Bytes) -> Option<String> {
    serde_urlencoded::from_bytes::<Vec<(String, String)>>(body)
        .ok()?
        .into_iter()
        .find(|(name, _)| name == CSRF_FORM_FIELD)
        .map(|(_, value)| value)
}
