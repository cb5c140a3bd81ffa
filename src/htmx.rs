//! HTMX request detection and response headers.
//!
//! HTMX sends `HX-Request: true` on every request it issues and follows
//! `HX-*` response headers instead of HTTP redirects, which it would
//! otherwise swap into the page.

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::response::{IntoResponse, IntoResponseParts, Response, ResponseParts};

pub const HX_REQUEST: HeaderName = HeaderName::from_static("hx-request");
pub const HX_REDIRECT: HeaderName = HeaderName::from_static("hx-redirect");
pub const HX_PUSH_URL: HeaderName = HeaderName::from_static("hx-push-url");
pub const HX_REFRESH: HeaderName = HeaderName::from_static("hx-refresh");
pub const HX_TRIGGER: HeaderName = HeaderName::from_static("hx-trigger");
pub const HX_TRIGGER_AFTER_SETTLE: HeaderName = HeaderName::from_static("hx-trigger-after-settle");
pub const HX_TRIGGER_AFTER_SWAP: HeaderName = HeaderName::from_static("hx-trigger-after-swap");

/// Whether the request was issued by HTMX.
pub fn is_htmx_request(headers: &HeaderMap) -> bool {
    headers
        .get(HX_REQUEST)
        .is_some_and(|value| value.as_bytes().eq_ignore_ascii_case(b"true"))
}

/// HTMX response headers, usable as a response part or, with an empty body,
/// as the whole response:
///
/// ```rust,ignore
/// (StatusCode::OK, HxResponse::new().redirect("/"))
/// (HxResponse::new().trigger("saved"), Html(fragment))
/// ```
///
/// Values that are not valid header values are dropped.
#[derive(Debug, Clone, Default)]
#[must_use]
pub struct HxResponse {
    headers: HeaderMap,
}

impl HxResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Client-side redirect with a full page load.
    pub fn redirect(self, url: &str) -> Self {
        self.with(HX_REDIRECT, url)
    }

    /// Push a URL into the browser history.
    pub fn push_url(self, url: &str) -> Self {
        self.with(HX_PUSH_URL, url)
    }

    /// Ask the client to refresh the whole page.
    pub fn refresh(self) -> Self {
        self.with(HX_REFRESH, "true")
    }

    /// Trigger a client-side event as soon as the response is received.
    pub fn trigger(self, event: &str) -> Self {
        self.with(HX_TRIGGER, event)
    }

    pub fn trigger_after_settle(self, event: &str) -> Self {
        self.with(HX_TRIGGER_AFTER_SETTLE, event)
    }

    pub fn trigger_after_swap(self, event: &str) -> Self {
        self.with(HX_TRIGGER_AFTER_SWAP, event)
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn with(mut self, name: HeaderName, value: &str) -> Self {
        match HeaderValue::from_str(value) {
            Ok(value) => {
                self.headers.insert(name, value);
            }
            Err(_) => {
                tracing::warn!(header = %name, "Dropping HTMX header with invalid value");
            }
        }
        self
    }
}

impl IntoResponseParts for HxResponse {
    type Error = std::convert::Infallible;

    fn into_response_parts(self, mut res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        res.headers_mut().extend(self.headers);
        Ok(res)
    }
}

impl IntoResponse for HxResponse {
    fn into_response(self) -> Response {
        let mut response = ().into_response();
        response.headers_mut().extend(self.headers);
        response
    }
}
