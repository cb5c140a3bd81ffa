//! Request `Content-Type` whitelist.
//!
//! Requests whose media type is not listed get `415 Unsupported Media Type`.
//! Matching ignores case, surrounding whitespace and parameters such as
//! `; charset=utf-8`. A request with no `Content-Type` matches only if the
//! empty string is whitelisted.

use std::collections::HashSet;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::{Request, Response, StatusCode};
use axum::response::IntoResponse;
use tower::{Layer, Service};
use tracing::debug;

/// Lowercased media type without parameters.
pub fn mime_essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

#[derive(Debug, Clone)]
pub struct AllowContentTypeLayer {
    allowed: Arc<HashSet<String>>,
}

impl AllowContentTypeLayer {
    pub fn new<I, T>(content_types: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let allowed = content_types
            .into_iter()
            .map(|c| mime_essence(c.as_ref()))
            .collect();
        Self {
            allowed: Arc::new(allowed),
        }
    }
}

impl<S> Layer<S> for AllowContentTypeLayer {
    type Service = AllowContentTypeService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AllowContentTypeService {
            inner,
            allowed: self.allowed.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AllowContentTypeService<S> {
    inner: S,
    allowed: Arc<HashSet<String>>,
}

impl<S> Service<Request<Body>> for AllowContentTypeService<S>
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
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(mime_essence)
            .unwrap_or_default();

        if self.allowed.contains(&content_type) {
            let mut inner = self.inner.clone();
            return Box::pin(async move { inner.call(req).await });
        }

        debug!(content_type = %content_type, path = %req.uri().path(), "Unsupported content type");
        Box::pin(async { Ok(StatusCode::UNSUPPORTED_MEDIA_TYPE.into_response()) })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::convert::Infallible;

    use tower::ServiceExt;

    use super::*;

    async fn ok(_req: Request<Body>) -> Result<Response<Body>, Infallible> {
        Ok(Response::new(Body::empty()))
    }

    async fn status_for(content_type: Option<&str>) -> StatusCode {
        let mut builder = Request::builder().method("POST").uri("/");
        if let Some(content_type) = content_type {
            builder = builder.header(CONTENT_TYPE, content_type);
        }
        AllowContentTypeLayer::new([" Application/X-WWW-Form-Urlencoded "])
            .layer(tower::service_fn(ok))
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_whitelisted_type_passes() {
        assert_eq!(
            status_for(Some("application/x-www-form-urlencoded")).await,
            StatusCode::OK
        );
        assert_eq!(
            status_for(Some("APPLICATION/x-www-form-urlencoded; charset=UTF-8")).await,
            StatusCode::OK
        );
    }

    #[tokio::test]
    async fn test_other_types_rejected() {
        assert_eq!(
            status_for(Some("application/json")).await,
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
        assert_eq!(
            status_for(Some("multipart/form-data; boundary=x")).await,
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
        assert_eq!(status_for(None).await, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[test]
    fn test_mime_essence() {
        assert_eq!(mime_essence("Text/HTML; charset=utf-8"), "text/html");
        assert_eq!(mime_essence("  "), "");
    }
}
