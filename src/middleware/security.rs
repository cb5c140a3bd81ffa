//! Host filtering and browser security headers.
//!
//! Built from the `[security]` config section:
//!
//! | Setting | Effect |
//! |---|---|
//! | `allowed_hosts` | Non-empty list: other `Host` values get `403 Forbidden` |
//! | `sts_seconds` | `Strict-Transport-Security` on HTTPS requests (0 disables) |
//! | `frame_deny` | `X-Frame-Options: DENY` |
//! | `content_type_nosniff` | `X-Content-Type-Options: nosniff` |
//! | `browser_xss_filter` | `X-XSS-Protection: 1; mode=block` |
//! | `content_security_policy` | `Content-Security-Policy` when non-empty |
//!
//! A request counts as HTTPS when its URI scheme is `https` or a proxy set
//! `X-Forwarded-Proto: https`.

use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::header::{
    CONTENT_SECURITY_POLICY, HOST, STRICT_TRANSPORT_SECURITY, X_CONTENT_TYPE_OPTIONS,
    X_FRAME_OPTIONS, X_XSS_PROTECTION,
};
use axum::http::{HeaderName, HeaderValue, Request, Response, StatusCode};
use axum::response::IntoResponse;
use tower::{Layer, Service};
use tracing::{debug, warn};

use crate::config::SecurityConfig;

const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");

/// Precomputed header values.
#[derive(Debug, Default)]
struct SecurityPolicy {
    allowed_hosts: Vec<String>,
    sts: Option<HeaderValue>,
    /// Added to every response.
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl SecurityPolicy {
    fn from_config(config: &SecurityConfig) -> Self {
        let sts = (config.sts_seconds > 0).then(|| {
            let mut value = format!("max-age={}", config.sts_seconds);
            if config.sts_include_subdomains {
                value.push_str("; includeSubDomains");
            }
            value
        });

        let mut headers = Vec::new();
        if config.frame_deny {
            headers.push((X_FRAME_OPTIONS, HeaderValue::from_static("DENY")));
        }
        if config.content_type_nosniff {
            headers.push((X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff")));
        }
        if config.browser_xss_filter {
            headers.push((X_XSS_PROTECTION, HeaderValue::from_static("1; mode=block")));
        }
        if !config.content_security_policy.trim().is_empty() {
            match HeaderValue::from_str(config.content_security_policy.trim()) {
                Ok(value) => headers.push((CONTENT_SECURITY_POLICY, value)),
                Err(e) => warn!(error = %e, "Ignoring invalid Content-Security-Policy value"),
            }
        }

        Self {
            allowed_hosts: config
                .allowed_hosts
                .iter()
                .map(|h| h.trim().to_ascii_lowercase())
                .filter(|h| !h.is_empty())
                .collect(),
            sts: sts.and_then(|v| HeaderValue::from_str(&v).ok()),
            headers,
        }
    }

    fn host_allowed<B>(&self, req: &Request<B>) -> bool {
        if self.allowed_hosts.is_empty() {
            return true;
        }

        let host = req
            .headers()
            .get(HOST)
            .and_then(|value| value.to_str().ok())
            .or_else(|| req.uri().authority().map(|a| a.as_str()))
            .map(|h| h.trim().to_ascii_lowercase());

        host.is_some_and(|host| self.allowed_hosts.contains(&host))
    }
}

fn is_https<B>(req: &Request<B>) -> bool {
    req.uri().scheme_str() == Some("https")
        || req
            .headers()
            .get(X_FORWARDED_PROTO)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|proto| proto.trim().eq_ignore_ascii_case("https"))
}

#[derive(Debug, Clone)]
pub struct SecurityHeadersLayer {
    policy: Arc<SecurityPolicy>,
}

impl SecurityHeadersLayer {
    pub fn new(config: &SecurityConfig) -> Self {
        Self {
            policy: Arc::new(SecurityPolicy::from_config(config)),
        }
    }
}

impl<S> Layer<S> for SecurityHeadersLayer {
    type Service = SecurityHeadersService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SecurityHeadersService {
            inner,
            policy: self.policy.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SecurityHeadersService<S> {
    inner: S,
    policy: Arc<SecurityPolicy>,
}

impl<S> Service<Request<Body>> for SecurityHeadersService<S>
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
        let policy = self.policy.clone();

        if !policy.host_allowed(&req) {
            debug!(host = ?req.headers().get(HOST), "Rejected request for unlisted host");
            return Box::pin(async { Ok((StatusCode::FORBIDDEN, "Bad host").into_response()) });
        }

        let https = is_https(&req);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let mut response = inner.call(req).await?;
            let headers = response.headers_mut();

            for (name, value) in &policy.headers {
                headers.insert(name.clone(), value.clone());
            }
            if https && let Some(sts) = &policy.sts {
                headers.insert(STRICT_TRANSPORT_SECURITY, sts.clone());
            }

            Ok(response)
        })
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

    async fn call(config: &SecurityConfig, req: Request<Body>) -> Response<Body> {
        SecurityHeadersLayer::new(config)
            .layer(tower::service_fn(ok))
            .oneshot(req)
            .await
            .unwrap()
    }

    fn get(headers: &[(&str, &str)]) -> Request<Body> {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_default_headers() {
        let res = call(&SecurityConfig::default(), get(&[("host", "localhost")])).await;

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()[X_FRAME_OPTIONS], "DENY");
        assert_eq!(res.headers()[X_CONTENT_TYPE_OPTIONS], "nosniff");
        assert_eq!(res.headers()[X_XSS_PROTECTION], "1; mode=block");
        assert_eq!(res.headers()[CONTENT_SECURITY_POLICY], "default-src 'self'");
        assert!(res.headers().get(STRICT_TRANSPORT_SECURITY).is_none());
    }

    #[tokio::test]
    async fn test_sts_only_over_https() {
        let config = SecurityConfig {
            sts_seconds: 600,
            sts_include_subdomains: true,
            ..SecurityConfig::default()
        };

        let res = call(&config, get(&[("x-forwarded-proto", "https")])).await;
        assert_eq!(
            res.headers()[STRICT_TRANSPORT_SECURITY],
            "max-age=600; includeSubDomains"
        );

        let res = call(&config, get(&[("x-forwarded-proto", "http")])).await;
        assert!(res.headers().get(STRICT_TRANSPORT_SECURITY).is_none());
    }

    #[tokio::test]
    async fn test_disabled_headers_are_absent() {
        let config = SecurityConfig {
            frame_deny: false,
            content_type_nosniff: false,
            browser_xss_filter: false,
            content_security_policy: String::new(),
            ..SecurityConfig::default()
        };
        let res = call(&config, get(&[])).await;

        assert!(res.headers().get(X_FRAME_OPTIONS).is_none());
        assert!(res.headers().get(X_CONTENT_TYPE_OPTIONS).is_none());
        assert!(res.headers().get(X_XSS_PROTECTION).is_none());
        assert!(res.headers().get(CONTENT_SECURITY_POLICY).is_none());
    }

    #[tokio::test]
    async fn test_allowed_hosts() {
        let config = SecurityConfig {
            allowed_hosts: vec!["example.com".to_string(), "localhost:3000".to_string()],
            ..SecurityConfig::default()
        };

        let res = call(&config, get(&[("host", "Example.com")])).await;
        assert_eq!(res.status(), StatusCode::OK);

        let res = call(&config, get(&[("host", "localhost:3000")])).await;
        assert_eq!(res.status(), StatusCode::OK);

        let res = call(&config, get(&[("host", "evil.test")])).await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);

        let res = call(&config, get(&[])).await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }
}
