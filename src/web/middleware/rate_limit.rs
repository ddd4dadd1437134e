//! Inbound admission control: a per-IP request quota over the public API.
//!
//! A fixed window per client IP, counted in the shared store so every instance
//! of the service draws from the same budget. This layer is the outermost gate
//! on the `/api/v1` subtree -- it runs before the admin-token check and before
//! any cache or database work.
//!
//! Denials return the fixed 429 body with `RateLimit-*` metadata headers;
//! admitted responses carry the same headers so well-behaved clients can pace
//! themselves. If the shared store is unreachable the limiter fails open and
//! logs -- an unmetered request beats a refused one here; the fail-closed
//! deployment policy is enforced once at startup, not per request.

use crate::kv::{KvStore, WindowCount};
use crate::web::middleware::client_ip;
use axum::body::Body;
use axum::extract::Request;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::Response;
use std::net::IpAddr;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tower::{Layer, Service};
use tracing::warn;

/// Counter keys are namespaced away from the response cache, so a cache sweep
/// can never reset anyone's quota.
const KEY_PREFIX: &str = "rl:";

const DENY_BODY: &str = r#"{"message":"Too many requests from this IP, please try again after 15 minutes.","success":false}"#;

/// Quota configuration plus the store the counters live in.
pub struct RateLimitState {
    kv: KvStore,
    max_requests: u64,
    window: Duration,
}

pub type SharedRateLimitState = Arc<RateLimitState>;

impl RateLimitState {
    pub fn new(kv: KvStore, max_requests: u64, window: Duration) -> Self {
        Self {
            kv,
            max_requests,
            window,
        }
    }

    /// Count this request against the client's window.
    async fn check(&self, ip: IpAddr) -> anyhow::Result<WindowCount> {
        self.kv
            .incr_window(&format!("{KEY_PREFIX}{ip}"), self.window)
            .await
    }
}

#[derive(Clone)]
pub struct RateLimitLayer {
    state: SharedRateLimitState,
}

impl RateLimitLayer {
    pub fn new(state: SharedRateLimitState) -> Self {
        Self { state }
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitService {
            inner,
            state: self.state.clone(),
        }
    }
}

#[derive(Clone)]
pub struct RateLimitService<S> {
    inner: S,
    state: SharedRateLimitState,
}

impl<S, ResBody> Service<Request> for RateLimitService<S>
where
    S: Service<Request, Response = Response<ResBody>> + Send + Clone + 'static,
    S::Future: Send + 'static,
    S::Error: Send,
    ResBody: Send + 'static,
    Body: Into<ResBody>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let state = self.state.clone();
        // Take the service that was polled ready; leave a fresh clone behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        let client_ip = client_ip::resolve(&req);
        let path = req.uri().path().to_string();

        Box::pin(async move {
            let Some(ip) = client_ip else {
                // Cannot determine the client IP -- allow, nothing to key on.
                return inner.call(req).await;
            };

            match state.check(ip).await {
                Ok(window) if window.count <= state.max_requests => {
                    let remaining = state.max_requests - window.count;
                    let mut response = inner.call(req).await?;
                    set_quota_headers(
                        response.headers_mut(),
                        state.max_requests,
                        remaining,
                        window.reset_secs,
                    );
                    Ok(response)
                }
                Ok(window) => {
                    warn!(
                        client_ip = %ip,
                        path = %path,
                        count = window.count,
                        "Rate limit exceeded"
                    );
                    Ok(deny_response(state.max_requests, window).map(Into::into))
                }
                Err(e) => {
                    warn!(error = %e, "Admission control store unavailable, failing open");
                    inner.call(req).await
                }
            }
        })
    }
}

fn set_quota_headers(headers: &mut HeaderMap, limit: u64, remaining: u64, reset_secs: u64) {
    headers.insert("ratelimit-limit", number_header(limit));
    headers.insert("ratelimit-remaining", number_header(remaining));
    headers.insert("ratelimit-reset", number_header(reset_secs));
}

fn number_header(n: u64) -> HeaderValue {
    HeaderValue::from_str(&n.to_string()).unwrap()
}

fn deny_response(limit: u64, window: WindowCount) -> Response<Body> {
    let mut response = Response::new(Body::from(DENY_BODY));
    *response.status_mut() = StatusCode::TOO_MANY_REQUESTS;
    response
        .headers_mut()
        .insert("content-type", HeaderValue::from_static("application/json"));
    response
        .headers_mut()
        .insert("retry-after", number_header(window.reset_secs));
    set_quota_headers(response.headers_mut(), limit, 0, window.reset_secs);
    response
}
