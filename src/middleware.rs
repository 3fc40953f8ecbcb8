//! Cross-cutting request stages composed around the handlers.

use std::any::Any;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::async_trait;
use axum::extract::{ConnectInfo, FromRequestParts, Request, State};
use axum::http::header::{ALLOW, CONTENT_TYPE, RETRY_AFTER};
use axum::http::request::Parts;
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use futures::FutureExt;
use tower_http::request_id::RequestId;

use crate::config::AppConfig;
use crate::envelope::build_error;
use crate::errors::GENERIC_ERROR_MESSAGE;
use crate::services::rate_limit::{Quota, RateLimiter};

pub const X_RATELIMIT_LIMIT: &str = "x-ratelimit-limit";
pub const X_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";

const MSG_NOT_FOUND: &str = "The requested URL was not found on the server. \
    If you entered the URL manually please check your spelling and try again.";
const MSG_METHOD_NOT_ALLOWED: &str = "The method is not allowed for the requested URL.";
const MSG_PAYLOAD_TOO_LARGE: &str = "The data value transmitted exceeds the capacity limit.";

// ---------------------------------------------------------------------------
// Correlation id
// ---------------------------------------------------------------------------

/// Correlation id of the current request.
///
/// Set by `SetRequestIdLayer` (echoing an inbound `X-Request-ID` or minting
/// a UUID). Falls back to a fresh UUID when the layer is absent.
#[derive(Debug, Clone)]
pub struct RequestCorrelation(pub String);

impl RequestCorrelation {
    fn from_parts(extensions: &axum::http::Extensions) -> Self {
        let id = extensions
            .get::<RequestId>()
            .and_then(|id| id.header_value().to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        Self(id)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestCorrelation
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_parts(&parts.extensions))
    }
}

// ---------------------------------------------------------------------------
// Rate limiting
// ---------------------------------------------------------------------------

/// A named quota applied to a group of routes.
#[derive(Debug, Clone)]
pub struct RateLimitPolicy {
    pub limiter: Arc<RateLimiter>,
    pub scope: &'static str,
    pub quota: Quota,
}

impl RateLimitPolicy {
    pub fn new(limiter: &Arc<RateLimiter>, scope: &'static str, quota: Quota) -> Self {
        Self {
            limiter: Arc::clone(limiter),
            scope,
            quota,
        }
    }
}

/// Client address used as the rate-limit key: the last `X-Forwarded-For`
/// hop (the one appended by the fronting proxy), otherwise the peer address.
/// Earlier hops are client-controlled and ignored.
pub fn client_address(req: &Request) -> String {
    if let Some(forwarded) = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.rsplit(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return forwarded.to_string();
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Enforce the policy's quota; rejected requests get a 429 envelope.
pub async fn enforce_rate_limit(
    State(policy): State<RateLimitPolicy>,
    req: Request,
    next: Next,
) -> Response {
    let client = client_address(&req);
    let decision = policy
        .limiter
        .check(policy.scope, &client, policy.quota)
        .await;

    let mut response = if decision.allowed {
        next.run(req).await
    } else {
        let RequestCorrelation(request_id) = RequestCorrelation::from_parts(req.extensions());
        tracing::warn!(
            request_id = %request_id,
            client = %client,
            scope = policy.scope,
            "Rate limit exceeded"
        );
        let mut response = build_error(
            StatusCode::TOO_MANY_REQUESTS,
            &format!("Rate limit exceeded: {}", policy.quota.describe()),
            None,
            &request_id,
        )
        .into_response();
        let retry_after = decision.reset_after.as_secs().max(1);
        response
            .headers_mut()
            .insert(RETRY_AFTER, HeaderValue::from(retry_after));
        response
    };

    let headers = response.headers_mut();
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
    response
}

// ---------------------------------------------------------------------------
// Envelope fallbacks
// ---------------------------------------------------------------------------

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}

/// Turn responses that bypassed the pipeline into envelopes: routing
/// errors (404, 405), oversized bodies (413) and handler panics (500).
pub async fn envelope_fallbacks(
    State(config): State<Arc<AppConfig>>,
    req: Request,
    next: Next,
) -> Response {
    let RequestCorrelation(request_id) = RequestCorrelation::from_parts(req.extensions());
    let path = req.uri().path().to_string();

    let response = match AssertUnwindSafe(next.run(req)).catch_unwind().await {
        Ok(response) => response,
        Err(payload) => {
            let cause = panic_message(payload.as_ref());
            tracing::error!(request_id = %request_id, path = %path, "Unhandled exception: {}", cause);
            let message = if config.is_debug() {
                cause
            } else {
                GENERIC_ERROR_MESSAGE.to_string()
            };
            return build_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                &message,
                None,
                &request_id,
            )
            .into_response();
        }
    };

    let is_json = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"));
    if is_json {
        return response;
    }

    let message = match response.status() {
        StatusCode::NOT_FOUND => MSG_NOT_FOUND,
        StatusCode::METHOD_NOT_ALLOWED => MSG_METHOD_NOT_ALLOWED,
        StatusCode::PAYLOAD_TOO_LARGE => MSG_PAYLOAD_TOO_LARGE,
        _ => return response,
    };

    let allow = response.headers().get(ALLOW).cloned();
    let mut replacement =
        build_error(response.status(), message, None, &request_id).into_response();
    if let Some(allow) = allow {
        replacement.headers_mut().insert(ALLOW, allow);
    }
    replacement
}
