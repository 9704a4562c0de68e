//! Request plumbing shared by the routes: request ids, bearer auth and a
//! per-tenant request budget.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    extract::{Request, State},
    http::{
        header::{AUTHORIZATION, RETRY_AFTER},
        HeaderValue,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use subtle::ConstantTimeEq;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::api::ApiError;

const REQUEST_ID_HEADER: &str = "x-request-id";
const TENANT_ROUTE_PREFIX: &str = "/api/v1/tenants/";
/// Tenant windows kept before expired ones are swept.
const MAX_TRACKED_TENANTS: usize = 1024;

/// Newtype wrapping a request ID string, stored as a request extension.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

impl RequestId {
    fn of(req: &Request) -> String {
        req.extensions()
            .get::<RequestId>()
            .map(|id| id.0.clone())
            .unwrap_or_default()
    }
}

/// API key auth settings used by middleware.
#[derive(Debug, Clone)]
pub struct AuthState {
    api_keys: Arc<Vec<String>>,
    pub enabled: bool,
}

impl AuthState {
    /// Builds auth config from `RECON_API_KEYS` (comma-separated bearer tokens).
    ///
    /// In development, empty/missing keys disable auth for local iteration.
    /// In non-development envs, empty/missing keys fail startup.
    pub fn from_env(is_development: bool) -> anyhow::Result<Self> {
        let raw = std::env::var("RECON_API_KEYS").unwrap_or_default();
        Self::from_keys(&raw, is_development)
    }

    pub fn from_keys(raw: &str, is_development: bool) -> anyhow::Result<Self> {
        let mut keys: Vec<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToOwned::to_owned)
            .collect();
        keys.sort();
        keys.dedup();

        if keys.is_empty() {
            if is_development {
                tracing::warn!(
                    "RECON_API_KEYS not set; bearer auth disabled in development environment"
                );
                return Ok(Self {
                    api_keys: Arc::new(Vec::new()),
                    enabled: false,
                });
            }

            anyhow::bail!(
                "RECON_API_KEYS is required outside development; provide comma-separated bearer tokens"
            );
        }

        Ok(Self {
            api_keys: Arc::new(keys),
            enabled: true,
        })
    }

    /// Compares against every key in constant time per key.
    fn allows(&self, token: &str) -> bool {
        self.api_keys
            .iter()
            .fold(false, |found, key| {
                found | bool::from(key.as_bytes().ct_eq(token.as_bytes()))
            })
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started_at: Instant,
    count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    Allowed,
    Limited { retry_after: Duration },
}

/// Fixed request windows counted separately for each tenant, so one
/// tenant's sync storm cannot lock the others out of the API.
#[derive(Debug, Clone)]
pub struct TenantRateLimit {
    max_requests: u32,
    window: Duration,
    windows: Arc<Mutex<HashMap<String, Window>>>,
}

impl TenantRateLimit {
    #[must_use]
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            windows: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    #[must_use]
    pub fn per_minute(max_requests: u32) -> Self {
        Self::new(max_requests, Duration::from_secs(60))
    }

    async fn admit(&self, tenant: &str, now: Instant) -> Admission {
        let mut windows = self.windows.lock().await;
        if windows.len() >= MAX_TRACKED_TENANTS {
            windows.retain(|_, w| now.saturating_duration_since(w.started_at) < self.window);
        }

        let window = windows.entry(tenant.to_owned()).or_insert(Window {
            started_at: now,
            count: 0,
        });
        if now.saturating_duration_since(window.started_at) >= self.window {
            *window = Window {
                started_at: now,
                count: 0,
            };
        }
        if window.count >= self.max_requests {
            let elapsed = now.saturating_duration_since(window.started_at);
            return Admission::Limited {
                retry_after: self.window.saturating_sub(elapsed),
            };
        }
        window.count += 1;
        Admission::Allowed
    }
}

/// Tenant id from a `/api/v1/tenants/{tenant}/...` path.
fn tenant_of(path: &str) -> Option<&str> {
    path.strip_prefix(TENANT_ROUTE_PREFIX)?
        .split('/')
        .next()
        .filter(|segment| !segment.is_empty())
}

/// Axum middleware that extracts or generates a request ID.
///
/// If the incoming request has an `x-request-id` header, that value is used.
/// Otherwise a new `UUIDv4` is generated. The ID is inserted into request
/// extensions as [`RequestId`] and echoed on the response.
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| Uuid::new_v4().to_string(), String::from);

    req.extensions_mut().insert(RequestId(id.clone()));

    let mut res = next.run(req).await;

    if let Ok(val) = HeaderValue::from_str(&id) {
        res.headers_mut().insert(REQUEST_ID_HEADER, val);
    }

    res
}

/// Middleware enforcing Bearer token auth when enabled.
pub async fn require_bearer_auth(
    State(auth): State<AuthState>,
    req: Request,
    next: Next,
) -> Response {
    if !auth.enabled {
        return next.run(req).await;
    }

    match extract_bearer_token(req.headers().get(AUTHORIZATION)) {
        Some(token) if auth.allows(token) => next.run(req).await,
        _ => ApiError::new(
            RequestId::of(&req),
            "unauthorized",
            "missing or invalid bearer token",
        )
        .into_response(),
    }
}

/// Middleware charging each tenant-scoped request to that tenant's window.
pub async fn enforce_rate_limit(
    State(limit): State<TenantRateLimit>,
    req: Request,
    next: Next,
) -> Response {
    let Some(tenant) = tenant_of(req.uri().path()).map(str::to_owned) else {
        return next.run(req).await;
    };

    match limit.admit(&tenant, Instant::now()).await {
        Admission::Allowed => next.run(req).await,
        Admission::Limited { retry_after } => {
            tracing::warn!(%tenant, "api rate limit exceeded");
            let mut res = ApiError::new(
                RequestId::of(&req),
                "rate_limited",
                "request budget for this tenant is exhausted",
            )
            .into_response();
            res.headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(retry_after.as_secs().max(1)));
            res
        }
    }
}

fn extract_bearer_token(value: Option<&HeaderValue>) -> Option<&str> {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|s| !s.trim().is_empty())
}
