//! HTTP client for the commerce platform's order and payment APIs.

mod orders;
mod payments;

use std::time::Duration;

use recon_core::AppConfig;
use reqwest::header::{ACCEPT, AUTHORIZATION, RETRY_AFTER};
use reqwest::{Client, Method, StatusCode, Url};
use serde_json::Value;

use crate::error::CommerceError;
use crate::retry::retry_with_backoff;

pub use payments::parse_payment_record;

/// Client for one commerce API deployment, shared across tenants.
///
/// Credentials are per call: every request carries the tenant's opaque access
/// token in the `Authorization` header. 401/403 surface as
/// [`CommerceError::Unauthorized`]; 429, 5xx and network failures are retried
/// with jittered exponential back-off up to `max_retries` extra attempts.
pub struct CommerceClient {
    client: Client,
    base_url: Url,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl CommerceClient {
    /// Creates a client against `base_url` with the given timeout,
    /// `User-Agent` and retry policy. `max_retries = 0` disables retries.
    ///
    /// # Errors
    ///
    /// - [`CommerceError::InvalidBaseUrl`] if `base_url` is not an absolute
    ///   http(s) URL.
    /// - [`CommerceError::Http`] if the underlying `reqwest::Client` cannot be
    ///   built.
    pub fn new(
        base_url: &str,
        timeout_secs: u64,
        user_agent: &str,
        max_retries: u32,
        backoff_base_ms: u64,
    ) -> Result<Self, CommerceError> {
        let base_url = parse_base_url(base_url)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            base_url,
            max_retries,
            backoff_base_ms,
        })
    }

    /// # Errors
    ///
    /// See [`CommerceClient::new`].
    pub fn from_config(config: &AppConfig) -> Result<Self, CommerceError> {
        Self::new(
            &config.commerce_base_url,
            config.commerce_request_timeout_secs,
            &config.commerce_user_agent,
            config.commerce_max_retries,
            config.commerce_retry_backoff_base_ms,
        )
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Appends `segments` to the base URL, percent-encoding each one.
    pub(crate) fn endpoint(&self, segments: &[&str]) -> Result<Url, CommerceError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| CommerceError::InvalidBaseUrl {
                base_url: self.base_url.to_string(),
                reason: "URL cannot be a base".to_owned(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Sends one JSON request with retries and maps the response status to
    /// typed errors. An empty body decodes to `Value::Null`.
    pub(crate) async fn send_json(
        &self,
        method: Method,
        url: Url,
        credentials: &str,
        body: Option<&Value>,
        context: &str,
    ) -> Result<Value, CommerceError> {
        retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            let method = method.clone();
            let url = url.clone();
            async move {
                let mut request = self
                    .client
                    .request(method, url.clone())
                    .header(AUTHORIZATION, credentials)
                    .header(ACCEPT, "application/json");
                if let Some(body) = body {
                    request = request.json(body);
                }

                let response = request.send().await?;
                let status = response.status();

                if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                    return Err(CommerceError::Unauthorized {
                        status: status.as_u16(),
                        url: url.to_string(),
                    });
                }

                if status == StatusCode::TOO_MANY_REQUESTS {
                    let retry_after_secs = response
                        .headers()
                        .get(RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|s| s.parse::<u64>().ok())
                        .unwrap_or(60);
                    return Err(CommerceError::RateLimited { retry_after_secs });
                }

                if status == StatusCode::NOT_FOUND {
                    return Err(CommerceError::NotFound {
                        url: url.to_string(),
                    });
                }

                if !status.is_success() {
                    return Err(CommerceError::UnexpectedStatus {
                        status: status.as_u16(),
                        url: url.to_string(),
                    });
                }

                let text = response.text().await?;
                if text.trim().is_empty() {
                    return Ok(Value::Null);
                }
                serde_json::from_str::<Value>(&text).map_err(|e| CommerceError::Deserialize {
                    context: context.to_owned(),
                    source: e,
                })
            }
        })
        .await
    }
}

fn parse_base_url(raw: &str) -> Result<Url, CommerceError> {
    let invalid = |reason: String| CommerceError::InvalidBaseUrl {
        base_url: raw.to_owned(),
        reason,
    };
    let url = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme \"{}\"", url.scheme())));
    }
    if url.cannot_be_a_base() {
        return Err(invalid("URL cannot be a base".to_owned()));
    }
    Ok(url)
}

#[cfg(test)]
#[path = "../client_test.rs"]
mod tests;
