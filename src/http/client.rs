use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use moka::future::Cache;
use reqwest::{multipart::Form, Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::GatewayConfig;
use crate::gateway::GatewayError;
use crate::observability::gateway_metrics;

/// Rate-limited HTTP client for the DeskFlow API with a short-lived read cache
#[derive(Debug)]
pub struct RateLimitedHttpClient {
    client: Client,
    base_url: String,
    token: Option<String>,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
    cache: Cache<String, serde_json::Value>,
}

impl RateLimitedHttpClient {
    /// Create a new rate-limited HTTP client
    pub fn new(settings: &GatewayConfig) -> Result<Self, GatewayError> {
        let per_second = NonZeroU32::new(settings.rate_limit.requests_per_second)
            .ok_or_else(|| GatewayError::Config("requests_per_second must be at least 1".to_string()))?;
        let burst = NonZeroU32::new(settings.rate_limit.burst_capacity)
            .ok_or_else(|| GatewayError::Config("burst_capacity must be at least 1".to_string()))?;
        let quota = Quota::per_second(per_second).allow_burst(burst);
        let rate_limiter = Arc::new(RateLimiter::direct(quota));

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_seconds))
            .build()?;

        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(Duration::from_secs(settings.cache_ttl_seconds))
            .build();

        info!(base_url = %settings.base_url, "Created DeskFlow HTTP client");

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            token: settings.token.clone(),
            rate_limiter,
            cache,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// GET a JSON resource. Cached reads are served from memory until the TTL
    /// expires or a write to the same ticket invalidates them.
    pub async fn get_json<T>(&self, path: &str, cacheable: bool) -> Result<T, GatewayError>
    where
        T: DeserializeOwned,
    {
        if cacheable {
            if let Some(cached) = self.cache.get(path).await {
                debug!(path, "Cache hit");
                gateway_metrics().record_cache_hit();
                return Ok(serde_json::from_value(cached)?);
            }
            gateway_metrics().record_cache_miss();
        }

        let value = self.execute(self.request(Method::GET, path)).await?;
        if cacheable {
            self.cache.insert(path.to_string(), value.clone()).await;
        }
        Ok(serde_json::from_value(value)?)
    }

    /// GET a JSON resource into the raw `serde_json::Value`
    pub async fn get_value(&self, path: &str) -> Result<serde_json::Value, GatewayError> {
        self.execute(self.request(Method::GET, path)).await
    }

    /// Send a JSON body and decode the JSON answer
    pub async fn send_json<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T, GatewayError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let value = self.execute(self.request(method, path).json(body)).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Send a multipart form and decode the JSON answer
    pub async fn send_multipart<T>(&self, path: &str, form: Form) -> Result<T, GatewayError>
    where
        T: DeserializeOwned,
    {
        let value = self
            .execute(self.request(Method::POST, path).multipart(form))
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn execute(&self, request: RequestBuilder) -> Result<serde_json::Value, GatewayError> {
        self.rate_limiter.until_ready().await;
        gateway_metrics().record_request();

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                gateway_metrics().record_error();
                warn!(error = %e, "Request to DeskFlow failed");
                return Err(e.into());
            }
        };

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            gateway_metrics().record_error();
            let message = server_message(&body);
            warn!(status = status.as_u16(), message = %message, "DeskFlow rejected request");
            return Err(GatewayError::Http {
                status: status.as_u16(),
                message,
            });
        }

        if body.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }

    /// Clear cache (useful for testing or after write operations)
    pub fn clear_cache(&self) {
        self.cache.invalidate_all();
        info!("HTTP client cache cleared");
    }

    /// Invalidate the cached path `prefix` and everything nested below it
    pub async fn invalidate_cache_prefix(&self, prefix: &str) {
        let prefix = prefix.trim_matches('/');
        let nested = format!("{prefix}/");
        let keys_to_remove: Vec<String> = self
            .cache
            .iter()
            .filter(|(key, _)| key.as_str() == prefix || key.starts_with(&nested))
            .map(|(key, _)| key.to_string())
            .collect();

        for key in keys_to_remove {
            self.cache.invalidate(&key).await;
        }

        debug!("Invalidated cache entries under: {}", prefix);
    }
}

/// Extract the user-facing message from an error body.
///
/// The backend answers `{"message": "..."}` or `{"message": ["...", "..."]}`
/// for validation failures; anything else is passed through as text.
fn server_message(body: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(serde_json::Value::Object(map)) => match map.get("message") {
            Some(serde_json::Value::String(message)) => message.clone(),
            Some(serde_json::Value::Array(items)) => items
                .iter()
                .filter_map(|item| item.as_str())
                .collect::<Vec<_>>()
                .join("; "),
            _ => String::new(),
        },
        _ => body.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_message_variants() {
        assert_eq!(server_message(r#"{"message":"Ticket cerrado"}"#), "Ticket cerrado");
        assert_eq!(
            server_message(r#"{"message":["comment required","ticketId invalid"]}"#),
            "comment required; ticketId invalid"
        );
        assert_eq!(server_message(r#"{"error":"x"}"#), "");
        assert_eq!(server_message("Bad Gateway\n"), "Bad Gateway");
    }

    #[tokio::test]
    async fn test_zero_burst_is_a_config_error() {
        let mut settings = crate::config::DeskFlowConfig::default().gateway;
        settings.rate_limit.burst_capacity = 0;
        let err = RateLimitedHttpClient::new(&settings).unwrap_err();
        assert!(matches!(err, GatewayError::Config(_)));
    }

    #[tokio::test]
    async fn test_base_url_is_normalized() {
        let mut settings = crate::config::DeskFlowConfig::default().gateway;
        settings.base_url = "http://localhost:3000/api/".to_string();
        let client = RateLimitedHttpClient::new(&settings).unwrap();
        assert_eq!(client.base_url(), "http://localhost:3000/api");
        assert_eq!(client.url("/tickets/1"), "http://localhost:3000/api/tickets/1");
    }
}
