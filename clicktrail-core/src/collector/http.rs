//! HTTP transport for the collection endpoint
//!
//! Batches are POSTed as a JSON array of events. Each request carries an
//! `X-Batch-Id` derived from the event ids so the backend can drop a batch it
//! has already accepted when a requeued batch is resent.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use sha2::{Digest, Sha256};

use crate::config::TrackingConfig;
use crate::error::{Error, Result};
use crate::types::Event;

use super::transport::{BeaconTransport, Transport};

/// Largest payload the beacon will accept, matching browser beacon limits
pub const MAX_BEACON_BYTES: usize = 64 * 1024;

const BATCH_ID_HEADER: &str = "X-Batch-Id";

/// HTTP client for the collection endpoint
#[derive(Clone)]
pub struct HttpTransport {
    http_client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    /// Create a new transport from configuration
    ///
    /// Returns an error if the endpoint is missing or a header value is invalid.
    pub fn new(config: &TrackingConfig) -> Result<Self> {
        config.validate()?;

        let endpoint = config
            .endpoint
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| Error::Config("tracking.endpoint is required".to_string()))?
            .to_string();

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(api_key) = &config.api_key {
            let auth_value = format!("Bearer {}", api_key);
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&auth_value)
                    .map_err(|e| Error::Config(format!("invalid api_key: {}", e)))?,
            );
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            endpoint,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Check if the endpoint answers at all
    pub async fn health_check(&self) -> Result<bool> {
        match self.http_client.head(&self.endpoint).send().await {
            Ok(response) => Ok(!response.status().is_server_error()),
            Err(_) => Ok(false),
        }
    }

    async fn post(
        client: &reqwest::Client,
        endpoint: &str,
        batch_id: String,
        body: Vec<u8>,
    ) -> Result<()> {
        let response = client
            .post(endpoint)
            .header(BATCH_ID_HEADER, batch_id)
            .body(body)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("HTTP request failed: {}", e)))?;

        let status = response.status();

        if status.is_success() {
            Ok(())
        } else {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            Err(Error::Transport(format!("API error ({}): {}", status, error_text)))
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn deliver(&self, batch: &[Event]) -> Result<()> {
        let body = serde_json::to_vec(batch)?;
        Self::post(&self.http_client, &self.endpoint, batch_id(batch), body).await
    }
}

impl BeaconTransport for HttpTransport {
    fn send_beacon(&self, batch: &[Event]) -> Result<()> {
        let body = serde_json::to_vec(batch)?;
        if body.len() > MAX_BEACON_BYTES {
            return Err(Error::Beacon(format!(
                "payload of {} bytes exceeds beacon limit of {} bytes",
                body.len(),
                MAX_BEACON_BYTES
            )));
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Beacon(format!("no async runtime to schedule send: {}", e)))?;

        let client = self.http_client.clone();
        let endpoint = self.endpoint.clone();
        let id = batch_id(batch);
        let events = batch.len();

        runtime.spawn(async move {
            if let Err(e) = Self::post(&client, &endpoint, id, body).await {
                tracing::debug!(events, error = %e, "Beacon delivery failed");
            }
        });

        Ok(())
    }
}

/// Compute the deduplication id for a batch
///
/// Returns a 32-character hex digest of SHA-256 over the event ids.
pub fn batch_id(batch: &[Event]) -> String {
    let mut hasher = Sha256::new();
    for event in batch {
        hasher.update(event.event_id.as_bytes());
        hasher.update(b"\n");
    }
    let result = hasher.finalize();

    // Take first 16 bytes (32 hex chars)
    hex::encode(&result[..16])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: &str) -> Event {
        Event {
            event_id: id.to_string(),
            user_id: "user_1".to_string(),
            session_id: "session_1".to_string(),
            timestamp: 0,
            event_type: "click".to_string(),
            url: String::new(),
            referrer: None,
            title: None,
            target: None,
            position: None,
            device: None,
            metadata: serde_json::Map::new(),
        }
    }

    fn ready_config() -> TrackingConfig {
        TrackingConfig {
            endpoint: Some("https://telemetry.example.com/api/track".to_string()),
            api_key: Some("ct_live_test".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_transport_requires_endpoint() {
        assert!(HttpTransport::new(&TrackingConfig::default()).is_err());
    }

    #[test]
    fn test_transport_with_valid_config() {
        let transport = HttpTransport::new(&ready_config()).unwrap();
        assert_eq!(transport.endpoint(), "https://telemetry.example.com/api/track");
    }

    #[test]
    fn test_transport_rejects_invalid_api_key() {
        let config = TrackingConfig {
            api_key: Some("bad\nkey".to_string()),
            ..ready_config()
        };
        assert!(matches!(HttpTransport::new(&config), Err(Error::Config(_))));
    }

    #[test]
    fn test_batch_id_depends_on_ids_and_order() {
        let a = batch_id(&[event("evt_a"), event("evt_b")]);
        let b = batch_id(&[event("evt_a"), event("evt_b")]);
        let c = batch_id(&[event("evt_b"), event("evt_a")]);

        assert_eq!(a.len(), 32);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_beacon_outside_runtime_fails() {
        let transport = HttpTransport::new(&ready_config()).unwrap();
        assert!(matches!(
            transport.send_beacon(&[event("evt_a")]),
            Err(Error::Beacon(_))
        ));
    }

    #[tokio::test]
    async fn test_beacon_rejects_oversized_payload() {
        let transport = HttpTransport::new(&ready_config()).unwrap();
        let mut big = event("evt_big");
        big.metadata.insert(
            "blob".to_string(),
            serde_json::Value::String("x".repeat(MAX_BEACON_BYTES)),
        );

        assert!(matches!(transport.send_beacon(&[big]), Err(Error::Beacon(_))));
    }
}
