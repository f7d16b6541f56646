//! Batch geocoding HTTP client
//!
//! Uploads a CSV file as a multipart form and returns the raw CSV answer.
//! Consecutive requests are spaced by a minimum interval.

use std::sync::Arc;
use std::time::{Duration, Instant};

use immo_common::config::GeocoderConfig;
use immo_common::{Error, Result};
use reqwest::multipart::{Form, Part};
use tokio::sync::Mutex;
use tracing::debug;

use super::request::DATA_FILE_NAME;

const USER_AGENT: &str = concat!("immotep-etl/", env!("CARGO_PKG_VERSION"));

/// Enforces a minimum delay between requests
struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval_ms: u64) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval: Duration::from_millis(min_interval_ms),
        }
    }

    async fn wait(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                debug!("Rate limiting: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }
}

pub struct GeocodeClient {
    http_client: reqwest::Client,
    endpoint: String,
    columns: Vec<String>,
    rate_limiter: Arc<RateLimiter>,
}

impl GeocodeClient {
    pub fn new(config: &GeocoderConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::http_transport(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint: config.endpoint.clone(),
            columns: config.columns.clone(),
            rate_limiter: Arc::new(RateLimiter::new(config.min_interval_ms)),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Submit one CSV payload and return the response body
    ///
    /// Transport failures and non-2xx statuses are both `Error::Http`.
    pub async fn geocode_csv(&self, payload: Vec<u8>) -> Result<Vec<u8>> {
        self.rate_limiter.wait().await;

        let data = Part::bytes(payload)
            .file_name(DATA_FILE_NAME)
            .mime_str("text/csv")
            .map_err(|e| Error::Internal(e.to_string()))?;

        let mut form = Form::new();
        for column in &self.columns {
            form = form.text("columns", column.clone());
        }
        let form = form.part("data", data);

        debug!(endpoint = %self.endpoint, "Posting geocoding batch");

        let response = self
            .http_client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::http_transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(Error::http_status(status.as_u16(), error_text));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::http_transport(e.to_string()))?;

        Ok(body.to_vec())
    }
}
