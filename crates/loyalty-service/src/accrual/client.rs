//! Accrual service client.

use std::time::Duration;

use loyalty_core::{AccrualSnapshot, LoyaltyError, OrderNumber};
use reqwest::{Client, StatusCode};

use super::types::OrderAccrualResponse;

/// Error type for accrual service calls.
#[derive(Debug, thiserror::Error)]
pub enum AccrualError {
    /// Transport failure or timeout.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a status other than 200, 204 or 429.
    #[error("unexpected accrual status: {status}")]
    UnexpectedStatus {
        /// HTTP status code.
        status: u16,
    },

    /// The 200 body could not be understood.
    #[error("malformed accrual response: {0}")]
    Decode(String),

    /// The service asked us to slow down.
    #[error("accrual service rate limit hit")]
    TooManyRequests {
        /// Delay from the `Retry-After` header, when present.
        retry_after: Option<Duration>,
    },
}

impl From<AccrualError> for LoyaltyError {
    fn from(err: AccrualError) -> Self {
        Self::UpstreamUnavailable(err.to_string())
    }
}

/// Accrual service client.
#[derive(Debug, Clone)]
pub struct AccrualClient {
    client: Client,
    base_url: String,
}

impl AccrualClient {
    /// Create a new accrual client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Accrual service URL (e.g., `"http://localhost:8088"`)
    /// * `timeout` - Upper bound for every request
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, AccrualError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Base URL with any trailing slash removed.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the current accrual state of one order.
    ///
    /// A 204 means the service has no information yet and is reported as a
    /// `NEW` snapshot with zero accrual.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, timeout, any status other than
    /// 200/204, or a body that cannot be decoded.
    pub async fn fetch_status(&self, order: &OrderNumber) -> Result<AccrualSnapshot, AccrualError> {
        let url = format!("{}/api/orders/{}", self.base_url, order);

        let response = self.client.get(&url).send().await?;
        let status = response.status();

        match status {
            StatusCode::OK => {
                let body = response.bytes().await?;
                let parsed: OrderAccrualResponse = serde_json::from_slice(&body)
                    .map_err(|e| AccrualError::Decode(e.to_string()))?;

                if parsed.order != order.as_str() {
                    tracing::warn!(
                        order = %order,
                        reported = %parsed.order,
                        "Accrual service echoed a different order number"
                    );
                }

                parsed
                    .into_snapshot(order.clone())
                    .ok_or_else(|| AccrualError::Decode("negative accrual".into()))
            }
            StatusCode::NO_CONTENT => Ok(AccrualSnapshot::unknown(order.clone())),
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.trim().parse::<u64>().ok())
                    .map(Duration::from_secs);
                Err(AccrualError::TooManyRequests { retry_after })
            }
            other => Err(AccrualError::UnexpectedStatus {
                status: other.as_u16(),
            }),
        }
    }
}
