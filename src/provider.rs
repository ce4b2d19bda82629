// Flight-offers provider collaborator
// The flattening core never talks to the network; everything HTTP-shaped
// lives behind the OfferProvider trait and gets injected by the caller.

use crate::offers::{self, Offer};
use crate::wire;
use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;
use serde::Deserialize;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

// Error types for the provider boundary
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("network error: {0}")]
    Network(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("provider returned status {status}: {message}")]
    Status {
        status: u16,
        message: String,
        is_retryable: bool,
    },

    #[error("response decode failed: {0}")]
    Decode(String),
}

impl ProviderError {
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Network(_) => true,
            ProviderError::Status { is_retryable, .. } => *is_retryable,
            _ => false,
        }
    }
}

// One flight-offers search. The currency travels with the query so identical
// routes priced in different currencies never share a cache entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub origin: String,
    pub destination: String,
    pub departure_date: NaiveDate,
    pub adults: u32,
    pub currency: String,
}

impl SearchQuery {
    pub fn cache_key(&self) -> String {
        format!(
            "{}:{}:{}:{}:{}",
            self.origin, self.destination, self.departure_date, self.adults, self.currency
        )
    }
}

// Validated offers plus the count of wire records that failed boundary
// validation; the caller decides whether a non-zero count is worth surfacing.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResponse {
    pub offers: Vec<Offer>,
    pub offers_rejected: usize,
}

#[async_trait]
pub trait OfferProvider: Send + Sync + 'static {
    async fn search_offers(&self, query: &SearchQuery) -> Result<SearchResponse, ProviderError>;
}

// Retry configuration for transient provider failures
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 10000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

// Client configuration. The key and secret arrive from the caller's own
// configuration source and are never persisted here.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_key: String,
    pub api_secret: String,
    pub timeout_ms: u64,
    pub retry: RetryConfig,
}

// Helper to calculate exponential backoff with jitter
pub fn calculate_backoff(retry_attempt: u32, config: &RetryConfig) -> Duration {
    let base_backoff_ms = (config.initial_backoff_ms as f64
        * config.backoff_multiplier.powf(retry_attempt as f64))
    .min(config.max_backoff_ms as f64);

    // Jitter to avoid synchronized retries against a rate-limited provider
    let jitter = rand::random::<f64>() * config.jitter_factor * base_backoff_ms;
    let backoff_ms = base_backoff_ms * (1.0 - config.jitter_factor / 2.0) + jitter;

    Duration::from_millis(backoff_ms as u64)
}

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

// Amadeus-style client: OAuth2 client-credentials token, then GET
// /v2/shopping/flight-offers with the query parameters.
pub struct AmadeusClient {
    config: ClientConfig,
    http: reqwest::Client,
    token: Mutex<Option<CachedToken>>,
}

#[derive(Deserialize)]
struct TokenBody {
    access_token: String,
    expires_in: u64,
}

impl AmadeusClient {
    pub fn new(config: ClientConfig) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|err| ProviderError::Network(err.to_string()))?;
        Ok(Self {
            config,
            http,
            token: Mutex::new(None),
        })
    }

    async fn access_token(&self) -> Result<String, ProviderError> {
        if let Some(cached) = self.token.lock().as_ref() {
            if cached.expires_at > Instant::now() {
                return Ok(cached.access_token.clone());
            }
        }

        let url = format!("{}/v1/security/oauth2/token", self.config.base_url);
        let response = self
            .http
            .post(&url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.config.api_key.as_str()),
                ("client_secret", self.config.api_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|err| ProviderError::Network(err.to_string()))?;

        if !response.status().is_success() {
            return Err(ProviderError::Auth(format!(
                "token endpoint returned {}",
                response.status()
            )));
        }

        let body: TokenBody = response
            .json()
            .await
            .map_err(|err| ProviderError::Decode(err.to_string()))?;

        // Refresh slightly early so an in-flight search never carries a token
        // that expires mid-request
        let expires_at = Instant::now() + Duration::from_secs(body.expires_in.saturating_sub(30));
        *self.token.lock() = Some(CachedToken {
            access_token: body.access_token.clone(),
            expires_at,
        });
        Ok(body.access_token)
    }

    async fn fetch_offers(
        &self,
        query: &SearchQuery,
    ) -> Result<wire::SearchResponseBody, ProviderError> {
        let token = self.access_token().await?;
        let url = format!("{}/v2/shopping/flight-offers", self.config.base_url);
        let params = [
            ("originLocationCode", query.origin.clone()),
            ("destinationLocationCode", query.destination.clone()),
            (
                "departureDate",
                query.departure_date.format("%Y-%m-%d").to_string(),
            ),
            ("adults", query.adults.to_string()),
            ("currencyCode", query.currency.clone()),
        ];

        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .query(&params)
            .send()
            .await
            .map_err(|err| ProviderError::Network(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                message,
                is_retryable: status.as_u16() == 429 || status.is_server_error(),
            });
        }

        response
            .json()
            .await
            .map_err(|err| ProviderError::Decode(err.to_string()))
    }
}

#[async_trait]
impl OfferProvider for AmadeusClient {
    async fn search_offers(&self, query: &SearchQuery) -> Result<SearchResponse, ProviderError> {
        let mut attempt = 0;
        loop {
            match self.fetch_offers(query).await {
                Ok(body) => {
                    let (offers, offers_rejected) = offers::validate_offers(body.data);
                    debug!(
                        origin = %query.origin,
                        destination = %query.destination,
                        offers = offers.len(),
                        rejected = offers_rejected,
                        "flight-offers search complete"
                    );
                    return Ok(SearchResponse {
                        offers,
                        offers_rejected,
                    });
                }
                Err(err) if err.is_retryable() && attempt < self.config.retry.max_retries => {
                    let backoff = calculate_backoff(attempt, &self.config.retry);
                    warn!(
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err,
                        "retrying flight-offers search"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::mock_provider::MockProvider;
    use super::*;
    use crate::offers::{Itinerary, Price, Segment, SegmentPoint};

    fn query() -> SearchQuery {
        SearchQuery {
            origin: "LAX".to_string(),
            destination: "JFK".to_string(),
            departure_date: NaiveDate::from_ymd_opt(2025, 9, 1).expect("valid date"),
            adults: 1,
            currency: "USD".to_string(),
        }
    }

    fn canned_offer() -> Offer {
        Offer {
            price: Price {
                amount: 300.0,
                currency: "USD".to_string(),
            },
            itineraries: vec![Itinerary {
                duration: "PT5H25M".to_string(),
                segments: vec![Segment {
                    carrier_code: "DL".to_string(),
                    flight_number: "423".to_string(),
                    departure: SegmentPoint {
                        iata_code: "LAX".to_string(),
                        at: "2025-09-01T08:00:00".parse().expect("timestamp"),
                    },
                    arrival: SegmentPoint {
                        iata_code: "JFK".to_string(),
                        at: "2025-09-01T16:25:00".parse().expect("timestamp"),
                    },
                }],
            }],
        }
    }

    #[test]
    fn test_cache_key_distinguishes_currency() {
        let usd = query();
        let mut eur = query();
        eur.currency = "EUR".to_string();
        assert_ne!(usd.cache_key(), eur.cache_key());
    }

    #[test]
    fn test_backoff_grows_and_respects_the_cap() {
        let config = RetryConfig::default();
        let first = calculate_backoff(0, &config);
        let fifth = calculate_backoff(4, &config);
        assert!(first < fifth);

        let capped = calculate_backoff(30, &config);
        let ceiling = config.max_backoff_ms as f64 * (1.0 + config.jitter_factor);
        assert!(capped <= Duration::from_millis(ceiling as u64));
    }

    #[tokio::test]
    async fn test_mock_provider_returns_canned_response() {
        let provider = MockProvider::new();
        provider.add_response(
            &query(),
            SearchResponse {
                offers: vec![canned_offer()],
                offers_rejected: 2,
            },
        );

        let response = provider.search_offers(&query()).await.expect("search");
        assert_eq!(response.offers.len(), 1);
        assert_eq!(response.offers_rejected, 2);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_mock_provider_injected_failures_are_typed() {
        let provider = MockProvider::new();
        provider.fail_next_requests(1);

        let err = provider.search_offers(&query()).await.expect_err("fails");
        assert!(err.is_retryable());

        // The failure budget is spent; the next call succeeds
        assert!(provider.search_offers(&query()).await.is_ok());
    }

    #[tokio::test]
    async fn test_search_then_flatten_end_to_end() {
        let provider = MockProvider::new();
        provider.add_response(
            &query(),
            SearchResponse {
                offers: vec![canned_offer()],
                offers_rejected: 0,
            },
        );

        let response = provider.search_offers(&query()).await.expect("search");
        let report = crate::flatten::OfferFlattener::default()
            .flatten(&response.offers, 0)
            .expect("flatten");
        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.rows[0].airlines, "DL 423");
        assert_eq!(report.rows[0].duration.to_string(), "05:25");
    }

    #[tokio::test]
    async fn test_unknown_route_yields_empty_response() {
        let provider = MockProvider::new();
        let response = provider.search_offers(&query()).await.expect("search");
        assert!(response.offers.is_empty());
        assert_eq!(response.offers_rejected, 0);
    }
}
