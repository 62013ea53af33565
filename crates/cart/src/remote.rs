//! Remote collaborators: identity endpoint, order service, recovery
//! notifier.
//!
//! The engine depends on the traits; the HTTP clients here are the
//! production implementations. Tests substitute in-process fakes.

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::instrument;

use prickly_pear_core::{AuthToken, Cart, Credentials, CustomerId, Email, ServerSummary};

use crate::config::RemoteConfig;

/// Errors that can occur when talking to a remote collaborator.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The token was rejected.
    #[error("unauthorized")]
    Unauthorized,

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse a response.
    #[error("parse error: {0}")]
    Parse(String),
}

// =============================================================================
// Traits
// =============================================================================

/// Resolves a bearer token to the customer it belongs to.
///
/// Used only at hydration.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Fetch the profile for `token`.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::Unauthorized`] for a rejected token, or
    /// another [`RemoteError`] for transport and decoding failures.
    async fn fetch_profile(&self, token: &AuthToken) -> Result<Credentials, RemoteError>;
}

/// Prices a cart authoritatively.
#[async_trait]
pub trait SummaryService: Send + Sync {
    /// Ask the order service for authoritative totals.
    ///
    /// # Errors
    ///
    /// Returns a [`RemoteError`] on transport or decoding failure; the
    /// caller falls back to the local computation.
    async fn price_cart(&self, cart: &Cart) -> Result<ServerSummary, RemoteError>;
}

/// Receives abandoned-cart events for recovery outreach.
///
/// Fire-and-forget from the engine's perspective: failures are logged by
/// the caller and never affect cart state.
#[async_trait]
pub trait RecoveryNotifier: Send + Sync {
    /// Report that the cart keyed by `identity_key` was abandoned.
    ///
    /// # Errors
    ///
    /// Returns a [`RemoteError`] on transport failure.
    async fn cart_abandoned(&self, identity_key: &str, cart: &Cart) -> Result<(), RemoteError>;
}

// =============================================================================
// HTTP implementations
// =============================================================================

fn api_headers(config: &RemoteConfig) -> Result<HeaderMap, RemoteError> {
    let mut headers = HeaderMap::new();
    let auth_value = format!("Bearer {}", config.api_token.expose_secret());
    headers.insert(
        "Authorization",
        HeaderValue::from_str(&auth_value)
            .map_err(|e| RemoteError::Parse(format!("invalid API token format: {e}")))?,
    );
    headers.insert("Content-Type", HeaderValue::from_static("application/json"));
    Ok(headers)
}

fn endpoint(base: &url::Url, path: &str) -> String {
    format!("{}/{path}", base.as_str().trim_end_matches('/'))
}

/// HTTP client for the remote identity endpoint.
#[derive(Clone)]
pub struct IdentityClient {
    client: reqwest::Client,
    endpoint: String,
}

/// Wire shape of the identity endpoint's profile response.
#[derive(Debug, Deserialize)]
struct ProfileResponse {
    id: String,
    email: String,
}

impl IdentityClient {
    /// Create a new identity client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(config: &RemoteConfig) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            endpoint: endpoint(&config.identity_url, "customer/me"),
        })
    }
}

#[async_trait]
impl IdentityProvider for IdentityClient {
    #[instrument(skip(self, token))]
    async fn fetch_profile(&self, token: &AuthToken) -> Result<Credentials, RemoteError> {
        let response = self
            .client
            .get(&self.endpoint)
            .bearer_auth(token.expose())
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(RemoteError::Unauthorized);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RemoteError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let profile: ProfileResponse = response
            .json()
            .await
            .map_err(|e| RemoteError::Parse(e.to_string()))?;

        Ok(Credentials {
            customer_id: CustomerId::new(profile.id),
            email: Email::parse(&profile.email).map_err(|e| RemoteError::Parse(e.to_string()))?,
            token: token.clone(),
        })
    }
}

/// HTTP client for the remote order/discount service.
#[derive(Clone)]
pub struct OrderServiceClient {
    client: reqwest::Client,
    endpoint: String,
}

impl OrderServiceClient {
    /// Create a new order service client.
    ///
    /// # Errors
    ///
    /// Returns an error if the API token is not a valid header value or
    /// the HTTP client fails to build.
    pub fn new(config: &RemoteConfig) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .default_headers(api_headers(config)?)
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint(&config.orders_url, "carts/price"),
        })
    }
}

#[async_trait]
impl SummaryService for OrderServiceClient {
    #[instrument(skip(self, cart), fields(items = cart.items.len()))]
    async fn price_cart(&self, cart: &Cart) -> Result<ServerSummary, RemoteError> {
        let response = self.client.post(&self.endpoint).json(cart).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RemoteError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| RemoteError::Parse(e.to_string()))
    }
}

/// HTTP client for the recovery notifier.
#[derive(Clone)]
pub struct HttpRecoveryNotifier {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpRecoveryNotifier {
    /// Create a new recovery notifier client.
    ///
    /// # Errors
    ///
    /// Returns an error if the API token is not a valid header value or
    /// the HTTP client fails to build.
    pub fn new(config: &RemoteConfig, recovery_url: &url::Url) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .default_headers(api_headers(config)?)
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint(recovery_url, "events/cart-abandoned"),
        })
    }
}

#[async_trait]
impl RecoveryNotifier for HttpRecoveryNotifier {
    #[instrument(skip(self, cart), fields(items = cart.items.len()))]
    async fn cart_abandoned(&self, identity_key: &str, cart: &Cart) -> Result<(), RemoteError> {
        let body = serde_json::json!({
            "identity_key": identity_key,
            "cart": cart,
        });

        let response = self.client.post(&self.endpoint).json(&body).send().await?;

        let status = response.status();
        // 202 Accepted is the expected response for event ingestion.
        if !status.is_success() && status.as_u16() != 202 {
            let message = response.text().await.unwrap_or_default();
            return Err(RemoteError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(())
    }
}
