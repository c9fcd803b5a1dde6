use crate::api::{Exchange, ExchangeError};
use crate::models::{ExchangeInfo, OrderAck, OrderRequest};
use chrono::Utc;
use governor::{Quota, RateLimiter};
use hmac::{Hmac, Mac};
use reqwest::{Client, Method, RequestBuilder};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use sha2::Sha256;
use std::fmt;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

// USDⓈ-M futures REST endpoints
const PRODUCTION_API_BASE: &str = "https://fapi.binance.com";
const TESTNET_API_BASE: &str = "https://testnet.binancefuture.com";

const RECV_WINDOW_MS: u64 = 5000;
const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 500;
const REQUESTS_PER_SECOND: NonZeroU32 = match NonZeroU32::new(10) {
    Some(n) => n,
    None => panic!("rate limit must be non-zero"),
};

type HmacSha256 = Hmac<Sha256>;

type BinanceRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Which Binance deployment to talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BinanceEnvironment {
    #[default]
    Testnet,
    Production,
}

impl BinanceEnvironment {
    pub fn base_url(&self) -> &'static str {
        match self {
            BinanceEnvironment::Testnet => TESTNET_API_BASE,
            BinanceEnvironment::Production => PRODUCTION_API_BASE,
        }
    }
}

/// API key pair for signed endpoints
#[derive(Clone)]
pub struct Credentials {
    api_key: String,
    api_secret: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    /// Read `BINANCE_API_KEY` / `BINANCE_API_SECRET` from the environment
    pub fn from_env() -> Result<Self, ExchangeError> {
        let api_key = std::env::var("BINANCE_API_KEY")
            .map_err(|_| ExchangeError::Config("BINANCE_API_KEY not set".to_string()))?;
        let api_secret = std::env::var("BINANCE_API_SECRET")
            .map_err(|_| ExchangeError::Config("BINANCE_API_SECRET not set".to_string()))?;

        if api_key.trim().is_empty() || api_secret.trim().is_empty() {
            return Err(ExchangeError::Config(
                "Binance credentials must not be empty".to_string(),
            ));
        }

        Ok(Self::new(api_key, api_secret))
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Lowercase hex HMAC-SHA256 of `payload` keyed with the secret
    pub fn sign(&self, payload: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(self.api_secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(payload.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TickerPrice {
    #[serde(with = "rust_decimal::serde::str")]
    price: Decimal,
}

#[derive(Debug, Deserialize)]
struct AccountInfo {
    #[serde(default)]
    assets: Vec<AccountAsset>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountAsset {
    asset: String,
    #[serde(with = "rust_decimal::serde::str")]
    available_balance: Decimal,
}

/// Client for the Binance USDⓈ-M futures REST API
///
/// All requests go through a shared rate limiter and carry the request
/// timeout given at construction.
#[derive(Clone)]
pub struct BinanceFuturesClient {
    client: Client,
    base_url: String,
    credentials: Option<Credentials>,
    rate_limiter: Arc<BinanceRateLimiter>,
}

impl BinanceFuturesClient {
    pub fn new(
        environment: BinanceEnvironment,
        credentials: Option<Credentials>,
        timeout: Duration,
    ) -> Result<Self, ExchangeError> {
        Self::with_base_url(environment.base_url(), credentials, timeout)
    }

    /// Point the client at an arbitrary base URL (proxies, local mocks)
    pub fn with_base_url(
        base_url: impl Into<String>,
        credentials: Option<Credentials>,
        timeout: Duration,
    ) -> Result<Self, ExchangeError> {
        let client = Client::builder().timeout(timeout).build()?;
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_second(REQUESTS_PER_SECOND)));

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
            rate_limiter,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build the signed query string: params, recvWindow, timestamp, signature
    fn signed_query(
        credentials: &Credentials,
        params: &[(&str, String)],
        timestamp_ms: i64,
    ) -> String {
        let mut query = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>();
        query.push(format!("recvWindow={}", RECV_WINDOW_MS));
        query.push(format!("timestamp={}", timestamp_ms));

        let query = query.join("&");
        let signature = credentials.sign(&query);
        format!("{}&signature={}", query, signature)
    }

    async fn get_public<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ExchangeError> {
        let url = format!("{}{}", self.base_url, path);
        self.execute(self.client.get(&url).query(query)).await
    }

    async fn send_signed<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, ExchangeError> {
        let credentials = self.credentials.as_ref().ok_or_else(|| {
            ExchangeError::Config(format!("{} requires API credentials", path))
        })?;

        let query = Self::signed_query(credentials, params, Utc::now().timestamp_millis());
        let url = format!("{}{}?{}", self.base_url, path, query);

        let request = self
            .client
            .request(method, &url)
            .header("X-MBX-APIKEY", credentials.api_key());
        self.execute(request).await
    }

    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ExchangeError> {
        self.rate_limiter.until_ready().await;

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ExchangeError::from_api_response(status.as_u16(), &body));
        }

        serde_json::from_str(&body)
            .map_err(|e| ExchangeError::Parse(format!("{}: {}", e, body)))
    }

    /// Single price request without retries
    async fn fetch_price_once(&self, symbol: &str) -> Result<Decimal, ExchangeError> {
        let ticker: TickerPrice = self
            .get_public("/fapi/v1/ticker/price", &[("symbol", symbol)])
            .await?;
        Ok(ticker.price)
    }
}

impl Exchange for BinanceFuturesClient {
    async fn exchange_info(&self) -> Result<ExchangeInfo, ExchangeError> {
        self.get_public("/fapi/v1/exchangeInfo", &[]).await
    }

    /// Retries transient failures with exponential backoff before giving up
    async fn current_price(&self, symbol: &str) -> Result<Decimal, ExchangeError> {
        let mut attempt = 1;

        loop {
            match self.fetch_price_once(symbol).await {
                Ok(price) => {
                    if attempt > 1 {
                        tracing::info!(symbol, attempt, "Price fetch recovered");
                    }
                    return Ok(price);
                }
                Err(e) if e.is_transient() && attempt < MAX_RETRIES => {
                    let backoff_ms = INITIAL_BACKOFF_MS * 2_u64.pow(attempt - 1);
                    tracing::warn!(
                        "Price fetch attempt {}/{} for {} failed: {}. Retrying in {}ms...",
                        attempt,
                        MAX_RETRIES,
                        symbol,
                        e,
                        backoff_ms
                    );
                    sleep(Duration::from_millis(backoff_ms)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn account_balance(&self, asset: &str) -> Result<Decimal, ExchangeError> {
        let account: AccountInfo = self.send_signed(Method::GET, "/fapi/v2/account", &[]).await?;

        Ok(account
            .assets
            .into_iter()
            .find(|a| a.asset == asset)
            .map(|a| a.available_balance)
            .unwrap_or(Decimal::ZERO))
    }

    async fn submit_order(&self, order: &OrderRequest) -> Result<OrderAck, ExchangeError> {
        self.send_signed(Method::POST, "/fapi/v1/order", &order.to_params())
            .await
    }

    async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<(), ExchangeError> {
        let params = [("symbol", symbol.to_string()), ("leverage", leverage.to_string())];
        let _: serde_json::Value = self
            .send_signed(Method::POST, "/fapi/v1/leverage", &params)
            .await?;
        Ok(())
    }
}
