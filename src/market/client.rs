//! tronsave.io market client.

use crate::config::{MarketConfig, UnitPrice};
use crate::invoice::sun_to_trx;
use crate::market::types::ApiEnvelope;
use crate::market::{DelegationOrder, Estimate, ResourceMarket, ResourcePackage};
use crate::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info, warn};

/// Timeout for estimates and informational reads.
const READ_TIMEOUT: Duration = Duration::from_secs(15);
/// Timeout for order placement.
const ORDER_TIMEOUT: Duration = Duration::from_secs(20);

/// The fixed ladder of package sizes offered to users.
pub const ENERGY_PRESETS: [u64; 6] = [65_000, 131_000, 262_000, 393_000, 524_000, 655_000];

/// Shipped fallback prices for the preset ladder, in TRX. Used when the
/// market cannot be asked for estimates.
const FALLBACK_PRICES_TRX: [f64; 6] = [2.21, 4.45, 8.91, 13.36, 17.82, 22.27];

/// Client for the tronsave.io resource market.
///
/// The market prices in SUN; every price crossing this boundary is converted
/// to TRX major units on the way in.
pub struct MarketClient {
    config: MarketConfig,
    http: reqwest::Client,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EstimateRequest<'a> {
    resource_type: &'static str,
    receiver: &'a str,
    duration_sec: u64,
    resource_amount: u64,
    unit_price: &'a UnitPrice,
    options: EstimateOptions,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EstimateOptions {
    allow_partial_fill: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    min_resource_delegate_required_amount: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BuyRequest<'a> {
    resource_type: &'static str,
    unit_price: &'a UnitPrice,
    resource_amount: u64,
    receiver: &'a str,
    duration_sec: u64,
    options: BuyOptions,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BuyOptions {
    allow_partial_fill: bool,
    only_create_when_fulfilled: bool,
    prevent_duplicate_incomplete_orders: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    min_resource_delegate_required_amount: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_price_accepted: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EstimateData {
    #[serde(default)]
    estimate_trx: Option<u64>,
    #[serde(default)]
    unit_price: Option<UnitPrice>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BuyData {
    #[serde(default)]
    order_id: Option<OrderId>,
}

/// Order ids arrive as strings or numbers depending on the endpoint.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OrderId {
    Text(String),
    Number(u64),
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

impl MarketClient {
    /// Create a client for the configured market.
    #[must_use]
    pub fn new(config: &MarketConfig) -> Self {
        if config.api_key.is_none() {
            warn!("No market API key configured; package prices use shipped fallbacks");
        }
        Self {
            config: config.clone(),
            http: reqwest::Client::new(),
        }
    }

    /// The preset ladder priced with shipped fallback values.
    #[must_use]
    pub fn fallback_packages() -> Vec<ResourcePackage> {
        ENERGY_PRESETS
            .iter()
            .zip(FALLBACK_PRICES_TRX.iter())
            .enumerate()
            .map(|(idx, (&energy_amount, &base_price_trx))| ResourcePackage {
                id: u32::try_from(idx).unwrap_or(u32::MAX) + 1,
                energy_amount,
                base_price_trx,
                unit_price: UnitPrice::default(),
            })
            .collect()
    }

    /// Ask the market to price one package size for `receiver`.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or an in-band market error.
    pub async fn estimate(&self, receiver: &str, resource_amount: u64) -> Result<Estimate> {
        let body = EstimateRequest {
            resource_type: "ENERGY",
            receiver,
            duration_sec: self.config.duration_sec,
            resource_amount,
            unit_price: &self.config.unit_price,
            options: EstimateOptions {
                allow_partial_fill: self.config.allow_partial_fill,
                min_resource_delegate_required_amount: self.min_delegate_option(),
            },
        };

        let envelope = self
            .post_json("/v2/estimate-buy-resource", &body, READ_TIMEOUT)
            .await?;
        let data: EstimateData = decode_data(envelope)?;

        Ok(Estimate {
            total_trx: data.estimate_trx.map_or(0.0, sun_to_trx),
            unit_price: data
                .unit_price
                .unwrap_or_else(|| self.config.unit_price.clone()),
        })
    }

    /// Place a buy-resource order delegating `resource_amount` to `receiver`.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or an in-band market error.
    pub async fn buy(&self, receiver: &str, resource_amount: u64) -> Result<DelegationOrder> {
        let body = BuyRequest {
            resource_type: "ENERGY",
            unit_price: &self.config.unit_price,
            resource_amount,
            receiver,
            duration_sec: self.config.duration_sec,
            options: BuyOptions {
                allow_partial_fill: self.config.allow_partial_fill,
                only_create_when_fulfilled: false,
                prevent_duplicate_incomplete_orders: false,
                min_resource_delegate_required_amount: self.min_delegate_option(),
                max_price_accepted: None,
            },
        };

        let envelope = self
            .post_json("/v2/buy-resource", &body, ORDER_TIMEOUT)
            .await?;
        let data: BuyData = decode_data(envelope)?;

        Ok(DelegationOrder {
            order_id: data
                .order_id
                .map_or_else(|| "unknown".to_string(), |id| id.to_string()),
            wallet: receiver.to_string(),
            energy_amount: resource_amount,
        })
    }

    /// Market account details for the configured API key. Informational;
    /// returns `None` on any failure.
    pub async fn account_info(&self) -> Option<serde_json::Value> {
        self.read("/v2/user-info", &[]).await
    }

    /// Current order book for `receiver`. Informational; returns `None` on
    /// any failure.
    pub async fn order_book(&self, receiver: &str) -> Option<serde_json::Value> {
        let duration = self.config.duration_sec.to_string();
        let mut query: Vec<(&str, String)> = vec![
            ("address", receiver.to_string()),
            ("resourceType", "ENERGY".to_string()),
            ("durationSec", duration),
        ];
        if self.config.min_delegate_amount > 0 {
            query.push((
                "minDelegateAmount",
                self.config.min_delegate_amount.to_string(),
            ));
        }
        self.read("/v2/order-book", &query).await
    }

    /// Status of a previously placed order. Informational; returns `None`
    /// on any failure.
    pub async fn order_details(&self, order_id: &str) -> Option<serde_json::Value> {
        // Deployments differ on the path; try both.
        for path in [
            format!("/v2/orders/{order_id}"),
            format!("/v2/order/{order_id}"),
        ] {
            if let Some(data) = self.read(&path, &[]).await {
                return Some(data);
            }
        }
        None
    }

    fn min_delegate_option(&self) -> Option<u64> {
        (self.config.min_delegate_amount > 0).then_some(self.config.min_delegate_amount)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.api_base.trim_end_matches('/'))
    }

    fn apply_key(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => request.header("apikey", key),
            None => request,
        }
    }

    async fn post_json<T: Serialize>(
        &self,
        path: &str,
        body: &T,
        timeout: Duration,
    ) -> Result<ApiEnvelope> {
        let request = self.http.post(self.url(path)).json(body).timeout(timeout);
        let response = self.apply_key(request).send().await?;
        let status = response.status();
        let envelope: ApiEnvelope = response.json().await?;

        if envelope.is_error() {
            return Err(Error::Market(envelope.error_message()));
        }
        if !status.is_success() {
            return Err(Error::Market(format!("{path} returned {status}")));
        }
        Ok(envelope)
    }

    async fn read(&self, path: &str, query: &[(&str, String)]) -> Option<serde_json::Value> {
        let request = self
            .http
            .get(self.url(path))
            .query(query)
            .timeout(READ_TIMEOUT);

        let response = match self.apply_key(request).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("Market read {path} failed: {e}");
                return None;
            }
        };

        let status = response.status();
        let envelope: ApiEnvelope = match response.json().await {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("Market read {path} returned an unreadable body: {e}");
                return None;
            }
        };

        if envelope.is_error() || !status.is_success() {
            warn!("Market read {path} failed: {}", envelope.error_message());
            return None;
        }
        envelope.data
    }
}

fn decode_data<T: serde::de::DeserializeOwned>(envelope: ApiEnvelope) -> Result<T> {
    let data = envelope
        .data
        .ok_or_else(|| Error::Market("response carried no data".to_string()))?;
    Ok(serde_json::from_value(data)?)
}

#[async_trait]
impl ResourceMarket for MarketClient {
    async fn packages(&self, receiver: &str) -> Vec<ResourcePackage> {
        if self.config.api_key.is_none() {
            return Self::fallback_packages();
        }

        let mut packages = Vec::with_capacity(ENERGY_PRESETS.len());
        for (idx, &energy_amount) in ENERGY_PRESETS.iter().enumerate() {
            match self.estimate(receiver, energy_amount).await {
                Ok(estimate) => packages.push(ResourcePackage {
                    id: u32::try_from(idx).unwrap_or(u32::MAX) + 1,
                    energy_amount,
                    base_price_trx: estimate.total_trx,
                    unit_price: estimate.unit_price,
                }),
                Err(e) => {
                    warn!("Estimation failed for {energy_amount} energy: {e}");
                }
            }
        }

        if packages.is_empty() {
            warn!("No package could be estimated; using shipped fallbacks");
            return Self::fallback_packages();
        }
        packages
    }

    async fn delegate(&self, wallet: &str, amount: u64) {
        match self.buy(wallet, amount).await {
            Ok(order) => {
                info!(
                    "Created order {} delegating {amount} energy to {wallet}",
                    order.order_id
                );
            }
            Err(e) => {
                error!("Failed to create delegation order for {wallet}: {e}");
            }
        }
    }
}
