//! Block-explorer observer: inbound transfer queries and payment matching.

use crate::chain::{PaymentVerifier, TronAddress};
use crate::config::ChainConfig;
use crate::invoice::{sun_to_trx, Invoice};
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Timeout for the transactions query.
const TRANSACTIONS_TIMEOUT: Duration = Duration::from_secs(20);
/// Timeout for account/resource lookups.
const ACCOUNT_TIMEOUT: Duration = Duration::from_secs(15);
/// Page size for the transactions query.
const PAGE_LIMIT: u32 = 50;
/// Tolerance absorbing float rounding when comparing TRX amounts.
const AMOUNT_EPSILON: f64 = 1e-8;

/// USDT TRC-20 contract, used for the balance snapshot.
const USDT_CONTRACT: &str = "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t";

/// One inbound transfer, flattened from an explorer transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct Transfer {
    /// Destination account, hex form as reported (may carry a `0x` prefix).
    pub to_address: String,
    /// Transferred amount in SUN.
    pub amount_sun: u64,
}

/// Balance and resource snapshot for an address.
#[derive(Debug, Clone, Default)]
pub struct AccountBalances {
    /// TRX balance in major units.
    pub trx: f64,
    /// USDT balance in major units.
    pub usdt: f64,
    /// Remaining bandwidth (free plus staked).
    pub bandwidth: u64,
    /// Remaining energy.
    pub energy: u64,
}

/// Test whether any single transfer to `receiver` covers `threshold_trx`.
///
/// The first transfer whose destination matches and whose amount (plus a
/// rounding tolerance) reaches the threshold decides. Amounts are never
/// accumulated across transfers, so partial payments split over several
/// transactions do not satisfy an invoice.
#[must_use]
pub fn satisfies(transfers: &[Transfer], receiver: &TronAddress, threshold_trx: f64) -> bool {
    transfers.iter().any(|t| {
        receiver.matches_hex(&t.to_address)
            && sun_to_trx(t.amount_sun) + AMOUNT_EPSILON >= threshold_trx
    })
}

/// Observer for the TronGrid transactions API.
///
/// The receiving address is decoded once at construction. If decoding fails
/// the misconfiguration is logged and every payment check reads "not paid"
/// until the address is fixed.
pub struct ChainObserver {
    config: ChainConfig,
    http: reqwest::Client,
    receiving: Option<TronAddress>,
}

impl ChainObserver {
    /// Create an observer for the configured receiving address.
    #[must_use]
    pub fn new(config: &ChainConfig) -> Self {
        // In simulation mode the receiving address is never consulted.
        let receiving = if config.simulate_payments {
            None
        } else {
            match TronAddress::parse(&config.receiving_address) {
                Ok(address) => Some(address),
                Err(e) => {
                    warn!("Receiving address is not usable, payment verification disabled: {e}");
                    None
                }
            }
        };

        Self {
            config: config.clone(),
            http: reqwest::Client::new(),
            receiving,
        }
    }

    /// Whether payment verification can run at all.
    #[must_use]
    pub fn can_verify(&self) -> bool {
        self.config.simulate_payments || self.receiving.is_some()
    }

    /// Inbound transfers to the receiving address since `since`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails, times out, or returns a
    /// non-success status.
    pub async fn inbound_transfers(&self, since: DateTime<Utc>) -> Result<Vec<Transfer>> {
        let url = format!(
            "{}/v1/accounts/{}/transactions",
            self.config.api_base.trim_end_matches('/'),
            self.config.receiving_address
        );

        let mut request = self
            .http
            .get(&url)
            .query(&[
                ("only_to", "true".to_string()),
                ("limit", PAGE_LIMIT.to_string()),
                ("min_timestamp", since.timestamp_millis().to_string()),
            ])
            .timeout(TRANSACTIONS_TIMEOUT);
        if let Some(key) = &self.config.api_key {
            request = request.header("TRON-PRO-API-KEY", key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(Error::Network(format!(
                "transactions query returned {}",
                response.status()
            )));
        }

        let payload: TransactionsResponse = response.json().await?;
        Ok(flatten_transfers(payload))
    }

    /// Balance and resource snapshot for `address`. Informational only.
    ///
    /// # Errors
    ///
    /// Returns an error if either lookup fails.
    pub async fn balances(&self, address: &str) -> Result<AccountBalances> {
        let base = self.config.api_base.trim_end_matches('/');
        let account: AccountResponse = self
            .get_json(&format!("{base}/v1/accounts/{address}"))
            .await?;
        let resources: ResourcesResponse = self
            .get_json(&format!("{base}/v1/accounts/{address}/resources"))
            .await?;

        let account = account.data.into_iter().next().unwrap_or_default();
        let resources = resources.data.into_iter().next().unwrap_or_default();

        let usdt = account
            .trc20
            .iter()
            .find_map(|entry| entry.get(USDT_CONTRACT))
            .and_then(|raw| raw.parse::<u64>().ok())
            .map_or(0.0, sun_to_trx);

        Ok(AccountBalances {
            trx: sun_to_trx(account.balance),
            usdt,
            bandwidth: resources.free_net_remaining + resources.net_remaining,
            energy: resources.energy_remaining,
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let mut request = self.http.get(url).timeout(ACCOUNT_TIMEOUT);
        if let Some(key) = &self.config.api_key {
            request = request.header("TRON-PRO-API-KEY", key);
        }
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(Error::Network(format!(
                "{url} returned {}",
                response.status()
            )));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl PaymentVerifier for ChainObserver {
    async fn is_paid(&self, invoice: &Invoice) -> bool {
        if self.config.simulate_payments {
            let delay = ChronoDuration::seconds(
                i64::try_from(self.config.simulated_delay_secs).unwrap_or(i64::MAX),
            );
            return Utc::now() - invoice.created_at >= delay;
        }

        let Some(receiving) = &self.receiving else {
            debug!(
                "No usable receiving address, invoice {} stays unverified",
                invoice.id
            );
            return false;
        };

        match self.inbound_transfers(invoice.created_at).await {
            Ok(transfers) => {
                let paid = satisfies(&transfers, receiving, invoice.final_price_trx);
                debug!(
                    "Invoice {}: {} inbound transfers since creation, paid={paid}",
                    invoice.id,
                    transfers.len()
                );
                paid
            }
            Err(e) => {
                warn!("Payment check failed for invoice {}: {e}", invoice.id);
                false
            }
        }
    }
}

// Wire types for the explorer response. Only transfer-type contract calls
// carry a destination and amount; everything else flattens to nothing.

#[derive(Debug, Deserialize)]
struct TransactionsResponse {
    #[serde(default)]
    data: Vec<Transaction>,
}

#[derive(Debug, Deserialize)]
struct Transaction {
    #[serde(default)]
    raw_data: RawData,
}

#[derive(Debug, Default, Deserialize)]
struct RawData {
    #[serde(default)]
    contract: Vec<Contract>,
}

#[derive(Debug, Default, Deserialize)]
struct Contract {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    parameter: ContractParameter,
}

#[derive(Debug, Default, Deserialize)]
struct ContractParameter {
    #[serde(default)]
    value: ContractValue,
}

#[derive(Debug, Default, Deserialize)]
struct ContractValue {
    #[serde(default)]
    to_address: Option<String>,
    #[serde(default)]
    amount: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct AccountResponse {
    #[serde(default)]
    data: Vec<AccountData>,
}

#[derive(Debug, Default, Deserialize)]
struct AccountData {
    #[serde(default)]
    balance: u64,
    #[serde(default)]
    trc20: Vec<std::collections::HashMap<String, String>>,
}

#[derive(Debug, Default, Deserialize)]
struct ResourcesResponse {
    #[serde(default)]
    data: Vec<ResourcesData>,
}

#[derive(Debug, Default, Deserialize)]
struct ResourcesData {
    #[serde(rename = "freeNetRemaining", default)]
    free_net_remaining: u64,
    #[serde(rename = "netRemaining", default)]
    net_remaining: u64,
    #[serde(rename = "energyRemaining", default)]
    energy_remaining: u64,
}

fn flatten_transfers(payload: TransactionsResponse) -> Vec<Transfer> {
    payload
        .data
        .into_iter()
        .flat_map(|tx| tx.raw_data.contract)
        .filter(|contract| contract.kind == "TransferContract")
        .filter_map(|contract| {
            let value = contract.parameter.value;
            match (value.to_address, value.amount) {
                (Some(to_address), Some(amount_sun)) => Some(Transfer {
                    to_address,
                    amount_sun,
                }),
                _ => None,
            }
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::invoice::NewInvoice;
    use proptest::prelude::*;

    const RECEIVER_BASE58: &str = "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t";
    const RECEIVER_HEX: &str = "41a614f803b6fd780986a42c78ec9c7f77e6ded13c";

    fn receiver() -> TronAddress {
        TronAddress::parse(RECEIVER_BASE58).expect("should decode")
    }

    fn transfer(to: &str, amount_sun: u64) -> Transfer {
        Transfer {
            to_address: to.to_string(),
            amount_sun,
        }
    }

    #[test]
    fn exact_amount_satisfies() {
        let transfers = vec![transfer(RECEIVER_HEX, 10_000_000)];
        assert!(satisfies(&transfers, &receiver(), 10.0));
    }

    #[test]
    fn one_sun_short_does_not_satisfy() {
        let transfers = vec![transfer(RECEIVER_HEX, 9_999_999)];
        assert!(!satisfies(&transfers, &receiver(), 10.0));
    }

    #[test]
    fn overpayment_satisfies() {
        let transfers = vec![transfer(RECEIVER_HEX, 10_500_000)];
        assert!(satisfies(&transfers, &receiver(), 10.0));
    }

    #[test]
    fn partial_payments_are_not_accumulated() {
        // Two transfers that only sum to the threshold must not satisfy it.
        let transfers = vec![
            transfer(RECEIVER_HEX, 6_000_000),
            transfer(RECEIVER_HEX, 4_000_000),
        ];
        assert!(!satisfies(&transfers, &receiver(), 10.0));
    }

    #[test]
    fn transfers_to_other_addresses_are_ignored() {
        let transfers = vec![transfer(
            "41aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa",
            50_000_000,
        )];
        assert!(!satisfies(&transfers, &receiver(), 10.0));
    }

    #[test]
    fn destination_match_tolerates_case_and_prefix() {
        let uppercase = vec![transfer(&RECEIVER_HEX.to_uppercase(), 10_000_000)];
        assert!(satisfies(&uppercase, &receiver(), 10.0));

        let prefixed = vec![transfer(&format!("0x{RECEIVER_HEX}"), 10_000_000)];
        assert!(satisfies(&prefixed, &receiver(), 10.0));
    }

    #[test]
    fn later_satisfying_transfer_still_wins() {
        let transfers = vec![
            transfer(RECEIVER_HEX, 1_000),
            transfer("41bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb", 99_000_000),
            transfer(RECEIVER_HEX, 10_000_000),
        ];
        assert!(satisfies(&transfers, &receiver(), 10.0));
    }

    #[test]
    fn flattens_only_transfer_contracts() {
        let payload = serde_json::json!({
            "data": [
                {
                    "raw_data": {
                        "contract": [
                            {
                                "type": "TransferContract",
                                "parameter": {
                                    "value": {
                                        "to_address": RECEIVER_HEX,
                                        "amount": 2_431_000u64,
                                        "owner_address": "41cccccccccccccccccccccccccccccccccccccccc"
                                    }
                                }
                            },
                            {
                                "type": "TriggerSmartContract",
                                "parameter": {
                                    "value": {
                                        "to_address": RECEIVER_HEX,
                                        "amount": 99_000_000u64
                                    }
                                }
                            }
                        ]
                    }
                },
                {
                    "raw_data": {
                        "contract": [
                            {
                                "type": "TransferContract",
                                "parameter": { "value": { "amount": 5u64 } }
                            }
                        ]
                    }
                }
            ]
        });

        let parsed: TransactionsResponse =
            serde_json::from_value(payload).expect("should parse");
        let transfers = flatten_transfers(parsed);
        assert_eq!(transfers, vec![transfer(RECEIVER_HEX, 2_431_000)]);
    }

    #[test]
    fn empty_and_unknown_payloads_flatten_to_nothing() {
        let parsed: TransactionsResponse =
            serde_json::from_value(serde_json::json!({})).expect("should parse");
        assert!(flatten_transfers(parsed).is_empty());

        let parsed: TransactionsResponse =
            serde_json::from_value(serde_json::json!({ "data": [{}] }))
                .expect("should parse");
        assert!(flatten_transfers(parsed).is_empty());
    }

    #[test]
    fn account_payload_maps_to_balances() {
        let account: AccountResponse = serde_json::from_value(serde_json::json!({
            "data": [{
                "balance": 12_500_000u64,
                "trc20": [
                    { "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t": "3400000" }
                ]
            }]
        }))
        .expect("should parse");
        let data = account.data.into_iter().next().expect("should have data");
        assert_eq!(data.balance, 12_500_000);
        assert_eq!(data.trc20.len(), 1);

        let resources: ResourcesResponse = serde_json::from_value(serde_json::json!({
            "data": [{
                "freeNetRemaining": 400u64,
                "netRemaining": 100u64,
                "energyRemaining": 65_000u64
            }]
        }))
        .expect("should parse");
        let data = resources.data.into_iter().next().expect("should have data");
        assert_eq!(data.free_net_remaining + data.net_remaining, 500);
        assert_eq!(data.energy_remaining, 65_000);
    }

    #[tokio::test]
    async fn bad_receiving_address_reads_as_unpaid() {
        let config = ChainConfig {
            receiving_address: "definitely-not-an-address".to_string(),
            ..ChainConfig::default()
        };
        let observer = ChainObserver::new(&config);
        assert!(!observer.can_verify());

        let invoice =
            NewInvoice::priced(1, "TWallet", 65_000, 2.21, 10.0, "TRX-a").into_invoice(1);
        assert!(!observer.is_paid(&invoice).await);
    }

    #[tokio::test]
    async fn simulation_pays_after_the_configured_delay() {
        let config = ChainConfig {
            simulate_payments: true,
            simulated_delay_secs: 60,
            ..ChainConfig::default()
        };
        let observer = ChainObserver::new(&config);
        assert!(observer.can_verify());

        let mut invoice =
            NewInvoice::priced(1, "TWallet", 65_000, 2.21, 10.0, "TRX-b").into_invoice(1);

        // Fresh invoice: not yet "paid".
        assert!(!observer.is_paid(&invoice).await);

        // Backdate creation past the delay: "paid" without any network call.
        invoice.created_at = Utc::now() - ChronoDuration::seconds(61);
        assert!(observer.is_paid(&invoice).await);
    }

    proptest! {
        #[test]
        fn exact_threshold_always_satisfies(amount_sun in 1u64..1_000_000_000_000u64) {
            let transfers = vec![transfer(RECEIVER_HEX, amount_sun)];
            prop_assert!(satisfies(&transfers, &receiver(), sun_to_trx(amount_sun)));
        }

        #[test]
        fn shortfall_of_a_full_sun_never_satisfies(
            amount_sun in 1u64..1_000_000_000_000u64,
            shortfall_sun in 1u64..1_000_000u64,
        ) {
            let transfers = vec![transfer(RECEIVER_HEX, amount_sun)];
            let threshold = sun_to_trx(amount_sun + shortfall_sun);
            prop_assert!(!satisfies(&transfers, &receiver(), threshold));
        }
    }
}
