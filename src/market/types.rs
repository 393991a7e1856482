//! Market-facing data types.

use crate::config::UnitPrice;
use serde::Deserialize;

/// A priced energy offer shown to the user.
///
/// Ephemeral: recomputed per request, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourcePackage {
    /// Position in the preset ladder, 1-based.
    pub id: u32,
    /// Energy amount on offer.
    pub energy_amount: u64,
    /// Market price before commission, in TRX.
    pub base_price_trx: f64,
    /// Pricing tier the estimate was obtained with.
    pub unit_price: UnitPrice,
}

impl ResourcePackage {
    /// The price the user pays for this package, commission included.
    #[must_use]
    pub fn final_price_trx(&self, commission_percent: f64) -> f64 {
        crate::invoice::apply_commission(self.base_price_trx, commission_percent)
    }
}

/// A placed delegation order, as echoed by the market.
#[derive(Debug, Clone)]
pub struct DelegationOrder {
    /// Market-side order identifier.
    pub order_id: String,
    /// Wallet the energy is delegated to.
    pub wallet: String,
    /// Ordered energy amount.
    pub energy_amount: u64,
}

/// A price estimate for one package size.
#[derive(Debug, Clone)]
pub struct Estimate {
    /// Estimated total price in TRX.
    pub total_trx: f64,
    /// Unit price the market quoted.
    pub unit_price: UnitPrice,
}

/// Common envelope of market API responses.
///
/// The market reports failures in-band: any response carrying a truthy
/// `error` field is a failure regardless of the HTTP status code.
#[derive(Debug, Deserialize)]
pub(super) struct ApiEnvelope {
    #[serde(default)]
    pub error: Option<serde_json::Value>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl ApiEnvelope {
    /// Truthiness test on the `error` field.
    pub fn is_error(&self) -> bool {
        match &self.error {
            None | Some(serde_json::Value::Null) => false,
            Some(serde_json::Value::Bool(b)) => *b,
            Some(serde_json::Value::Number(n)) => n.as_f64() != Some(0.0),
            Some(serde_json::Value::String(s)) => !s.is_empty(),
            Some(_) => true,
        }
    }

    /// Error message for logging, whatever shape the API used.
    pub fn error_message(&self) -> String {
        self.message
            .clone()
            .or_else(|| self.error.as_ref().map(ToString::to_string))
            .unwrap_or_else(|| "unknown market error".to_string())
    }
}
