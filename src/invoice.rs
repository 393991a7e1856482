//! Invoice data model.
//!
//! An [`Invoice`] is a priced, time-boxed request to delegate an energy
//! amount to a wallet. Invoices are created by the front end, transition
//! `pending -> paid` or `pending -> expired` exactly once (driven by the
//! reconciler), and are never deleted.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    /// Awaiting payment.
    Pending,
    /// Payment confirmed, delegation attempted.
    Paid,
    /// Validity window elapsed without payment.
    Expired,
}

impl InvoiceStatus {
    /// Returns true once the invoice can no longer change state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Paid | Self::Expired)
    }
}

/// A stored invoice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    /// Store-assigned identifier.
    pub id: u64,
    /// Owning user (chat id).
    pub user_id: i64,
    /// Wallet the energy will be delegated to (base58 form).
    pub wallet_address: String,
    /// Requested energy amount.
    pub energy_amount: u64,
    /// Market price before commission, in TRX.
    pub base_price_trx: f64,
    /// Price the user must pay, in TRX. Fixed at creation.
    pub final_price_trx: f64,
    /// Payment reference shown to the user.
    pub payment_reference: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// End of the payment window.
    pub expires_at: DateTime<Utc>,
    /// Current state.
    pub status: InvoiceStatus,
}

impl Invoice {
    /// Whether the payment window has elapsed at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Parameters for creating an invoice.
#[derive(Debug, Clone)]
pub struct NewInvoice {
    /// Owning user (chat id).
    pub user_id: i64,
    /// Wallet the energy will be delegated to.
    pub wallet_address: String,
    /// Requested energy amount.
    pub energy_amount: u64,
    /// Market price before commission, in TRX.
    pub base_price_trx: f64,
    /// Price the user must pay, in TRX.
    pub final_price_trx: f64,
    /// Payment reference shown to the user.
    pub payment_reference: String,
    /// Minutes the invoice stays payable.
    pub validity_minutes: i64,
}

impl NewInvoice {
    /// Build creation parameters, computing the final price from the base
    /// price and commission percentage. The final price is fixed here and
    /// never recomputed.
    #[must_use]
    pub fn priced(
        user_id: i64,
        wallet_address: impl Into<String>,
        energy_amount: u64,
        base_price_trx: f64,
        commission_percent: f64,
        payment_reference: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            wallet_address: wallet_address.into(),
            energy_amount,
            base_price_trx,
            final_price_trx: apply_commission(base_price_trx, commission_percent),
            payment_reference: payment_reference.into(),
            validity_minutes: 20,
        }
    }

    /// Override the validity window.
    #[must_use]
    pub fn with_validity_minutes(mut self, minutes: i64) -> Self {
        self.validity_minutes = minutes;
        self
    }

    /// Materialize into an [`Invoice`] with the given id, timestamped now.
    #[must_use]
    pub fn into_invoice(self, id: u64) -> Invoice {
        let created_at = Utc::now();
        Invoice {
            id,
            user_id: self.user_id,
            wallet_address: self.wallet_address,
            energy_amount: self.energy_amount,
            base_price_trx: self.base_price_trx,
            final_price_trx: self.final_price_trx,
            payment_reference: self.payment_reference,
            created_at,
            expires_at: created_at + Duration::minutes(self.validity_minutes),
            status: InvoiceStatus::Pending,
        }
    }
}

/// SUN per TRX. Chain and market APIs price in SUN; everything in this crate
/// works in TRX major units and converts at the API boundary.
pub const SUN_PER_TRX: f64 = 1_000_000.0;

/// Convert a minor-unit SUN amount to TRX.
#[must_use]
pub fn sun_to_trx(sun: u64) -> f64 {
    sun as f64 / SUN_PER_TRX
}

/// Apply the commission markup to a base price.
#[must_use]
pub fn apply_commission(base_price_trx: f64, commission_percent: f64) -> f64 {
    base_price_trx * (1.0 + commission_percent / 100.0)
}

/// Generate an opaque payment reference for a new invoice.
#[must_use]
pub fn payment_reference() -> String {
    use rand::{distributions::Alphanumeric, Rng};
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(10)
        .map(char::from)
        .collect();
    format!("TRX-{suffix}")
}
