//! Resource-market integration.
//!
//! The market sells energy delegation: the broker asks for price estimates
//! on a fixed ladder of package sizes, and places a buy-resource order for
//! an invoice's amount once the invoice is paid. Pricing and order options
//! (duration, unit-price tier, fill policy) come from [`crate::config::MarketConfig`].
//!
//! Everything here is fail-soft. Estimation failures fall back to shipped
//! package prices so the purchase flow never blocks on market availability,
//! and a failed delegation is logged rather than raised (the invoice is
//! already paid by the time delegation runs).

mod client;
mod types;

pub use client::MarketClient;
pub use types::{DelegationOrder, Estimate, ResourcePackage};

use async_trait::async_trait;

/// Priced package lookup and delegation order placement.
#[async_trait]
pub trait ResourceMarket: Send + Sync {
    /// Priced packages for `receiver`, falling back to shipped defaults.
    async fn packages(&self, receiver: &str) -> Vec<ResourcePackage>;

    /// Submit a delegation order for `amount` energy to `wallet`.
    ///
    /// Never raises: order failures are logged and swallowed.
    async fn delegate(&self, wallet: &str, amount: u64);
}
