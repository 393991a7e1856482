//! On-chain payment observation.
//!
//! The chain observer answers one question for the reconciler: has this
//! invoice been paid? It queries a block-explorer API for inbound transfers
//! to the configured receiving address, parses them into typed [`Transfer`]
//! records once at the boundary, and tests them against the invoice price
//! with the pure [`satisfies`] function.
//!
//! Verification fails soft: network errors, malformed payloads, and a
//! misconfigured receiving address all read as "not yet paid" and the next
//! tick retries. Nothing here marks transfers as consumed, so one transfer
//! can satisfy several pending invoices to the same receiving address; the
//! reconciler documents that hazard rather than hiding it.

mod address;
mod observer;

pub use address::TronAddress;
pub use observer::{satisfies, AccountBalances, ChainObserver, Transfer};

use crate::invoice::Invoice;
use async_trait::async_trait;

/// Decides whether an invoice's payment has arrived on chain.
#[async_trait]
pub trait PaymentVerifier: Send + Sync {
    /// True once a satisfying transfer exists. Must not error: failures are
    /// logged internally and read as "not yet paid".
    async fn is_paid(&self, invoice: &Invoice) -> bool;
}
